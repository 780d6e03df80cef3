//! Row and column label indexes
//!
//! [`Index`] is a flat, possibly non-unique sequence of labels with a reverse
//! lookup table. [`MultiIndex`] holds hierarchical labels. [`TableIndex`] is
//! what tables and series actually carry.

mod multi_index;

pub use multi_index::MultiIndex;

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::error::{Error, Result};
use crate::value::{format_tuple, Label};

/// Flat label index
///
/// Labels need not be unique; `map` keeps every position of a label.
#[derive(Debug, Clone)]
pub struct Index {
    labels: Vec<Label>,
    map: HashMap<Label, Vec<usize>>,
    name: Option<String>,
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.labels == other.labels
    }
}

impl Index {
    pub fn new(labels: Vec<Label>) -> Self {
        Self::with_name(labels, None)
    }

    pub fn with_name(labels: Vec<Label>, name: Option<String>) -> Self {
        let mut map: HashMap<Label, Vec<usize>> = HashMap::with_capacity(labels.len());
        for (i, label) in labels.iter().enumerate() {
            map.entry(label.clone()).or_default().push(i);
        }
        Index { labels, map, name }
    }

    /// Build from anything convertible into labels
    pub fn from_values<L: Into<Label>>(values: Vec<L>) -> Self {
        Self::new(values.into_iter().map(Into::into).collect())
    }

    /// Default integer index `0..n`
    pub fn from_range(range: Range<usize>) -> Self {
        Self::new(range.map(Label::from).collect())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn get(&self, pos: usize) -> Option<&Label> {
        self.labels.get(pos)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Copy with a new name
    pub fn rename(&self, name: Option<String>) -> Self {
        let mut out = self.clone();
        out.name = name;
        out
    }

    /// All positions holding `label`; empty when absent
    pub fn positions_of(&self, label: &Label) -> Vec<usize> {
        self.map.get(label).cloned().unwrap_or_default()
    }

    /// Like [`Index::positions_of`] but a missing label is an error
    pub fn positions_of_strict(&self, label: &Label) -> Result<Vec<usize>> {
        self.map
            .get(label)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(label.to_string()))
    }

    /// Position of a label that must occur exactly once
    pub fn get_loc(&self, label: &Label) -> Result<usize> {
        match self.map.get(label).map(Vec::as_slice) {
            None | Some([]) => Err(Error::KeyNotFound(label.to_string())),
            Some([pos]) => Ok(*pos),
            Some(_) => Err(Error::DuplicateLabel(label.to_string())),
        }
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.map.contains_key(label)
    }

    pub fn is_unique(&self) -> bool {
        self.map.len() == self.labels.len()
    }

    pub fn is_monotonic_increasing(&self) -> bool {
        self.labels.windows(2).all(|w| w[0] <= w[1])
    }

    /// Positions covered by the inclusive label range `[start, end]`.
    /// Either bound may be open. Requires a sorted index.
    pub fn slice_locs(&self, start: Option<&Label>, end: Option<&Label>) -> Result<Range<usize>> {
        if !self.is_monotonic_increasing() {
            return Err(Error::UnsortedIndex(
                "label slicing requires a sorted index".into(),
            ));
        }
        let lo = match start {
            Some(s) => self.labels.partition_point(|l| l < s),
            None => 0,
        };
        let hi = match end {
            Some(e) => self.labels.partition_point(|l| l <= e),
            None => self.labels.len(),
        };
        Ok(lo..hi.max(lo))
    }

    /// Positions for the inclusive label range `[start, end]`
    pub fn slice_labels(&self, start: &Label, end: &Label) -> Result<Vec<usize>> {
        Ok(self.slice_locs(Some(start), Some(end))?.collect())
    }

    /// Sub-index for the inclusive label range `[start, end]`
    pub fn slice(&self, start: &Label, end: &Label) -> Result<Index> {
        let range = self.slice_locs(Some(start), Some(end))?;
        Ok(Index::with_name(
            self.labels[range].to_vec(),
            self.name.clone(),
        ))
    }

    /// Distinct labels in order of first appearance
    pub fn unique(&self) -> Index {
        let mut seen = HashSet::with_capacity(self.labels.len());
        let labels = self
            .labels
            .iter()
            .filter(|l| seen.insert(*l))
            .cloned()
            .collect();
        Index::with_name(labels, self.name.clone())
    }

    pub fn union(&self, other: &Index) -> Index {
        if self.is_monotonic_increasing() && other.is_monotonic_increasing() {
            let mut labels: Vec<Label> = self.labels.iter().chain(other.labels.iter()).cloned().collect();
            labels.sort();
            labels.dedup();
            return Index::with_name(labels, self.shared_name(other));
        }
        let mut seen = HashSet::new();
        let labels = self
            .labels
            .iter()
            .chain(other.labels.iter())
            .filter(|l| seen.insert(*l))
            .cloned()
            .collect();
        Index::with_name(labels, self.shared_name(other))
    }

    pub fn intersection(&self, other: &Index) -> Index {
        let mut seen = HashSet::new();
        let labels = self
            .labels
            .iter()
            .filter(|l| other.contains(l) && seen.insert(*l))
            .cloned()
            .collect();
        Index::with_name(labels, self.shared_name(other))
    }

    pub fn difference(&self, other: &Index) -> Index {
        let mut seen = HashSet::new();
        let labels = self
            .labels
            .iter()
            .filter(|l| !other.contains(l) && seen.insert(*l))
            .cloned()
            .collect();
        Index::with_name(labels, self.name.clone())
    }

    pub fn symmetric_difference(&self, other: &Index) -> Index {
        let left = self.difference(other);
        let right = other.difference(self);
        let mut labels = left.labels;
        labels.extend(right.labels);
        if self.is_monotonic_increasing() && other.is_monotonic_increasing() {
            labels.sort();
        }
        Index::with_name(labels, self.shared_name(other))
    }

    /// Remove every occurrence of the given labels
    pub fn drop(&self, labels: &[Label]) -> Result<Index> {
        if let Some(missing) = labels.iter().find(|l| !self.contains(l)) {
            return Err(Error::KeyNotFound(missing.to_string()));
        }
        let dropped: HashSet<&Label> = labels.iter().collect();
        let kept = self
            .labels
            .iter()
            .filter(|l| !dropped.contains(l))
            .cloned()
            .collect();
        Ok(Index::with_name(kept, self.name.clone()))
    }

    /// Stable permutation that sorts the labels
    pub fn argsort(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.labels.len()).collect();
        order.sort_by(|&a, &b| self.labels[a].cmp(&self.labels[b]));
        order
    }

    pub fn take(&self, positions: &[usize]) -> Result<Index> {
        let len = self.labels.len();
        let labels = positions
            .iter()
            .map(|&p| {
                self.labels
                    .get(p)
                    .cloned()
                    .ok_or(Error::IndexOutOfBounds { index: p, size: len })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Index::with_name(labels, self.name.clone()))
    }

    fn shared_name(&self, other: &Index) -> Option<String> {
        if self.name == other.name {
            self.name.clone()
        } else {
            None
        }
    }
}

/// Index carried by tables and series: flat or hierarchical
#[derive(Debug, Clone, PartialEq)]
pub enum TableIndex {
    Flat(Index),
    Multi(MultiIndex),
}

impl From<Index> for TableIndex {
    fn from(index: Index) -> Self {
        TableIndex::Flat(index)
    }
}

impl From<MultiIndex> for TableIndex {
    fn from(index: MultiIndex) -> Self {
        TableIndex::Multi(index)
    }
}

impl TableIndex {
    /// Default integer index `0..len`
    pub fn range(len: usize) -> Self {
        TableIndex::Flat(Index::from_range(0..len))
    }

    /// Build from key tuples. One-element tuples give a flat index.
    pub fn from_keys(keys: Vec<Vec<Label>>, names: Vec<Option<String>>) -> Result<Self> {
        let width = names.len();
        if let Some(bad) = keys.iter().find(|k| k.len() != width) {
            return Err(Error::LengthMismatch {
                expected: width,
                actual: bad.len(),
            });
        }
        match width {
            0 => Err(Error::InvalidInput("index keys must have at least one level".into())),
            1 => {
                let labels = keys.into_iter().map(|mut k| k.remove(0)).collect();
                Ok(TableIndex::Flat(Index::with_name(labels, names.into_iter().next().flatten())))
            }
            _ => {
                if keys.is_empty() {
                    let arrays = vec![Vec::new(); width];
                    return Ok(TableIndex::Multi(MultiIndex::from_arrays(arrays, Some(names))?));
                }
                Ok(TableIndex::Multi(MultiIndex::from_tuples(keys, Some(names))?))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TableIndex::Flat(idx) => idx.len(),
            TableIndex::Multi(idx) => idx.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, TableIndex::Multi(_))
    }

    pub fn nlevels(&self) -> usize {
        match self {
            TableIndex::Flat(_) => 1,
            TableIndex::Multi(idx) => idx.nlevels(),
        }
    }

    pub fn names(&self) -> Vec<Option<String>> {
        match self {
            TableIndex::Flat(idx) => vec![idx.name().map(str::to_string)],
            TableIndex::Multi(idx) => idx.names().to_vec(),
        }
    }

    /// Copy with new level names
    pub fn with_names(&self, names: Vec<Option<String>>) -> Result<Self> {
        match self {
            TableIndex::Flat(idx) => {
                if names.len() != 1 {
                    return Err(Error::LengthMismatch {
                        expected: 1,
                        actual: names.len(),
                    });
                }
                Ok(TableIndex::Flat(idx.rename(names.into_iter().next().flatten())))
            }
            TableIndex::Multi(idx) => Ok(TableIndex::Multi(idx.with_names(names)?)),
        }
    }

    /// Resolve a level by name
    pub fn level_number(&self, name: &str) -> Result<usize> {
        self.names()
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .ok_or_else(|| Error::KeyNotFound(format!("level '{}'", name)))
    }

    /// Label tuple at `pos` (one element for flat indexes)
    pub fn key_at(&self, pos: usize) -> Option<Vec<Label>> {
        match self {
            TableIndex::Flat(idx) => idx.get(pos).map(|l| vec![l.clone()]),
            TableIndex::Multi(idx) => idx.get_tuple(pos),
        }
    }

    pub fn keys(&self) -> Vec<Vec<Label>> {
        (0..self.len()).filter_map(|i| self.key_at(i)).collect()
    }

    /// Flat label at `pos`; hierarchical indexes are not addressable this way
    pub fn label_at(&self, pos: usize) -> Option<&Label> {
        match self {
            TableIndex::Flat(idx) => idx.get(pos),
            TableIndex::Multi(_) => None,
        }
    }

    /// Positions matching a full key, or a prefix of the outer levels
    pub fn positions_of(&self, key: &[Label]) -> Vec<usize> {
        match self {
            TableIndex::Flat(idx) => match key {
                [label] => idx.positions_of(label),
                _ => Vec::new(),
            },
            TableIndex::Multi(idx) => idx.positions_of(key),
        }
    }

    pub fn positions_of_strict(&self, key: &[Label]) -> Result<Vec<usize>> {
        let positions = self.positions_of(key);
        if positions.is_empty() {
            return Err(Error::KeyNotFound(format_tuple(key)));
        }
        Ok(positions)
    }

    /// Unique position of a full key
    pub fn get_loc(&self, key: &[Label]) -> Result<usize> {
        match self {
            TableIndex::Flat(idx) => match key {
                [label] => idx.get_loc(label),
                _ => Err(Error::KeyNotFound(format_tuple(key))),
            },
            TableIndex::Multi(idx) => idx.get_loc(key),
        }
    }

    pub fn is_unique(&self) -> bool {
        match self {
            TableIndex::Flat(idx) => idx.is_unique(),
            TableIndex::Multi(idx) => idx.is_unique(),
        }
    }

    /// Lexicographic monotonicity over key tuples
    pub fn is_monotonic_increasing(&self) -> bool {
        match self {
            TableIndex::Flat(idx) => idx.is_monotonic_increasing(),
            TableIndex::Multi(_) => {
                let keys = self.keys();
                keys.windows(2).all(|w| w[0] <= w[1])
            }
        }
    }

    pub fn take(&self, positions: &[usize]) -> Result<TableIndex> {
        match self {
            TableIndex::Flat(idx) => Ok(TableIndex::Flat(idx.take(positions)?)),
            TableIndex::Multi(idx) => Ok(TableIndex::Multi(idx.take(positions)?)),
        }
    }

    pub fn get_level_values(&self, level: usize) -> Result<Index> {
        match self {
            TableIndex::Flat(idx) if level == 0 => Ok(idx.clone()),
            TableIndex::Flat(_) => Err(Error::IndexOutOfBounds { index: level, size: 1 }),
            TableIndex::Multi(idx) => idx.get_level_values(level),
        }
    }

    pub fn swaplevel(&self, i: usize, j: usize) -> Result<TableIndex> {
        match self {
            TableIndex::Flat(idx) if i == 0 && j == 0 => Ok(TableIndex::Flat(idx.clone())),
            TableIndex::Flat(_) => Err(Error::IndexOutOfBounds {
                index: i.max(j),
                size: 1,
            }),
            TableIndex::Multi(idx) => Ok(TableIndex::Multi(idx.swaplevel(i, j)?)),
        }
    }

    /// Remove one level; two-level indexes collapse to a flat index
    pub fn droplevel(&self, level: usize) -> Result<TableIndex> {
        match self {
            TableIndex::Flat(_) => Err(Error::InvalidInput(
                "cannot drop the only level of an index".into(),
            )),
            TableIndex::Multi(idx) => {
                let (tuples, names) = idx.droplevel_tuples(level)?;
                TableIndex::from_keys(tuples, names)
            }
        }
    }

    /// Stable sort permutation, starting at `level`
    pub fn sort_order(&self, level: usize) -> Result<Vec<usize>> {
        match self {
            TableIndex::Flat(idx) if level == 0 => Ok(idx.argsort()),
            TableIndex::Flat(_) => Err(Error::IndexOutOfBounds { index: level, size: 1 }),
            TableIndex::Multi(idx) => idx.sort_order(level),
        }
    }

    /// Positions whose `level` value equals `label`
    pub fn level_positions(&self, level: usize, label: &Label) -> Result<Vec<usize>> {
        match self {
            TableIndex::Flat(idx) if level == 0 => Ok(idx.positions_of(label)),
            TableIndex::Flat(_) => Err(Error::IndexOutOfBounds { index: level, size: 1 }),
            TableIndex::Multi(idx) => idx.level_positions(level, label),
        }
    }

    /// Append key tuples of `other` after this index
    pub fn append(&self, other: &TableIndex) -> Result<TableIndex> {
        if self.nlevels() != other.nlevels() {
            return Err(Error::ShapeMismatch(format!(
                "cannot append an index with {} levels to one with {}",
                other.nlevels(),
                self.nlevels()
            )));
        }
        let mut keys = self.keys();
        keys.extend(other.keys());
        TableIndex::from_keys(keys, self.names())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_lookup() {
        let idx = Index::from_values(vec!["a", "b", "a"]);
        assert_eq!(idx.positions_of(&Label::from("a")), vec![0, 2]);
        assert!(matches!(
            idx.get_loc(&Label::from("a")),
            Err(Error::DuplicateLabel(_))
        ));
        assert_eq!(idx.get_loc(&Label::from("b")).unwrap(), 1);
        assert!(matches!(
            idx.positions_of_strict(&Label::from("z")),
            Err(Error::KeyNotFound(_))
        ));
    }

    #[test]
    fn slice_requires_sorted() {
        let idx = Index::from_values(vec!["b", "a"]);
        assert!(matches!(
            idx.slice(&Label::from("a"), &Label::from("b")),
            Err(Error::UnsortedIndex(_))
        ));
        let idx = Index::from_values(vec!["a", "b", "c", "d"]);
        let sliced = idx.slice(&Label::from("b"), &Label::from("c")).unwrap();
        assert_eq!(sliced.labels(), &[Label::from("b"), Label::from("c")]);
    }

    #[test]
    fn set_algebra_keeps_sorted_order() {
        let a = Index::from_values(vec![1i64, 3, 5]);
        let b = Index::from_values(vec![2i64, 3, 4]);
        assert_eq!(a.union(&b), Index::from_values(vec![1i64, 2, 3, 4, 5]));
        assert_eq!(a.intersection(&b), Index::from_values(vec![3i64]));
        assert_eq!(a.difference(&b), Index::from_values(vec![1i64, 5]));
        assert_eq!(
            a.symmetric_difference(&b),
            Index::from_values(vec![1i64, 2, 4, 5])
        );
    }

    #[test]
    fn unsorted_union_keeps_left_then_right_order() {
        let a = Index::from_values(vec!["c", "a"]);
        let b = Index::from_values(vec!["b", "a"]);
        assert_eq!(a.union(&b), Index::from_values(vec!["c", "a", "b"]));
    }

    #[test]
    fn droplevel_collapses_to_flat() {
        let keys = vec![
            vec![Label::from("a"), Label::Int(1)],
            vec![Label::from("b"), Label::Int(2)],
        ];
        let idx = TableIndex::from_keys(keys, vec![Some("k".into()), None]).unwrap();
        let dropped = idx.droplevel(1).unwrap();
        assert!(!dropped.is_multi());
        assert_eq!(dropped.names(), vec![Some("k".to_string())]);
    }
}
