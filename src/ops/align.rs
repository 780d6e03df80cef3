//! Label alignment and reindexing plans
//!
//! Both produce `Vec<Option<usize>>` position vectors that columns gather
//! through [`Column::take_opt`](crate::column::Column::take_opt).

use std::collections::{HashMap, HashSet};

use log::trace;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::index::TableIndex;
use crate::value::{format_tuple, Label, Value};

/// Join semantics used when aligning two indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    /// Only labels present on both sides
    Inner,
    /// Every left row; right fills with nulls
    Left,
    /// Every right row; left fills with nulls
    Right,
    /// Union of both sides. Default for arithmetic.
    #[default]
    Outer,
}

/// Result index plus, for every output row, the source row on each side
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentPlan {
    pub index: TableIndex,
    pub left_positions: Vec<Option<usize>>,
    pub right_positions: Vec<Option<usize>>,
}

impl AlignmentPlan {
    pub fn len(&self) -> usize {
        self.left_positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left_positions.is_empty()
    }

    /// Whether both sides map one-to-one onto the output without gaps
    pub fn is_identity(&self) -> bool {
        self.left_positions
            .iter()
            .zip(&self.right_positions)
            .enumerate()
            .all(|(i, (l, r))| *l == Some(i) && *r == Some(i))
    }
}

/// Align two indexes.
///
/// Identical indexes pair positionally. Otherwise a label seen `m` times on
/// the left and `n` times on the right produces the cartesian product of its
/// occurrences: `max(m,1) * max(n,1)` rows for an outer join.
pub fn align(left: &TableIndex, right: &TableIndex, how: JoinKind) -> Result<AlignmentPlan> {
    if left.nlevels() != right.nlevels() {
        return Err(Error::ShapeMismatch(format!(
            "cannot align an index with {} levels against one with {}",
            left.nlevels(),
            right.nlevels()
        )));
    }

    if left == right {
        let positions: Vec<Option<usize>> = (0..left.len()).map(Some).collect();
        return Ok(AlignmentPlan {
            index: left.clone(),
            left_positions: positions.clone(),
            right_positions: positions,
        });
    }

    let names = shared_names(left, right);
    let left_keys = left.keys();
    let right_keys = right.keys();

    let plan = match how {
        JoinKind::Inner => join_from(&left_keys, &right_keys, false),
        JoinKind::Left => join_from(&left_keys, &right_keys, true),
        JoinKind::Right => {
            let (keys, r, l) = join_from(&right_keys, &left_keys, true);
            (keys, l, r)
        }
        JoinKind::Outer => {
            if left.is_monotonic_increasing() && right.is_monotonic_increasing() {
                outer_sorted(&left_keys, &right_keys)
            } else {
                outer_unsorted(&left_keys, &right_keys)
            }
        }
    };
    let (keys, left_positions, right_positions) = plan;
    trace!(
        "aligned {} x {} rows into {} ({:?})",
        left.len(),
        right.len(),
        keys.len(),
        how
    );

    Ok(AlignmentPlan {
        index: TableIndex::from_keys(keys, names)?,
        left_positions,
        right_positions,
    })
}

type JoinRows = (Vec<Vec<Label>>, Vec<Option<usize>>, Vec<Option<usize>>);

fn position_map(keys: &[Vec<Label>]) -> HashMap<&[Label], Vec<usize>> {
    let mut map: HashMap<&[Label], Vec<usize>> = HashMap::with_capacity(keys.len());
    for (i, key) in keys.iter().enumerate() {
        map.entry(key.as_slice()).or_default().push(i);
    }
    map
}

/// Walk `driver` in order, pairing each row with every match on `other`.
/// `keep_unmatched` turns the inner join into a driver-side join.
fn join_from(driver: &[Vec<Label>], other: &[Vec<Label>], keep_unmatched: bool) -> JoinRows {
    let other_map = position_map(other);
    let mut keys = Vec::with_capacity(driver.len());
    let mut d_pos = Vec::with_capacity(driver.len());
    let mut o_pos = Vec::with_capacity(driver.len());

    for (i, key) in driver.iter().enumerate() {
        match other_map.get(key.as_slice()) {
            Some(matches) => {
                for &j in matches {
                    keys.push(key.clone());
                    d_pos.push(Some(i));
                    o_pos.push(Some(j));
                }
            }
            None if keep_unmatched => {
                keys.push(key.clone());
                d_pos.push(Some(i));
                o_pos.push(None);
            }
            None => {}
        }
    }
    (keys, d_pos, o_pos)
}

fn outer_sorted(left: &[Vec<Label>], right: &[Vec<Label>]) -> JoinRows {
    let left_map = position_map(left);
    let right_map = position_map(right);

    let mut distinct: Vec<&[Label]> = left_map.keys().chain(right_map.keys()).copied().collect();
    distinct.sort();
    distinct.dedup();

    let mut keys = Vec::new();
    let mut l_pos = Vec::new();
    let mut r_pos = Vec::new();
    for key in distinct {
        let ls: Vec<Option<usize>> = match left_map.get(key) {
            Some(p) => p.iter().copied().map(Some).collect(),
            None => vec![None],
        };
        let rs: Vec<Option<usize>> = match right_map.get(key) {
            Some(p) => p.iter().copied().map(Some).collect(),
            None => vec![None],
        };
        for l in &ls {
            for r in &rs {
                keys.push(key.to_vec());
                l_pos.push(*l);
                r_pos.push(*r);
            }
        }
    }
    (keys, l_pos, r_pos)
}

/// Left order first, then right-only rows in right order
fn outer_unsorted(left: &[Vec<Label>], right: &[Vec<Label>]) -> JoinRows {
    let (mut keys, mut l_pos, mut r_pos) = join_from(left, right, true);
    let left_labels: HashSet<&[Label]> = left.iter().map(Vec::as_slice).collect();
    for (j, key) in right.iter().enumerate() {
        if !left_labels.contains(key.as_slice()) {
            keys.push(key.clone());
            l_pos.push(None);
            r_pos.push(Some(j));
        }
    }
    (keys, l_pos, r_pos)
}

fn shared_names(left: &TableIndex, right: &TableIndex) -> Vec<Option<String>> {
    left.names()
        .into_iter()
        .zip(right.names())
        .map(|(l, r)| if l == r { l } else { None })
        .collect()
}

/// How positions without an exact label match are filled by `reindex`
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FillPolicy {
    /// Leave them null
    #[default]
    Null,
    /// Take the row of the nearest preceding source label
    ForwardFill { limit: Option<usize> },
    /// Take the row of the nearest following source label
    BackwardFill { limit: Option<usize> },
    /// Fill with a constant
    Value(Value),
}

/// Source position for every label of `target`.
///
/// The source index must be unique. Forward and backward fills also need it
/// sorted; `limit` caps how many consecutive target rows reuse one source row.
pub fn reindex_positions(
    source: &TableIndex,
    target: &TableIndex,
    policy: &FillPolicy,
) -> Result<Vec<Option<usize>>> {
    if !source.is_unique() {
        let keys = source.keys();
        let mut seen = HashSet::with_capacity(keys.len());
        let dup = keys.iter().find(|k| !seen.insert(*k));
        return Err(Error::DuplicateLabel(match dup {
            Some(k) => format!("cannot reindex on duplicate label {}", format_tuple(k)),
            None => "cannot reindex on duplicate labels".into(),
        }));
    }
    if source.nlevels() != target.nlevels() {
        return Err(Error::ShapeMismatch(format!(
            "cannot reindex a {}-level index with {} levels",
            source.nlevels(),
            target.nlevels()
        )));
    }

    let target_keys = target.keys();
    let exact: Vec<Option<usize>> = target_keys
        .iter()
        .map(|k| source.positions_of(k).first().copied())
        .collect();

    match policy {
        FillPolicy::Null | FillPolicy::Value(_) => Ok(exact),
        FillPolicy::ForwardFill { limit } => {
            let source_keys = sorted_source(source)?;
            let nearest = target_keys
                .iter()
                .map(|k| {
                    let n = source_keys.partition_point(|s| s <= k);
                    n.checked_sub(1)
                })
                .collect::<Vec<_>>();
            Ok(apply_limit(&exact, &nearest, *limit, false))
        }
        FillPolicy::BackwardFill { limit } => {
            let source_keys = sorted_source(source)?;
            let len = source_keys.len();
            let nearest = target_keys
                .iter()
                .map(|k| {
                    let n = source_keys.partition_point(|s| s < k);
                    (n < len).then_some(n)
                })
                .collect::<Vec<_>>();
            Ok(apply_limit(&exact, &nearest, *limit, true))
        }
    }
}

fn sorted_source(source: &TableIndex) -> Result<Vec<Vec<Label>>> {
    if !source.is_monotonic_increasing() {
        return Err(Error::UnsortedIndex(
            "forward/backward fill requires a sorted index".into(),
        ));
    }
    Ok(source.keys())
}

/// Combine exact matches with nearest-label fills, allowing at most `limit`
/// consecutive fills from the same source row. Backward fills count runs from
/// the end.
fn apply_limit(
    exact: &[Option<usize>],
    nearest: &[Option<usize>],
    limit: Option<usize>,
    backward: bool,
) -> Vec<Option<usize>> {
    let mut out = vec![None; exact.len()];
    let mut run: Option<(usize, usize)> = None;
    let order: Box<dyn Iterator<Item = usize>> = if backward {
        Box::new((0..exact.len()).rev())
    } else {
        Box::new(0..exact.len())
    };

    for i in order {
        if let Some(p) = exact[i] {
            out[i] = Some(p);
            run = Some((p, 0));
            continue;
        }
        let Some(src) = nearest[i] else {
            continue;
        };
        let filled = match run {
            Some((p, n)) if p == src => n + 1,
            _ => 1,
        };
        run = Some((src, filled));
        if limit.map_or(true, |l| filled <= l) {
            out[i] = Some(src);
        }
    }
    out
}

/// Gather `column` onto the reindexed rows, honouring a constant fill
pub(crate) fn gather(column: &Column, positions: &[Option<usize>], policy: &FillPolicy) -> Result<Column> {
    let taken = column.take_opt(positions);
    match policy {
        FillPolicy::Value(fill) if positions.iter().any(Option::is_none) => {
            let values = taken
                .values()
                .into_iter()
                .zip(positions)
                .map(|(v, p)| if p.is_none() { fill.clone() } else { v })
                .collect();
            Column::from_values(values)
        }
        _ => Ok(taken),
    }
}
