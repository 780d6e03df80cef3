//! Two-dimensional labelled table
//!
//! A [`Table`] holds a shared row index, a column index and one [`Column`]
//! per column label. Every operation returns a new table; buffers are shared
//! where nothing changed.

mod export;

use std::collections::HashSet;
use std::sync::Arc;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::index::{Index, TableIndex};
use crate::ops::align::{gather, reindex_positions, FillPolicy};
use crate::series::Series;
use crate::value::{format_tuple, DType, Label, Value};

/// Columnar table keyed by a row index and a column index
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    index: Arc<TableIndex>,
    columns: TableIndex,
    data: Vec<Column>,
}

impl Table {
    /// Build a table, checking that every column matches the row count and
    /// that there is one column per column label
    pub fn new(index: TableIndex, columns: TableIndex, data: Vec<Column>) -> Result<Self> {
        Self::with_shared_index(Arc::new(index), columns, data)
    }

    pub(crate) fn with_shared_index(
        index: Arc<TableIndex>,
        columns: TableIndex,
        data: Vec<Column>,
    ) -> Result<Self> {
        if columns.len() != data.len() {
            return Err(Error::LengthMismatch {
                expected: columns.len(),
                actual: data.len(),
            });
        }
        if let Some(bad) = data.iter().find(|c| c.len() != index.len()) {
            return Err(Error::LengthMismatch {
                expected: index.len(),
                actual: bad.len(),
            });
        }
        Ok(Table {
            index,
            columns,
            data,
        })
    }

    /// A table with no columns over `index`
    pub fn empty(index: TableIndex) -> Self {
        Table {
            index: Arc::new(index),
            columns: TableIndex::Flat(Index::new(Vec::new())),
            data: Vec::new(),
        }
    }

    /// Build from `(label, values)` pairs with a default integer row index
    pub fn from_columns<L: Into<Label>>(columns: Vec<(L, Vec<Value>)>) -> Result<Self> {
        let mut labels = Vec::with_capacity(columns.len());
        let mut data = Vec::with_capacity(columns.len());
        for (label, values) in columns {
            labels.push(label.into());
            data.push(Column::from_values(values)?);
        }
        let nrows = data.first().map(Column::len).unwrap_or(0);
        Self::new(
            TableIndex::range(nrows),
            TableIndex::Flat(Index::new(labels)),
            data,
        )
    }

    /// Build from already typed columns
    pub fn from_typed_columns<L: Into<Label>>(columns: Vec<(L, Column)>) -> Result<Self> {
        let nrows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        let (labels, data): (Vec<Label>, Vec<Column>) =
            columns.into_iter().map(|(l, c)| (l.into(), c)).unzip();
        Self::new(
            TableIndex::range(nrows),
            TableIndex::Flat(Index::new(labels)),
            data,
        )
    }

    /// Build from row records. Columns appear in first-seen order and a key
    /// missing from a record reads as null.
    pub fn from_records<L: Into<Label>>(records: Vec<Vec<(L, Value)>>) -> Result<Self> {
        let mut labels: Vec<Label> = Vec::new();
        let mut rows: Vec<Vec<(Label, Value)>> = Vec::with_capacity(records.len());
        let mut seen = HashSet::new();
        for record in records {
            let row: Vec<(Label, Value)> = record.into_iter().map(|(k, v)| (k.into(), v)).collect();
            for (k, _) in &row {
                if seen.insert(k.clone()) {
                    labels.push(k.clone());
                }
            }
            rows.push(row);
        }

        let columns = Index::new(labels);
        let mut cells = vec![vec![Value::Null; rows.len()]; columns.len()];
        for (r, row) in rows.into_iter().enumerate() {
            for (k, v) in row {
                let c = columns.get_loc(&k)?;
                cells[c][r] = v;
            }
        }
        let data = cells
            .into_iter()
            .map(Column::from_values)
            .collect::<Result<Vec<_>>>()?;
        Self::new(TableIndex::range(data.first().map(Column::len).unwrap_or(0)), TableIndex::Flat(columns), data)
    }

    /// Build from row-major values
    pub fn from_rows<L: Into<Label>>(rows: Vec<Vec<Value>>, columns: Vec<L>) -> Result<Self> {
        let labels: Vec<Label> = columns.into_iter().map(Into::into).collect();
        let width = labels.len();
        let nrows = rows.len();
        let mut cells = vec![Vec::with_capacity(nrows); width];
        for row in rows {
            if row.len() != width {
                return Err(Error::LengthMismatch {
                    expected: width,
                    actual: row.len(),
                });
            }
            for (c, v) in row.into_iter().enumerate() {
                cells[c].push(v);
            }
        }
        let data = cells
            .into_iter()
            .map(Column::from_values)
            .collect::<Result<Vec<_>>>()?;
        Self::new(TableIndex::range(nrows), TableIndex::Flat(Index::new(labels)), data)
    }

    /// Combine named series sharing one row index
    pub fn from_series(series: Vec<Series>) -> Result<Self> {
        let Some(first) = series.first() else {
            return Ok(Table::empty(TableIndex::range(0)));
        };
        let index = Arc::clone(first.index_arc());
        let mut labels = Vec::with_capacity(series.len());
        let mut data = Vec::with_capacity(series.len());
        for (i, s) in series.iter().enumerate() {
            if s.index() != index.as_ref() {
                return Err(Error::ShapeMismatch(
                    "series must share one row index".into(),
                ));
            }
            labels.push(match s.name() {
                Some(name) => Label::from(name),
                None => Label::from(i),
            });
            data.push(s.column().clone());
        }
        Self::with_shared_index(index, TableIndex::Flat(Index::new(labels)), data)
    }

    /// Replace the row index
    pub fn with_index(&self, index: TableIndex) -> Result<Table> {
        Self::new(index, self.columns.clone(), self.data.clone())
    }

    /// Replace the column index
    pub fn with_columns(&self, columns: TableIndex) -> Result<Table> {
        Self::with_shared_index(Arc::clone(&self.index), columns, self.data.clone())
    }

    pub fn nrows(&self) -> usize {
        self.index.len()
    }

    pub fn ncols(&self) -> usize {
        self.data.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    pub fn is_empty(&self) -> bool {
        self.nrows() == 0 || self.ncols() == 0
    }

    pub fn index(&self) -> &TableIndex {
        &self.index
    }

    pub(crate) fn index_arc(&self) -> &Arc<TableIndex> {
        &self.index
    }

    pub fn columns(&self) -> &TableIndex {
        &self.columns
    }

    pub fn data(&self) -> &[Column] {
        &self.data
    }

    pub fn dtypes(&self) -> Vec<DType> {
        self.data.iter().map(Column::dtype).collect()
    }

    /// Position of a column key; single labels address flat columns
    pub fn column_position(&self, key: &[Label]) -> Result<usize> {
        self.columns.get_loc(key)
    }

    /// Column as a Series, addressed by a flat label
    pub fn column<L: Into<Label>>(&self, label: L) -> Result<Series> {
        let pos = self.column_position(&[label.into()])?;
        self.column_at(pos)
    }

    /// Column as a Series, addressed by a full column key
    pub fn column_by_key(&self, key: &[Label]) -> Result<Series> {
        let pos = self.column_position(key)?;
        self.column_at(pos)
    }

    pub fn column_at(&self, pos: usize) -> Result<Series> {
        let column = self.data.get(pos).ok_or(Error::IndexOutOfBounds {
            index: pos,
            size: self.data.len(),
        })?;
        let name = self.columns.key_at(pos).map(|k| column_name(&k));
        Series::with_shared_index(column.clone(), Arc::clone(&self.index), name)
    }

    /// Add a column, or replace an existing one with the same label
    pub fn with_column<L: Into<Label>>(&self, label: L, column: Column) -> Result<Table> {
        if column.len() != self.nrows() {
            return Err(Error::LengthMismatch {
                expected: self.nrows(),
                actual: column.len(),
            });
        }
        let key = vec![label.into()];
        let mut data = self.data.clone();
        match self.columns.positions_of(&key).first() {
            Some(&pos) => {
                data[pos] = column;
                Self::with_shared_index(Arc::clone(&self.index), self.columns.clone(), data)
            }
            None => {
                let mut keys = self.columns.keys();
                keys.push(key);
                data.push(column);
                let columns = TableIndex::from_keys(keys, self.columns.names())?;
                Self::with_shared_index(Arc::clone(&self.index), columns, data)
            }
        }
    }

    /// Select columns by flat label, in the given order
    pub fn select(&self, labels: &[Label]) -> Result<Table> {
        let positions = labels
            .iter()
            .map(|l| self.column_position(std::slice::from_ref(l)))
            .collect::<Result<Vec<_>>>()?;
        self.take_columns(&positions)
    }

    pub fn take_columns(&self, positions: &[usize]) -> Result<Table> {
        let columns = self.columns.take(positions)?;
        let data = positions.iter().map(|&p| self.data[p].clone()).collect();
        Self::with_shared_index(Arc::clone(&self.index), columns, data)
    }

    /// Remove columns by flat label
    pub fn drop_columns(&self, labels: &[Label]) -> Result<Table> {
        let mut dropped = HashSet::new();
        for label in labels {
            dropped.extend(self.columns.positions_of_strict(std::slice::from_ref(label))?);
        }
        let keep: Vec<usize> = (0..self.ncols()).filter(|p| !dropped.contains(p)).collect();
        self.take_columns(&keep)
    }

    /// Remove every row whose key (or outer-level prefix) is listed
    pub fn drop(&self, keys: &[Vec<Label>]) -> Result<Table> {
        let mut dropped = HashSet::new();
        for key in keys {
            dropped.extend(self.index.positions_of_strict(key)?);
        }
        let keep: Vec<usize> = (0..self.nrows()).filter(|p| !dropped.contains(p)).collect();
        self.take(&keep)
    }

    /// Gather rows by position
    pub fn take(&self, positions: &[usize]) -> Result<Table> {
        let index = self.index.take(positions)?;
        let data = self
            .data
            .iter()
            .map(|c| c.take(positions))
            .collect::<Result<Vec<_>>>()?;
        Self::new(index, self.columns.clone(), data)
    }

    /// Rows matching a key tuple, or a prefix of the outer levels
    pub fn loc(&self, key: &[Label]) -> Result<Table> {
        let positions = self.index.positions_of_strict(key)?;
        self.take(&positions)
    }

    /// Rows in the inclusive label range of a sorted flat index
    pub fn loc_range(&self, start: &Label, end: &Label) -> Result<Table> {
        match self.index.as_ref() {
            TableIndex::Flat(idx) => {
                let positions = idx.slice_labels(start, end)?;
                self.take(&positions)
            }
            TableIndex::Multi(_) => Err(Error::InvalidInput(
                "label ranges need a flat row index".into(),
            )),
        }
    }

    pub fn iloc(&self, positions: &[usize]) -> Result<Table> {
        self.take(positions)
    }

    pub fn head(&self, n: usize) -> Result<Table> {
        let positions: Vec<usize> = (0..n.min(self.nrows())).collect();
        self.take(&positions)
    }

    /// Cross-section: rows whose `level` equals `label`, with that level
    /// removed from a hierarchical index
    pub fn xs(&self, label: &Label, level: usize) -> Result<Table> {
        let positions = self.index.level_positions(level, label)?;
        if positions.is_empty() {
            return Err(Error::KeyNotFound(label.to_string()));
        }
        let rows = self.take(&positions)?;
        match rows.index.as_ref() {
            TableIndex::Flat(_) => Ok(rows),
            TableIndex::Multi(_) => {
                let index = rows.index.droplevel(level)?;
                rows.with_index(index)
            }
        }
    }

    /// Cell at a row key and column key
    pub fn value(&self, row: &[Label], column: &[Label]) -> Result<Value> {
        let r = self.index.get_loc(row)?;
        let c = self.column_position(column)?;
        Ok(self.data[c].get(r))
    }

    /// Cell by position
    pub fn iat(&self, row: usize, column: usize) -> Result<Value> {
        self.data
            .get(column)
            .ok_or(Error::IndexOutOfBounds {
                index: column,
                size: self.ncols(),
            })?
            .try_get(row)
    }

    /// Move columns into the row index
    pub fn set_index(&self, labels: &[Label], drop: bool) -> Result<Table> {
        let positions = labels
            .iter()
            .map(|l| self.column_position(std::slice::from_ref(l)))
            .collect::<Result<Vec<_>>>()?;
        let key_columns = positions
            .iter()
            .map(|&p| column_labels(&self.data[p]))
            .collect::<Result<Vec<_>>>()?;
        let keys: Vec<Vec<Label>> = (0..self.nrows())
            .map(|r| key_columns.iter().map(|c| c[r].clone()).collect())
            .collect();
        let names = labels.iter().map(|l| Some(l.to_string())).collect();
        let index = TableIndex::from_keys(keys, names)?;

        let source = if drop {
            let keep: Vec<usize> = (0..self.ncols()).filter(|p| !positions.contains(p)).collect();
            self.take_columns(&keep)?
        } else {
            self.clone()
        };
        source.with_index(index)
    }

    /// Move every index level back into leading columns and install a
    /// default integer index
    pub fn reset_index(&self) -> Result<Table> {
        let nlevels = self.index.nlevels();
        let width = self.columns.nlevels();
        let mut keys = Vec::with_capacity(nlevels + self.ncols());
        let mut data = Vec::with_capacity(nlevels + self.ncols());

        for (level, name) in self.index.names().into_iter().enumerate() {
            let name = name.unwrap_or_else(|| {
                if nlevels == 1 {
                    "index".to_string()
                } else {
                    format!("level_{}", level)
                }
            });
            let mut key = vec![Label::from(name)];
            key.extend(std::iter::repeat(Label::from("")).take(width - 1));
            keys.push(key);

            let values = self.index.get_level_values(level)?;
            data.push(Column::from_values(
                values.labels().iter().map(Label::to_value).collect(),
            )?);
        }
        keys.extend(self.columns.keys());
        data.extend(self.data.iter().cloned());

        let columns = TableIndex::from_keys(keys, self.columns.names())?;
        Self::new(TableIndex::range(self.nrows()), columns, data)
    }

    /// Conform rows to `index`, filling unmatched rows per `policy`
    pub fn reindex(&self, index: TableIndex, policy: FillPolicy) -> Result<Table> {
        let positions = reindex_positions(&self.index, &index, &policy)?;
        let data = self
            .data
            .iter()
            .map(|c| gather(c, &positions, &policy))
            .collect::<Result<Vec<_>>>()?;
        Self::new(index, self.columns.clone(), data)
    }

    /// Sort rows by index, starting at `level`
    pub fn sort_index(&self, level: usize) -> Result<Table> {
        let order = self.index.sort_order(level)?;
        self.take(&order)
    }

    /// Values of row `pos` in column order
    pub fn row(&self, pos: usize) -> Result<Vec<Value>> {
        if pos >= self.nrows() {
            return Err(Error::IndexOutOfBounds {
                index: pos,
                size: self.nrows(),
            });
        }
        Ok(self.data.iter().map(|c| c.get(pos)).collect())
    }

    /// Build a table of the same shape with each column replaced by `f`
    pub(crate) fn map_columns<F>(&self, f: F) -> Result<Table>
    where
        F: Fn(&Column) -> Result<Column>,
    {
        let data = self.data.iter().map(f).collect::<Result<Vec<_>>>()?;
        Self::with_shared_index(Arc::clone(&self.index), self.columns.clone(), data)
    }
}

/// Series name for a column key
pub(crate) fn column_name(key: &[Label]) -> String {
    format_tuple(key)
}

/// Read a column as row labels; float columns are rejected
pub(crate) fn column_labels(column: &Column) -> Result<Vec<Label>> {
    (0..column.len()).map(|i| column.get(i).to_label()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_columns(vec![
            ("k", vec![Value::from("a"), Value::from("b"), Value::from("a")]),
            ("v", vec![Value::from(1i64), Value::from(2i64), Value::from(3i64)]),
        ])
        .unwrap()
    }

    #[test]
    fn records_fill_missing_keys() {
        let t = Table::from_records(vec![
            vec![("a", Value::from(1i64))],
            vec![("a", Value::from(2i64)), ("b", Value::from("x"))],
        ])
        .unwrap();
        assert_eq!(t.shape(), (2, 2));
        assert_eq!(t.iat(0, 1).unwrap(), Value::Null);
    }

    #[test]
    fn set_and_reset_index() {
        let t = sample().set_index(&[Label::from("k")], true).unwrap();
        assert_eq!(t.ncols(), 1);
        assert_eq!(t.index().names(), vec![Some("k".to_string())]);
        assert_eq!(t.loc(&[Label::from("a")]).unwrap().nrows(), 2);

        let back = t.reset_index().unwrap();
        assert_eq!(back.shape(), (3, 2));
        assert_eq!(back.column("k").unwrap().get(1), Value::from("b"));
    }

    #[test]
    fn float_column_cannot_become_index() {
        let t = Table::from_columns(vec![("f", vec![Value::from(1.5)])]).unwrap();
        assert!(matches!(
            t.set_index(&[Label::from("f")], true),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn with_column_replaces_in_place() {
        let t = sample()
            .with_column("v", Column::from_i64(vec![7, 8, 9]))
            .unwrap();
        assert_eq!(t.ncols(), 2);
        assert_eq!(t.column("v").unwrap().get(0), Value::Int64(7));
    }
}
