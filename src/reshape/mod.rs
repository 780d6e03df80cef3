//! 形状変換（stack / unstack / pivot / melt）
//!
//! どの操作も新しいSeriesまたはTableを返す。

mod melt;
mod pivot;

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::index::{Index, TableIndex};
use crate::series::Series;
use crate::table::Table;
use crate::value::{common_dtype, format_tuple, DType, Label, Value};

pub use melt::MeltOptions;

/// stackの結果: 列が一段ならSeries、階層列ならTable
#[derive(Debug, Clone, PartialEq)]
pub enum Stacked {
    Series(Series),
    Table(Table),
}

impl Stacked {
    pub fn into_series(self) -> Result<Series> {
        match self {
            Stacked::Series(s) => Ok(s),
            Stacked::Table(_) => Err(Error::InvalidInput(
                "stack produced a table, not a series".into(),
            )),
        }
    }

    pub fn into_table(self) -> Result<Table> {
        match self {
            Stacked::Table(t) => Ok(t),
            Stacked::Series(_) => Err(Error::InvalidInput(
                "stack produced a series, not a table".into(),
            )),
        }
    }
}

/// unstackで行インデックスから列へ移す位置の対応表
struct UnstackPlan {
    /// 残った行レベルのインデックス
    rows: TableIndex,
    /// 列へ移したレベルの値（ソート済み）
    column_keys: Vec<Vec<Label>>,
    column_names: Vec<Option<String>>,
    /// 列キーごと・出力行ごとの元の位置
    grid: Vec<Vec<Option<usize>>>,
}

fn unstack_plan(index: &TableIndex, levels: &[usize]) -> Result<UnstackPlan> {
    let nlevels = index.nlevels();
    if levels.is_empty() || levels.len() >= nlevels {
        return Err(Error::InvalidInput(format!(
            "cannot unstack {} of {} index levels",
            levels.len(),
            nlevels
        )));
    }
    if let Some(&bad) = levels.iter().find(|&&l| l >= nlevels) {
        return Err(Error::IndexOutOfBounds {
            index: bad,
            size: nlevels,
        });
    }
    let distinct: BTreeSet<usize> = levels.iter().copied().collect();
    if distinct.len() != levels.len() {
        return Err(Error::InvalidInput("unstack levels must be distinct".into()));
    }

    let keys = index.keys();
    let split = |key: &[Label]| -> (Vec<Label>, Vec<Label>) {
        let row = (0..nlevels)
            .filter(|l| !levels.contains(l))
            .map(|l| key[l].clone())
            .collect();
        let col = levels.iter().map(|&l| key[l].clone()).collect();
        (row, col)
    };

    let mut row_keys: BTreeMap<Vec<Label>, usize> = BTreeMap::new();
    let mut col_keys: BTreeMap<Vec<Label>, usize> = BTreeMap::new();
    for key in &keys {
        let (row, col) = split(key);
        row_keys.insert(row, 0);
        col_keys.insert(col, 0);
    }
    for (i, v) in row_keys.values_mut().enumerate() {
        *v = i;
    }
    for (i, v) in col_keys.values_mut().enumerate() {
        *v = i;
    }

    let mut grid = vec![vec![None; row_keys.len()]; col_keys.len()];
    for (pos, key) in keys.iter().enumerate() {
        let (row, col) = split(key);
        let r = row_keys[&row];
        let c = col_keys[&col];
        if grid[c][r].is_some() {
            return Err(Error::DuplicateKey(format!(
                "{} / {}",
                format_tuple(&row),
                format_tuple(&col)
            )));
        }
        grid[c][r] = Some(pos);
    }

    let names = index.names();
    let row_names = (0..nlevels)
        .filter(|l| !levels.contains(l))
        .map(|l| names[l].clone())
        .collect();
    let column_names = levels.iter().map(|&l| names[l].clone()).collect();

    debug!(
        "unstack: {} rows x {} column keys from {} entries",
        row_keys.len(),
        col_keys.len(),
        keys.len()
    );
    Ok(UnstackPlan {
        rows: TableIndex::from_keys(row_keys.into_keys().collect(), row_names)?,
        column_keys: col_keys.into_keys().collect(),
        column_names,
        grid,
    })
}

/// Smallest dtype holding every non-empty column
fn stacked_dtype(columns: &[&Column]) -> Result<DType> {
    let mut dtype = DType::Null;
    for column in columns {
        if column.null_count() < column.len() {
            dtype = common_dtype(dtype, column.dtype())?;
        }
    }
    if dtype == DType::Null {
        dtype = columns.first().map(|c| c.dtype()).unwrap_or(DType::Float64);
    }
    Ok(dtype)
}

impl Series {
    /// 行インデックスのレベルを列へ移す
    ///
    /// 存在しない組み合わせはNull、重複は `DuplicateKey`。行と列のラベルはソートされる。
    pub fn unstack(&self, level: usize) -> Result<Table> {
        self.unstack_levels(&[level])
    }

    /// 複数レベルを列へ移す（列は階層インデックスになる）
    pub fn unstack_levels(&self, levels: &[usize]) -> Result<Table> {
        let plan = unstack_plan(self.index(), levels)?;
        let data = plan
            .grid
            .iter()
            .map(|positions| self.column().take_opt(positions))
            .collect();
        let columns = TableIndex::from_keys(plan.column_keys, plan.column_names)?;
        Table::new(plan.rows, columns, data)
    }
}

impl Table {
    /// 列を行インデックスの最内レベルへ移す
    ///
    /// 列が一段ならSeries、階層列なら最内レベルだけを移したTableを返す。
    /// `dropna` がtrueならNullのセル（階層列ではすべてNullの行）を除く。
    pub fn stack(&self, dropna: bool) -> Result<Stacked> {
        match self.columns() {
            TableIndex::Flat(columns) => self.stack_flat(columns, dropna).map(Stacked::Series),
            TableIndex::Multi(_) => self.stack_inner_level(dropna).map(Stacked::Table),
        }
    }

    fn stack_flat(&self, columns: &Index, dropna: bool) -> Result<Series> {
        let cols: Vec<&Column> = self.data().iter().collect();
        let dtype = stacked_dtype(&cols)?;
        let mut keys = Vec::with_capacity(self.nrows() * self.ncols());
        let mut values = Vec::with_capacity(self.nrows() * self.ncols());
        for r in 0..self.nrows() {
            let row_key = self.index().key_at(r).unwrap_or_default();
            for (c, label) in columns.labels().iter().enumerate() {
                let v = self.data()[c].get(r);
                if dropna && v.is_null() {
                    continue;
                }
                let mut key = row_key.clone();
                key.push(label.clone());
                keys.push(key);
                values.push(v);
            }
        }
        let mut names = self.index().names();
        names.push(columns.name().map(str::to_string));
        let index = TableIndex::from_keys(keys, names)?;
        Series::new(Column::from_values_as(values, dtype)?, index, None)
    }

    fn stack_inner_level(&self, dropna: bool) -> Result<Table> {
        let col_keys = self.columns().keys();
        let inner = self.columns().nlevels() - 1;

        let mut outer: Vec<Vec<Label>> = Vec::new();
        let mut inner_labels: Vec<Label> = Vec::new();
        for key in &col_keys {
            let o = key[..inner].to_vec();
            if !outer.contains(&o) {
                outer.push(o);
            }
            if !inner_labels.contains(&key[inner]) {
                inner_labels.push(key[inner].clone());
            }
        }
        inner_labels.sort();

        // 出力列ごとの入力列（内側ラベルごと）
        let lookup: Vec<Vec<Option<usize>>> = outer
            .iter()
            .map(|o| {
                inner_labels
                    .iter()
                    .map(|i| {
                        let mut key = o.clone();
                        key.push(i.clone());
                        col_keys.iter().position(|k| *k == key)
                    })
                    .collect()
            })
            .collect();

        let mut keys = Vec::new();
        let mut cells: Vec<Vec<Value>> = vec![Vec::new(); outer.len()];
        for r in 0..self.nrows() {
            let row_key = self.index().key_at(r).unwrap_or_default();
            for (j, label) in inner_labels.iter().enumerate() {
                let row: Vec<Value> = lookup
                    .iter()
                    .map(|srcs| match srcs[j] {
                        Some(c) => self.data()[c].get(r),
                        None => Value::Null,
                    })
                    .collect();
                if dropna && row.iter().all(Value::is_null) {
                    continue;
                }
                let mut key = row_key.clone();
                key.push(label.clone());
                keys.push(key);
                for (o, v) in row.into_iter().enumerate() {
                    cells[o].push(v);
                }
            }
        }

        let data = cells
            .into_iter()
            .zip(&lookup)
            .map(|(values, srcs)| {
                let cols: Vec<&Column> = srcs.iter().flatten().map(|&c| &self.data()[c]).collect();
                Column::from_values_as(values, stacked_dtype(&cols)?)
            })
            .collect::<Result<Vec<_>>>()?;

        let col_names = self.columns().names();
        let mut row_names = self.index().names();
        row_names.push(col_names[inner].clone());
        let index = TableIndex::from_keys(keys, row_names)?;
        let columns = TableIndex::from_keys(outer, col_names[..inner].to_vec())?;
        Table::new(index, columns, data)
    }

    /// 行インデックスのレベルを列へ移す。列は `(元の列, レベル値)` の階層インデックス。
    pub fn unstack(&self, level: usize) -> Result<Table> {
        self.unstack_levels(&[level])
    }

    pub fn unstack_levels(&self, levels: &[usize]) -> Result<Table> {
        let plan = unstack_plan(self.index(), levels)?;
        let own_keys = self.columns().keys();
        let mut keys = Vec::with_capacity(own_keys.len() * plan.column_keys.len());
        let mut data = Vec::with_capacity(keys.capacity());
        for (c, own) in own_keys.iter().enumerate() {
            for (v, positions) in plan.column_keys.iter().zip(&plan.grid) {
                let mut key = own.clone();
                key.extend(v.iter().cloned());
                keys.push(key);
                data.push(self.data()[c].take_opt(positions));
            }
        }
        let mut names = self.columns().names();
        names.extend(plan.column_names);
        Table::new(plan.rows, TableIndex::from_keys(keys, names)?, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level() -> Series {
        let keys = vec![
            vec![Label::from("r1"), Label::from("b")],
            vec![Label::from("r1"), Label::from("a")],
            vec![Label::from("r2"), Label::from("a")],
        ];
        let index = TableIndex::from_keys(keys, vec![Some("row".into()), Some("col".into())])
            .unwrap();
        Series::new(Column::from_i64(vec![1, 2, 3]), index, None).unwrap()
    }

    #[test]
    fn unstack_sorts_and_fills_null() {
        let t = two_level().unstack(1).unwrap();
        assert_eq!(t.shape(), (2, 2));
        assert_eq!(t.column_names(), vec!["a", "b"]);
        assert_eq!(t.value(&[Label::from("r1")], &[Label::from("b")]).unwrap(), Value::Int64(1));
        assert_eq!(t.value(&[Label::from("r2")], &[Label::from("b")]).unwrap(), Value::Null);
    }

    #[test]
    fn unstack_flat_index_is_rejected() {
        let s = Series::from_values(vec![1i64], None).unwrap();
        assert!(matches!(s.unstack(0), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn stack_drops_nulls() {
        let t = two_level().unstack(1).unwrap();
        let s = t.stack(true).unwrap().into_series().unwrap();
        assert_eq!(s.len(), 3);
        assert_eq!(s.index().names(), vec![Some("row".to_string()), Some("col".to_string())]);
    }
}
