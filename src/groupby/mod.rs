//! Split-apply-combine grouping
//!
//! A [`Grouping`] maps each key tuple to the row positions sharing it. It is
//! built once per grouped call from a [`GroupKey`], and every aggregation,
//! transform, apply and filter runs over it in group order.

pub mod agg;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, trace};
use rayon::prelude::*;

use crate::column::Column;
use crate::config::{self, EngineConfig};
use crate::error::{Error, Result};
use crate::index::TableIndex;
use crate::series::Series;
use crate::table::{column_labels, Table};
use crate::value::{format_tuple, Label, Value};

pub use agg::{AggFunc, AggSpec, CustomFn};

/// Function from a row's index key to its group value
pub type KeyFn = Arc<dyn Fn(&[Label]) -> Value + Send + Sync>;

/// グループ化キーの指定方法
#[derive(Clone)]
pub enum GroupKey {
    /// テーブルの列（1つ）
    Column(Label),
    /// テーブルの列（複数）
    Columns(Vec<Label>),
    /// 行数と同じ長さの外部配列
    Values(Vec<Value>),
    /// 外部配列（複数）
    Arrays(Vec<Vec<Value>>),
    /// 行ラベルから値を計算する関数
    Func(KeyFn),
    /// 階層インデックスのレベル番号
    Level(Vec<usize>),
    /// 階層インデックスのレベル名
    LevelNames(Vec<String>),
}

impl GroupKey {
    /// 外部配列によるキー
    pub fn values<V: Into<Value>>(values: Vec<V>) -> Self {
        GroupKey::Values(values.into_iter().map(Into::into).collect())
    }

    /// 関数によるキー
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&[Label]) -> Value + Send + Sync + 'static,
    {
        GroupKey::Func(Arc::new(f))
    }

    pub fn level(level: usize) -> Self {
        GroupKey::Level(vec![level])
    }
}

impl fmt::Debug for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Column(l) => write!(f, "Column({})", l),
            GroupKey::Columns(ls) => write!(f, "Columns({})", format_tuple(ls)),
            GroupKey::Values(v) => write!(f, "Values(len={})", v.len()),
            GroupKey::Arrays(a) => write!(f, "Arrays(n={})", a.len()),
            GroupKey::Func(_) => write!(f, "Func"),
            GroupKey::Level(l) => write!(f, "Level({:?})", l),
            GroupKey::LevelNames(n) => write!(f, "LevelNames({:?})", n),
        }
    }
}

impl From<&str> for GroupKey {
    fn from(label: &str) -> Self {
        GroupKey::Column(Label::from(label))
    }
}

impl From<Label> for GroupKey {
    fn from(label: Label) -> Self {
        GroupKey::Column(label)
    }
}

/// グループ化オプション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOptions {
    /// Nullを含むキーの行を除外する
    pub dropna: bool,
    /// キーを値の順に並べる（falseなら出現順）
    pub sort: bool,
    /// applyの結果にキーのレベルを付ける
    pub group_keys: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            dropna: true,
            sort: false,
            group_keys: true,
        }
    }
}

impl GroupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dropna(mut self, dropna: bool) -> Self {
        self.dropna = dropna;
        self
    }

    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_group_keys(mut self, group_keys: bool) -> Self {
        self.group_keys = group_keys;
        self
    }
}

/// Ordered mapping from key tuple to row positions
#[derive(Debug, Clone)]
pub struct Grouping {
    keys: Vec<Vec<Label>>,
    positions: Vec<Vec<usize>>,
    names: Vec<Option<String>>,
    nrows: usize,
    config: EngineConfig,
}

impl Grouping {
    /// Bucket rows by the per-level key labels in `levels`
    pub fn new(
        levels: Vec<Vec<Label>>,
        names: Vec<Option<String>>,
        nrows: usize,
        options: GroupOptions,
    ) -> Result<Self> {
        if levels.is_empty() {
            return Err(Error::InvalidInput("groupby needs at least one key".into()));
        }
        if let Some(bad) = levels.iter().find(|l| l.len() != nrows) {
            return Err(Error::LengthMismatch {
                expected: nrows,
                actual: bad.len(),
            });
        }

        let mut lookup: HashMap<Vec<Label>, usize> = HashMap::new();
        let mut keys: Vec<Vec<Label>> = Vec::new();
        let mut positions: Vec<Vec<usize>> = Vec::new();
        for row in 0..nrows {
            let key: Vec<Label> = levels.iter().map(|l| l[row].clone()).collect();
            if options.dropna && key.iter().any(Label::is_null) {
                trace!("row {} dropped for a null key", row);
                continue;
            }
            match lookup.get(&key) {
                Some(&g) => positions[g].push(row),
                None => {
                    lookup.insert(key.clone(), keys.len());
                    keys.push(key);
                    positions.push(vec![row]);
                }
            }
        }

        let mut order: Vec<usize> = (0..keys.len()).collect();
        if options.sort {
            order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        } else if levels.len() > 1 {
            // first-appearance rank per level
            let mut ranks: Vec<HashMap<&Label, usize>> = vec![HashMap::new(); levels.len()];
            for key in &keys {
                for (level, label) in key.iter().enumerate() {
                    let next = ranks[level].len();
                    ranks[level].entry(label).or_insert(next);
                }
            }
            let rank_of = |g: usize| -> Vec<usize> {
                keys[g]
                    .iter()
                    .enumerate()
                    .map(|(level, label)| ranks[level].get(label).copied().unwrap_or(0))
                    .collect()
            };
            order.sort_by_key(|&g| rank_of(g));
        }
        let keys: Vec<Vec<Label>> = order.iter().map(|&g| keys[g].clone()).collect();
        let positions: Vec<Vec<usize>> = order.iter().map(|&g| positions[g].clone()).collect();

        debug!("grouped {} rows into {} groups", nrows, keys.len());
        Ok(Grouping {
            keys,
            positions,
            names,
            nrows,
            config: config::global(),
        })
    }

    pub fn ngroups(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[Vec<Label>] {
        &self.keys
    }

    pub fn positions(&self) -> &[Vec<usize>] {
        &self.positions
    }

    pub fn names(&self) -> &[Option<String>] {
        &self.names
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Override the engine settings captured at construction
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Index of the aggregated result: flat for one key, hierarchical otherwise
    pub fn result_index(&self) -> Result<TableIndex> {
        TableIndex::from_keys(self.keys.clone(), self.names.clone())
    }

    /// Group number of a key
    pub fn group_of(&self, key: &[Label]) -> Result<usize> {
        self.keys
            .iter()
            .position(|k| k.as_slice() == key)
            .ok_or_else(|| Error::KeyNotFound(format_tuple(key)))
    }

    /// Evaluate `f` for every group. Large groupings run on the rayon pool;
    /// results and the reported error always follow group order.
    pub fn map_groups<T, F>(&self, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize, &[usize]) -> Result<T> + Send + Sync,
    {
        if self.config.parallel_for(self.ngroups()) {
            debug!(
                "evaluating {} groups in parallel (threshold {})",
                self.ngroups(),
                self.config.parallel_group_threshold
            );
            let results: Vec<Result<T>> = config::install(&self.config, || {
                self.positions
                    .par_iter()
                    .enumerate()
                    .map(|(g, p)| f(g, p))
                    .collect()
            });
            results.into_iter().collect()
        } else {
            self.positions
                .iter()
                .enumerate()
                .map(|(g, p)| f(g, p))
                .collect()
        }
    }

    /// Reduce `column` with `func` for every group
    pub(crate) fn aggregate_column(&self, column: &Column, func: &AggFunc) -> Result<Column> {
        let values = self.map_groups(|_, positions| func.apply(column, positions))?;
        Column::from_values(values)
    }

    /// Row count per group
    pub(crate) fn sizes(&self) -> Column {
        Column::from_i64(self.positions.iter().map(|p| p.len() as i64).collect())
    }

    /// Scatter per-group results back onto the original rows. Each result
    /// must hold one value (broadcast) or one value per group row.
    pub(crate) fn scatter(&self, results: Vec<Vec<Value>>) -> Result<Column> {
        let mut out = vec![Value::Null; self.nrows];
        for (g, values) in results.into_iter().enumerate() {
            let rows = &self.positions[g];
            match values.len() {
                1 => {
                    for &r in rows {
                        out[r] = values[0].clone();
                    }
                }
                n if n == rows.len() => {
                    for (&r, v) in rows.iter().zip(values) {
                        out[r] = v;
                    }
                }
                n => {
                    return Err(Error::ShapeMismatch(format!(
                        "transform of group {} returned {} values for {} rows",
                        format_tuple(&self.keys[g]),
                        n,
                        rows.len()
                    )))
                }
            }
        }
        Column::from_values(out)
    }

    /// Row positions of groups passing `keep`, in original row order
    pub(crate) fn kept_rows(&self, keep: &[bool]) -> Vec<usize> {
        let mut rows: Vec<usize> = self
            .positions
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .flat_map(|(p, _)| p.iter().copied())
            .collect();
        rows.sort_unstable();
        rows
    }

    /// Concatenate per-group series, optionally under the group key levels
    pub(crate) fn combine_series(
        &self,
        results: Vec<Series>,
        group_keys: bool,
        name: Option<String>,
    ) -> Result<Series> {
        let Some(first) = results.first() else {
            return Series::new(Column::from_values(Vec::new())?, self.result_index()?, name);
        };
        let inner_names = first.index().names();
        if results.iter().any(|s| s.index().nlevels() != inner_names.len()) {
            return Err(Error::ShapeMismatch(
                "applied series have differently shaped indexes".into(),
            ));
        }
        let index = self.stacked_index(results.iter().map(Series::index), &inner_names, group_keys)?;
        let columns: Vec<Column> = results.iter().map(|s| s.column().clone()).collect();
        Series::new(Column::concat(&columns)?, index, name)
    }

    /// Stack per-group tables, which must share their columns
    pub(crate) fn combine_tables(&self, results: Vec<Table>, group_keys: bool) -> Result<Table> {
        let Some(first) = results.first() else {
            return Ok(Table::empty(self.result_index()?));
        };
        let columns = first.columns().clone();
        if results.iter().any(|t| t.columns() != &columns) {
            return Err(Error::ShapeMismatch(
                "applied tables do not share the same columns".into(),
            ));
        }
        let inner_names = first.index().names();
        if results.iter().any(|t| t.index().nlevels() != inner_names.len()) {
            return Err(Error::ShapeMismatch(
                "applied tables have differently shaped indexes".into(),
            ));
        }
        let index = self.stacked_index(results.iter().map(Table::index), &inner_names, group_keys)?;
        let data = (0..columns.len())
            .map(|c| {
                let parts: Vec<Column> = results.iter().map(|t| t.data()[c].clone()).collect();
                Column::concat(&parts)
            })
            .collect::<Result<Vec<_>>>()?;
        Table::new(index, columns, data)
    }

    fn stacked_index<'a>(
        &self,
        parts: impl Iterator<Item = &'a TableIndex>,
        inner_names: &[Option<String>],
        group_keys: bool,
    ) -> Result<TableIndex> {
        let mut keys = Vec::new();
        for (g, part) in parts.enumerate() {
            for inner in part.keys() {
                if group_keys {
                    let mut key = self.keys[g].clone();
                    key.extend(inner);
                    keys.push(key);
                } else {
                    keys.push(inner);
                }
            }
        }
        let mut names = if group_keys {
            self.names.clone()
        } else {
            Vec::new()
        };
        names.extend(inner_names.iter().cloned());
        TableIndex::from_keys(keys, names)
    }
}

/// Per-level key labels and names for `key`, plus the table columns used
fn resolve_key(
    key: &GroupKey,
    index: &TableIndex,
    table: Option<&Table>,
) -> Result<(Vec<Vec<Label>>, Vec<Option<String>>, Vec<usize>)> {
    let nrows = index.len();
    let external = |values: &[Value]| -> Result<Vec<Label>> {
        if values.len() != nrows {
            return Err(Error::LengthMismatch {
                expected: nrows,
                actual: values.len(),
            });
        }
        values.iter().map(Value::to_label).collect()
    };
    let by_level = |levels: &[usize]| -> Result<(Vec<Vec<Label>>, Vec<Option<String>>)> {
        let names = index.names();
        let mut out = Vec::with_capacity(levels.len());
        let mut out_names = Vec::with_capacity(levels.len());
        for &level in levels {
            out.push(index.get_level_values(level)?.labels().to_vec());
            out_names.push(names.get(level).cloned().flatten());
        }
        Ok((out, out_names))
    };

    match key {
        GroupKey::Column(label) => resolve_key(&GroupKey::Columns(vec![label.clone()]), index, table),
        GroupKey::Columns(labels) => {
            let table = table.ok_or_else(|| {
                Error::InvalidInput("column keys can only group a table".into())
            })?;
            let mut levels = Vec::with_capacity(labels.len());
            let mut names = Vec::with_capacity(labels.len());
            let mut used = Vec::with_capacity(labels.len());
            for label in labels {
                let pos = table.column_position(std::slice::from_ref(label))?;
                levels.push(column_labels(&table.data()[pos])?);
                names.push(Some(label.to_string()));
                used.push(pos);
            }
            Ok((levels, names, used))
        }
        GroupKey::Values(values) => Ok((vec![external(values.as_slice())?], vec![None], Vec::new())),
        GroupKey::Arrays(arrays) => {
            let levels = arrays
                .iter()
                .map(|a| external(a.as_slice()))
                .collect::<Result<Vec<_>>>()?;
            let names = vec![None; levels.len()];
            Ok((levels, names, Vec::new()))
        }
        GroupKey::Func(f) => {
            let labels = (0..nrows)
                .map(|r| {
                    let row_key = index.key_at(r).unwrap_or_default();
                    f(&row_key).to_label()
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((vec![labels], vec![None], Vec::new()))
        }
        GroupKey::Level(levels) => {
            let (levels, names) = by_level(levels)?;
            Ok((levels, names, Vec::new()))
        }
        GroupKey::LevelNames(names) => {
            let levels = names
                .iter()
                .map(|n| index.level_number(n))
                .collect::<Result<Vec<_>>>()?;
            let (levels, names) = by_level(&levels)?;
            Ok((levels, names, Vec::new()))
        }
    }
}

/// Series grouped by a key
#[derive(Debug, Clone)]
pub struct SeriesGroupBy {
    series: Series,
    grouping: Grouping,
    options: GroupOptions,
}

impl Series {
    /// Group with default options
    pub fn groupby(&self, key: impl Into<GroupKey>) -> Result<SeriesGroupBy> {
        self.groupby_with(key, GroupOptions::default())
    }

    pub fn groupby_with(&self, key: impl Into<GroupKey>, options: GroupOptions) -> Result<SeriesGroupBy> {
        let (levels, names, _) = resolve_key(&key.into(), self.index(), None)?;
        let grouping = Grouping::new(levels, names, self.len(), options)?;
        Ok(SeriesGroupBy {
            series: self.clone(),
            grouping,
            options,
        })
    }
}

impl SeriesGroupBy {
    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.grouping = self.grouping.with_config(config);
        self
    }

    pub fn ngroups(&self) -> usize {
        self.grouping.ngroups()
    }

    fn name(&self) -> Option<String> {
        self.series.name().map(str::to_string)
    }

    /// Each key with its rows
    pub fn groups(&self) -> Result<Vec<(Vec<Label>, Series)>> {
        self.grouping
            .keys()
            .iter()
            .zip(self.grouping.positions())
            .map(|(k, p)| Ok((k.clone(), self.series.take(p)?)))
            .collect()
    }

    pub fn get_group(&self, key: &[Label]) -> Result<Series> {
        let g = self.grouping.group_of(key)?;
        self.series.take(&self.grouping.positions()[g])
    }

    /// Rows per group
    pub fn size(&self) -> Result<Series> {
        Series::new(self.grouping.sizes(), self.grouping.result_index()?, None)
    }

    /// Non-null values per group
    pub fn count(&self) -> Result<Series> {
        self.agg(&AggFunc::Count)
    }

    /// Reduce every group with one function
    pub fn agg(&self, func: &AggFunc) -> Result<Series> {
        let column = self.grouping.aggregate_column(self.series.column(), func)?;
        Series::new(column, self.grouping.result_index()?, self.name())
    }

    /// One column per function; a map spec is not meaningful for a series
    pub fn aggregate(&self, spec: impl Into<AggSpec>) -> Result<Table> {
        let funcs = match spec.into() {
            AggSpec::Single(f) => vec![f],
            AggSpec::List(fs) => fs,
            AggSpec::Map(_) => {
                return Err(Error::InvalidInput(
                    "per-column aggregation needs a table".into(),
                ))
            }
        };
        let mut labels = Vec::with_capacity(funcs.len());
        let mut data = Vec::with_capacity(funcs.len());
        for f in &funcs {
            labels.push(Label::from(f.name()));
            data.push(self.grouping.aggregate_column(self.series.column(), f)?);
        }
        Table::new(
            self.grouping.result_index()?,
            TableIndex::from_keys(labels.into_iter().map(|l| vec![l]).collect(), vec![None])?,
            data,
        )
    }

    pub fn sum(&self) -> Result<Series> {
        self.agg(&AggFunc::Sum)
    }

    pub fn mean(&self) -> Result<Series> {
        self.agg(&AggFunc::Mean)
    }

    pub fn min(&self) -> Result<Series> {
        self.agg(&AggFunc::Min)
    }

    pub fn max(&self) -> Result<Series> {
        self.agg(&AggFunc::Max)
    }

    pub fn std(&self) -> Result<Series> {
        self.agg(&AggFunc::Std)
    }

    pub fn var(&self) -> Result<Series> {
        self.agg(&AggFunc::Var)
    }

    pub fn median(&self) -> Result<Series> {
        self.agg(&AggFunc::Median)
    }

    pub fn prod(&self) -> Result<Series> {
        self.agg(&AggFunc::Prod)
    }

    pub fn first(&self) -> Result<Series> {
        self.agg(&AggFunc::First)
    }

    pub fn last(&self) -> Result<Series> {
        self.agg(&AggFunc::Last)
    }

    pub fn nunique(&self) -> Result<Series> {
        self.agg(&AggFunc::NUnique)
    }

    /// Same-shaped result: each group's output is broadcast (one value) or
    /// scattered back (one value per row). Rows outside every group are null.
    pub fn transform<F>(&self, f: F) -> Result<Series>
    where
        F: Fn(&Series) -> Result<Series> + Send + Sync,
    {
        let results = self.grouping.map_groups(|_, positions| {
            let group = self.series.take(positions)?;
            Ok(f(&group)?.to_vec())
        })?;
        Ok(self.series.with_column(self.grouping.scatter(results)?))
    }

    /// Broadcast an aggregation over each group's rows
    pub fn transform_agg(&self, func: &AggFunc) -> Result<Series> {
        let results = self
            .grouping
            .map_groups(|_, positions| Ok(vec![func.apply(self.series.column(), positions)?]))?;
        Ok(self.series.with_column(self.grouping.scatter(results)?))
    }

    /// One scalar per group, indexed by key
    pub fn apply_scalar<F>(&self, f: F) -> Result<Series>
    where
        F: Fn(&Series) -> Result<Value> + Send + Sync,
    {
        let values = self
            .grouping
            .map_groups(|_, positions| f(&self.series.take(positions)?))?;
        Series::new(Column::from_values(values)?, self.grouping.result_index()?, self.name())
    }

    /// Concatenated per-group series, under the key levels unless
    /// `group_keys` is off
    pub fn apply_series<F>(&self, f: F) -> Result<Series>
    where
        F: Fn(&Series) -> Result<Series> + Send + Sync,
    {
        let results = self
            .grouping
            .map_groups(|_, positions| f(&self.series.take(positions)?))?;
        self.grouping
            .combine_series(results, self.options.group_keys, self.name())
    }

    /// Rows of the groups for which `pred` holds, in original order
    pub fn filter<F>(&self, pred: F) -> Result<Series>
    where
        F: Fn(&Series) -> Result<bool> + Send + Sync,
    {
        let keep = self
            .grouping
            .map_groups(|_, positions| pred(&self.series.take(positions)?))?;
        self.series.take(&self.grouping.kept_rows(&keep))
    }
}

/// Table grouped by a key
#[derive(Debug, Clone)]
pub struct TableGroupBy {
    table: Table,
    grouping: Grouping,
    value_columns: Vec<usize>,
    options: GroupOptions,
}

impl Table {
    /// Group with default options
    pub fn groupby(&self, key: impl Into<GroupKey>) -> Result<TableGroupBy> {
        self.groupby_with(key, GroupOptions::default())
    }

    pub fn groupby_with(&self, key: impl Into<GroupKey>, options: GroupOptions) -> Result<TableGroupBy> {
        let (levels, names, used) = resolve_key(&key.into(), self.index(), Some(self))?;
        let grouping = Grouping::new(levels, names, self.nrows(), options)?;
        let value_columns = (0..self.ncols()).filter(|c| !used.contains(c)).collect();
        Ok(TableGroupBy {
            table: self.clone(),
            grouping,
            value_columns,
            options,
        })
    }
}

impl TableGroupBy {
    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.grouping = self.grouping.with_config(config);
        self
    }

    pub fn ngroups(&self) -> usize {
        self.grouping.ngroups()
    }

    /// Restrict the value columns
    pub fn select(&self, labels: &[Label]) -> Result<TableGroupBy> {
        let value_columns = labels
            .iter()
            .map(|l| self.table.column_position(std::slice::from_ref(l)))
            .collect::<Result<Vec<_>>>()?;
        Ok(TableGroupBy {
            value_columns,
            ..self.clone()
        })
    }

    /// One value column as a grouped series
    pub fn column<L: Into<Label>>(&self, label: L) -> Result<SeriesGroupBy> {
        Ok(SeriesGroupBy {
            series: self.table.column(label)?,
            grouping: self.grouping.clone(),
            options: self.options,
        })
    }

    fn values(&self) -> Result<Table> {
        self.table.take_columns(&self.value_columns)
    }

    pub fn groups(&self) -> Result<Vec<(Vec<Label>, Table)>> {
        self.grouping
            .keys()
            .iter()
            .zip(self.grouping.positions())
            .map(|(k, p)| Ok((k.clone(), self.table.take(p)?)))
            .collect()
    }

    pub fn get_group(&self, key: &[Label]) -> Result<Table> {
        let g = self.grouping.group_of(key)?;
        self.table.take(&self.grouping.positions()[g])
    }

    pub fn size(&self) -> Result<Series> {
        Series::new(self.grouping.sizes(), self.grouping.result_index()?, None)
    }

    pub fn count(&self) -> Result<Table> {
        self.agg(&AggFunc::Count)
    }

    /// Apply one function to every value column
    pub fn agg(&self, func: &AggFunc) -> Result<Table> {
        self.aggregate(AggSpec::Single(func.clone()))
    }

    /// Aggregate per `spec`. Lists, and maps with several functions for a
    /// column, produce `(column, function)` column labels.
    pub fn aggregate(&self, spec: impl Into<AggSpec>) -> Result<Table> {
        let columns = self.table.columns();
        let mut plan: Vec<(Vec<Label>, usize, AggFunc)> = Vec::new();
        let mut names = columns.names();

        match spec.into() {
            AggSpec::Single(func) => {
                for &c in &self.value_columns {
                    plan.push((columns.key_at(c).unwrap_or_default(), c, func.clone()));
                }
            }
            AggSpec::List(funcs) => {
                for &c in &self.value_columns {
                    for func in &funcs {
                        let mut key = columns.key_at(c).unwrap_or_default();
                        key.push(Label::from(func.name()));
                        plan.push((key, c, func.clone()));
                    }
                }
                names.push(None);
            }
            AggSpec::Map(entries) => {
                let nested = entries.iter().any(|(_, fs)| fs.len() != 1);
                for (label, funcs) in entries {
                    let c = self.table.column_position(std::slice::from_ref(&label))?;
                    for func in funcs {
                        let mut key = vec![label.clone()];
                        if nested {
                            key.push(Label::from(func.name()));
                        }
                        plan.push((key, c, func));
                    }
                }
                names = vec![None; if nested { 2 } else { 1 }];
            }
        }

        debug!(
            "aggregating {} output columns over {} groups",
            plan.len(),
            self.ngroups()
        );
        let mut keys = Vec::with_capacity(plan.len());
        let mut data = Vec::with_capacity(plan.len());
        for (key, c, func) in plan {
            data.push(self.grouping.aggregate_column(&self.table.data()[c], &func)?);
            keys.push(key);
        }
        let result_columns = TableIndex::from_keys(keys, names)?;
        Table::new(self.grouping.result_index()?, result_columns, data)
    }

    pub fn sum(&self) -> Result<Table> {
        self.agg(&AggFunc::Sum)
    }

    pub fn mean(&self) -> Result<Table> {
        self.agg(&AggFunc::Mean)
    }

    pub fn min(&self) -> Result<Table> {
        self.agg(&AggFunc::Min)
    }

    pub fn max(&self) -> Result<Table> {
        self.agg(&AggFunc::Max)
    }

    pub fn first(&self) -> Result<Table> {
        self.agg(&AggFunc::First)
    }

    pub fn last(&self) -> Result<Table> {
        self.agg(&AggFunc::Last)
    }

    pub fn median(&self) -> Result<Table> {
        self.agg(&AggFunc::Median)
    }

    /// Column-wise transform of the value columns; the row index is kept
    pub fn transform<F>(&self, f: F) -> Result<Table>
    where
        F: Fn(&Series) -> Result<Series> + Send + Sync,
    {
        let values = self.values()?;
        values.map_columns(|column| {
            let results = self.grouping.map_groups(|_, positions| {
                let group = Series::from_column(column.take(positions)?, None)
                    .with_index(self.table.index().take(positions)?)?;
                Ok(f(&group)?.to_vec())
            })?;
            self.grouping.scatter(results)
        })
    }

    /// Broadcast an aggregation over each group's rows
    pub fn transform_agg(&self, func: &AggFunc) -> Result<Table> {
        let values = self.values()?;
        values.map_columns(|column| {
            let results = self
                .grouping
                .map_groups(|_, positions| Ok(vec![func.apply(column, positions)?]))?;
            self.grouping.scatter(results)
        })
    }

    pub fn apply_scalar<F>(&self, f: F) -> Result<Series>
    where
        F: Fn(&Table) -> Result<Value> + Send + Sync,
    {
        let values = self
            .grouping
            .map_groups(|_, positions| f(&self.table.take(positions)?))?;
        Series::new(Column::from_values(values)?, self.grouping.result_index()?, None)
    }

    pub fn apply_series<F>(&self, f: F) -> Result<Series>
    where
        F: Fn(&Table) -> Result<Series> + Send + Sync,
    {
        let results = self
            .grouping
            .map_groups(|_, positions| f(&self.table.take(positions)?))?;
        self.grouping
            .combine_series(results, self.options.group_keys, None)
    }

    /// Stack per-group tables under the key levels; every result must have
    /// the same columns
    pub fn apply_table<F>(&self, f: F) -> Result<Table>
    where
        F: Fn(&Table) -> Result<Table> + Send + Sync,
    {
        let results = self
            .grouping
            .map_groups(|_, positions| f(&self.table.take(positions)?))?;
        self.grouping.combine_tables(results, self.options.group_keys)
    }

    pub fn filter<F>(&self, pred: F) -> Result<Table>
    where
        F: Fn(&Table) -> Result<bool> + Send + Sync,
    {
        let keep = self
            .grouping
            .map_groups(|_, positions| pred(&self.table.take(positions)?))?;
        self.table.take(&self.grouping.kept_rows(&keep))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(xs: &[&str]) -> Vec<Label> {
        xs.iter().map(|x| Label::from(*x)).collect()
    }

    #[test]
    fn multi_key_order_is_first_appearance_per_level() {
        let outer = labels(&["b", "a", "b", "a"]);
        let inner = labels(&["y", "x", "x", "y"]);
        let g = Grouping::new(vec![outer, inner], vec![None, None], 4, GroupOptions::default())
            .unwrap();
        let keys: Vec<String> = g.keys().iter().map(|k| format_tuple(k)).collect();
        assert_eq!(keys, vec!["(b, y)", "(b, x)", "(a, y)", "(a, x)"]);
    }

    #[test]
    fn null_keys_dropped_unless_requested() {
        let key = vec![Label::from("a"), Label::Null, Label::from("a")];
        let g = Grouping::new(vec![key.clone()], vec![None], 3, GroupOptions::default()).unwrap();
        assert_eq!(g.ngroups(), 1);
        let g = Grouping::new(
            vec![key],
            vec![None],
            3,
            GroupOptions::default().with_dropna(false),
        )
        .unwrap();
        assert_eq!(g.ngroups(), 2);
        assert_eq!(g.keys()[1], vec![Label::Null]);
    }

    #[test]
    fn scatter_rejects_wrong_lengths() {
        let g = Grouping::new(vec![labels(&["a", "a"])], vec![None], 2, GroupOptions::default())
            .unwrap();
        let err = g
            .scatter(vec![vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]])
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }
}
