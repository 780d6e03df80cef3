use chrono::{NaiveDateTime, NaiveTime};
use log::debug;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::groupby::{AggFunc, AggSpec, GroupKey, GroupOptions, SeriesGroupBy, TableGroupBy};
use crate::index::{Index, TableIndex};
use crate::ops::FillPolicy;
use crate::series::Series;
use crate::table::Table;
use crate::temporal::Frequency;
use crate::value::{DType, Label, Value};

/// 区間のどちら側を閉じるか、どちら側でラベル付けするか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Side {
    #[default]
    Left,
    Right,
}

/// 固定幅の区間の起点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    /// 最初の時刻の日の0時
    #[default]
    StartDay,
    /// 最初の時刻
    Start,
    /// 1970-01-01 00:00:00
    Epoch,
}

/// リサンプリングの規則（頻度・閉じ方・ラベル・起点）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleRule {
    pub freq: Frequency,
    pub closed: Side,
    pub label: Side,
    pub origin: Origin,
}

impl ResampleRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            closed: Side::Left,
            label: Side::Left,
            origin: Origin::StartDay,
        }
    }

    /// 起点の時刻
    pub fn anchor(&self, first: NaiveDateTime) -> NaiveDateTime {
        match self.origin {
            Origin::StartDay => first.date().and_time(NaiveTime::MIN),
            Origin::Start => first,
            Origin::Epoch => NaiveDateTime::default(),
        }
    }

    /// `ts` が属する区間の開始時刻
    pub fn bucket(&self, ts: NaiveDateTime, anchor: NaiveDateTime) -> Result<NaiveDateTime> {
        match self.closed {
            Side::Left => self.freq.floor(ts, anchor),
            // (start, end] : the end point belongs to the earlier bucket
            Side::Right => {
                let before = ts
                    .checked_sub_signed(chrono::Duration::nanoseconds(1))
                    .ok_or_else(|| Error::InvalidInput(format!("timestamp {} out of range", ts)))?;
                self.freq.floor(before, anchor)
            }
        }
    }

    /// 区間の開始時刻に対する結果ラベル
    pub fn label_of(&self, start: NaiveDateTime) -> Result<NaiveDateTime> {
        match self.label {
            Side::Left => Ok(start),
            Side::Right => self.freq.advance(start),
        }
    }
}

/// 行ごとの区間と、最初から最後までのすべての区間
struct BucketPlan {
    anchor: NaiveDateTime,
    rows: Vec<Value>,
    starts: Vec<NaiveDateTime>,
}

fn plan(rule: &ResampleRule, timestamps: &[Option<NaiveDateTime>]) -> Result<BucketPlan> {
    let Some(first) = timestamps.iter().flatten().min().copied() else {
        return Ok(BucketPlan {
            anchor: NaiveDateTime::default(),
            rows: vec![Value::Null; timestamps.len()],
            starts: Vec::new(),
        });
    };
    let anchor = rule.anchor(first);
    let rows = timestamps
        .iter()
        .map(|t| match t {
            Some(t) => rule.bucket(*t, anchor).map(Value::Timestamp),
            None => Ok(Value::Null),
        })
        .collect::<Result<Vec<_>>>()?;

    let buckets: Vec<NaiveDateTime> = rows.iter().filter_map(Value::as_timestamp).collect();
    let mut starts = Vec::new();
    if let (Some(&lo), Some(&hi)) = (buckets.iter().min(), buckets.iter().max()) {
        let mut cur = lo;
        while cur <= hi {
            starts.push(cur);
            cur = rule.freq.advance(cur)?;
        }
    }
    debug!(
        "resample {}: {} rows into {} buckets (closed={:?}, label={:?})",
        rule.freq,
        timestamps.len(),
        starts.len(),
        rule.closed,
        rule.label
    );
    Ok(BucketPlan {
        anchor,
        rows,
        starts,
    })
}

fn timestamps_of(labels: &[Label]) -> Result<Vec<Option<NaiveDateTime>>> {
    labels
        .iter()
        .map(|l| match l {
            Label::Timestamp(t) => Ok(Some(*t)),
            Label::Null => Ok(None),
            other => Err(Error::InvalidInput(format!(
                "resample needs timestamps, found {}",
                other
            ))),
        })
        .collect()
}

fn index_timestamps(index: &TableIndex) -> Result<Vec<Option<NaiveDateTime>>> {
    match index {
        TableIndex::Flat(flat) => timestamps_of(flat.labels()),
        TableIndex::Multi(_) => Err(Error::InvalidInput(
            "resample needs a single-level time index".into(),
        )),
    }
}

/// 結果の行インデックス（区間ラベル）
fn target_index(
    rule: &ResampleRule,
    starts: &[NaiveDateTime],
    labelled: bool,
    name: Option<String>,
) -> Result<TableIndex> {
    let labels = starts
        .iter()
        .map(|&s| {
            let t = if labelled { rule.label_of(s)? } else { s };
            Ok(Label::Timestamp(t))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(TableIndex::Flat(Index::with_name(labels, name)))
}

fn bucket_key(rule: ResampleRule, anchor: NaiveDateTime) -> GroupKey {
    GroupKey::func(move |key: &[Label]| {
        key.first()
            .and_then(|l| l.as_timestamp())
            .and_then(|t| rule.bucket(t, anchor).ok())
            .map(Value::Timestamp)
            .unwrap_or(Value::Null)
    })
}

fn sorted() -> GroupOptions {
    GroupOptions::default().with_sort(true)
}

/// Seriesのリサンプリング
#[derive(Debug, Clone)]
pub struct SeriesResampler {
    series: Series,
    rule: ResampleRule,
}

impl Series {
    /// 時刻インデックスを `freq` の区間に分ける
    pub fn resample(&self, freq: &str) -> Result<SeriesResampler> {
        let freq: Frequency = freq.parse()?;
        index_timestamps(self.index())?;
        Ok(SeriesResampler {
            series: self.clone(),
            rule: ResampleRule::new(freq),
        })
    }
}

impl SeriesResampler {
    pub fn closed(mut self, side: Side) -> Self {
        self.rule.closed = side;
        self
    }

    pub fn label(mut self, side: Side) -> Self {
        self.rule.label = side;
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.rule.origin = origin;
        self
    }

    pub fn rule(&self) -> &ResampleRule {
        &self.rule
    }

    fn plan(&self) -> Result<BucketPlan> {
        plan(&self.rule, &index_timestamps(self.series.index())?)
    }

    fn grouped(&self, plan: &BucketPlan) -> Result<SeriesGroupBy> {
        self.series
            .groupby_with(bucket_key(self.rule, plan.anchor), sorted())
    }

    fn target(&self, plan: &BucketPlan, labelled: bool) -> Result<TableIndex> {
        let name = self.series.index().names().into_iter().next().flatten();
        target_index(&self.rule, &plan.starts, labelled, name)
    }

    fn finish(&self, plan: &BucketPlan, grouped: Series) -> Result<Series> {
        let full = self.target(plan, false)?;
        let out = grouped.reindex(full, FillPolicy::Null)?;
        out.with_index(self.target(plan, true)?)
    }

    fn empty_result(&self, dtype: DType) -> Result<Series> {
        let name = self.series.index().names().into_iter().next().flatten();
        let index = target_index(&self.rule, &[], false, name)?;
        Series::new(Column::nulls(dtype, 0), index, self.series.name().map(str::to_string))
    }

    /// 区間ごとに `func` で集計する
    pub fn agg(&self, func: &AggFunc) -> Result<Series> {
        let plan = self.plan()?;
        if plan.starts.is_empty() {
            let dtype = match func {
                AggFunc::Count | AggFunc::NUnique => DType::Int64,
                _ => self.series.dtype(),
            };
            return self.empty_result(dtype);
        }
        let grouped = self.grouped(&plan)?.agg(func)?;
        let out = self.finish(&plan, grouped)?;
        if matches!(func, AggFunc::Count | AggFunc::NUnique) {
            out.fill_null(&Value::Int64(0))
        } else {
            Ok(out)
        }
    }

    /// 複数の集計（列は関数名）
    pub fn aggregate(&self, spec: impl Into<AggSpec>) -> Result<Table> {
        let plan = self.plan()?;
        if plan.starts.is_empty() {
            return Ok(Table::empty(self.target(&plan, false)?));
        }
        let grouped = self.grouped(&plan)?.aggregate(spec)?;
        let full = self.target(&plan, false)?;
        grouped.reindex(full, FillPolicy::Null)?.with_index(self.target(&plan, true)?)
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

    pub fn count(&self) -> Result<Series> {
        self.agg(&AggFunc::Count)
    }

    pub fn first(&self) -> Result<Series> {
        self.agg(&AggFunc::First)
    }

    pub fn last(&self) -> Result<Series> {
        self.agg(&AggFunc::Last)
    }

    /// 区間ごとの行数（Nullも数える）
    pub fn size(&self) -> Result<Series> {
        let plan = self.plan()?;
        if plan.starts.is_empty() {
            return self.empty_result(DType::Int64);
        }
        let grouped = self.grouped(&plan)?.size()?;
        self.finish(&plan, grouped)?.fill_null(&Value::Int64(0))
    }

    /// 始値・高値・安値・終値
    pub fn ohlc(&self) -> Result<Table> {
        let parts = [
            ("open", AggFunc::First),
            ("high", AggFunc::Max),
            ("low", AggFunc::Min),
            ("close", AggFunc::Last),
        ];
        let series = parts
            .iter()
            .map(|(name, func)| Ok(self.agg(func)?.rename(Some(name.to_string()))))
            .collect::<Result<Vec<_>>>()?;
        Table::from_series(series)
    }

    /// アップサンプリング: 区間の開始時刻に一致する値だけを取り、ほかはNull
    pub fn asfreq(&self) -> Result<Series> {
        self.upsample(FillPolicy::Null)
    }

    /// アップサンプリング: 直前の観測値で埋める
    pub fn ffill(&self, limit: Option<usize>) -> Result<Series> {
        self.upsample(FillPolicy::ForwardFill { limit })
    }

    /// アップサンプリング: 直後の観測値で埋める
    pub fn bfill(&self, limit: Option<usize>) -> Result<Series> {
        self.upsample(FillPolicy::BackwardFill { limit })
    }

    fn upsample(&self, policy: FillPolicy) -> Result<Series> {
        let plan = self.plan()?;
        self.series.reindex(self.target(&plan, false)?, policy)
    }
}

/// Tableのリサンプリング（行インデックスまたは時刻列 `on`）
#[derive(Debug, Clone)]
pub struct TableResampler {
    table: Table,
    rule: ResampleRule,
    on: Option<Label>,
}

impl Table {
    pub fn resample(&self, freq: &str) -> Result<TableResampler> {
        Ok(TableResampler {
            table: self.clone(),
            rule: ResampleRule::new(freq.parse()?),
            on: None,
        })
    }
}

impl TableResampler {
    /// 行インデックスの代わりに時刻列を使う
    pub fn on<L: Into<Label>>(mut self, column: L) -> Self {
        self.on = Some(column.into());
        self
    }

    pub fn closed(mut self, side: Side) -> Self {
        self.rule.closed = side;
        self
    }

    pub fn label(mut self, side: Side) -> Self {
        self.rule.label = side;
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.rule.origin = origin;
        self
    }

    /// 時刻列を行インデックスに移したテーブル
    fn source(&self) -> Result<Table> {
        match &self.on {
            Some(on) => self.table.set_index(std::slice::from_ref(on), true),
            None => Ok(self.table.clone()),
        }
    }

    fn prepared(&self) -> Result<(Table, BucketPlan)> {
        let source = self.source()?;
        let plan = plan(&self.rule, &index_timestamps(source.index())?)?;
        Ok((source, plan))
    }

    fn target(&self, source: &Table, plan: &BucketPlan, labelled: bool) -> Result<TableIndex> {
        let name = source.index().names().into_iter().next().flatten();
        target_index(&self.rule, &plan.starts, labelled, name)
    }

    fn grouped(&self, source: &Table, plan: &BucketPlan) -> Result<TableGroupBy> {
        source.groupby_with(GroupKey::Values(plan.rows.clone()), sorted())
    }

    fn finish(&self, source: &Table, plan: &BucketPlan, grouped: Table) -> Result<Table> {
        let full = self.target(source, plan, false)?;
        grouped
            .reindex(full, FillPolicy::Null)?
            .with_index(self.target(source, plan, true)?)
    }

    /// 区間ごとに集計する
    pub fn aggregate(&self, spec: impl Into<AggSpec>) -> Result<Table> {
        let (source, plan) = self.prepared()?;
        if plan.starts.is_empty() {
            return Ok(Table::empty(self.target(&source, &plan, false)?));
        }
        let grouped = self.grouped(&source, &plan)?.aggregate(spec)?;
        self.finish(&source, &plan, grouped)
    }

    pub fn agg(&self, func: &AggFunc) -> Result<Table> {
        let out = self.aggregate(AggSpec::Single(func.clone()))?;
        if matches!(func, AggFunc::Count | AggFunc::NUnique) {
            out.map_columns(|c| c.fill_null(&Value::Int64(0)))
        } else {
            Ok(out)
        }
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

    pub fn count(&self) -> Result<Table> {
        self.agg(&AggFunc::Count)
    }

    pub fn first(&self) -> Result<Table> {
        self.agg(&AggFunc::First)
    }

    pub fn last(&self) -> Result<Table> {
        self.agg(&AggFunc::Last)
    }

    pub fn asfreq(&self) -> Result<Table> {
        self.upsample(FillPolicy::Null)
    }

    pub fn ffill(&self, limit: Option<usize>) -> Result<Table> {
        self.upsample(FillPolicy::ForwardFill { limit })
    }

    pub fn bfill(&self, limit: Option<usize>) -> Result<Table> {
        self.upsample(FillPolicy::BackwardFill { limit })
    }

    fn upsample(&self, policy: FillPolicy) -> Result<Table> {
        let (source, plan) = self.prepared()?;
        let target = self.target(&source, &plan, false)?;
        source.reindex(target, policy)
    }
}
