//! 時系列データのウィンドウ操作（rolling / expanding / ewm）

use std::fmt;
use std::sync::Arc;

use log::debug;
use rayon::prelude::*;

use crate::column::Column;
use crate::config::{self, EngineConfig};
use crate::error::{Error, Result};
use crate::groupby::agg::{mean, median, variance};
use crate::index::TableIndex;
use crate::series::Series;
use crate::table::Table;
use crate::value::Label;

/// 移動ウィンドウの大きさ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// 直近n行
    Count(usize),
    /// 直近の時間幅 `(t - d, t]`
    Duration(chrono::Duration),
}

/// ウィンドウの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// 固定長ウィンドウ
    Rolling(Window),
    /// 最初の行から現在の行まで
    Expanding,
}

impl fmt::Display for WindowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowType::Rolling(Window::Count(n)) => write!(f, "Rolling({})", n),
            WindowType::Rolling(Window::Duration(d)) => write!(f, "Rolling({}s)", d.num_seconds()),
            WindowType::Expanding => write!(f, "Expanding"),
        }
    }
}

/// Custom reducer over the non-null values of one window
pub type WindowFn = Arc<dyn Fn(&[f64]) -> Result<f64> + Send + Sync>;

#[derive(Clone)]
enum WindowAgg {
    Sum,
    Mean,
    Min,
    Max,
    Count,
    Std,
    Var,
    Median,
    Apply(WindowFn),
}

impl WindowAgg {
    fn reduce(&self, xs: &mut [f64]) -> Result<Option<f64>> {
        Ok(match self {
            WindowAgg::Sum => Some(xs.iter().sum()),
            WindowAgg::Mean => mean(xs),
            WindowAgg::Min => xs.iter().copied().reduce(f64::min),
            WindowAgg::Max => xs.iter().copied().reduce(f64::max),
            WindowAgg::Count => Some(xs.len() as f64),
            WindowAgg::Std => variance(xs).map(f64::sqrt),
            WindowAgg::Var => variance(xs),
            WindowAgg::Median => median(xs),
            WindowAgg::Apply(f) => {
                let v = f(xs).map_err(|e| Error::Computation(format!("window apply: {}", e)))?;
                (!v.is_nan()).then_some(v)
            }
        })
    }
}

/// 各行のウィンドウの開始位置と最小観測数
#[derive(Debug, Clone)]
struct Frame {
    kind: WindowType,
    starts: Vec<usize>,
    min_periods: usize,
}

impl Frame {
    fn new(kind: WindowType, index: &TableIndex) -> Result<Self> {
        let n = index.len();
        let (starts, min_periods) = match kind {
            WindowType::Rolling(Window::Count(0)) => {
                return Err(Error::InvalidInput("window size must be positive".into()))
            }
            WindowType::Rolling(Window::Count(w)) => {
                ((0..n).map(|i| (i + 1).saturating_sub(w)).collect(), w)
            }
            WindowType::Rolling(Window::Duration(d)) => (duration_starts(index, d)?, 1),
            WindowType::Expanding => (vec![0; n], 1),
        };
        Ok(Frame {
            kind,
            starts,
            min_periods,
        })
    }

    fn run(&self, values: &[Option<f64>], agg: &WindowAgg) -> Result<Vec<Option<f64>>> {
        let mut out = Vec::with_capacity(values.len());
        let mut buf = Vec::new();
        for (i, &start) in self.starts.iter().enumerate() {
            buf.clear();
            buf.extend(values[start..=i].iter().flatten().copied());
            // count reports every window
            if !matches!(agg, WindowAgg::Count) && (buf.len() < self.min_periods || buf.is_empty()) {
                out.push(None);
                continue;
            }
            out.push(agg.reduce(&mut buf)?);
        }
        Ok(out)
    }
}

/// Duration windows cover `(t - d, t]` over a sorted time index
fn duration_starts(index: &TableIndex, d: chrono::Duration) -> Result<Vec<usize>> {
    if d <= chrono::Duration::zero() {
        return Err(Error::InvalidInput("window duration must be positive".into()));
    }
    let TableIndex::Flat(flat) = index else {
        return Err(Error::InvalidInput(
            "duration windows need a single-level time index".into(),
        ));
    };
    let times = flat
        .labels()
        .iter()
        .map(|l| match l {
            Label::Timestamp(t) => Ok(*t),
            other => Err(Error::InvalidInput(format!(
                "duration windows need timestamps, found {}",
                other
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    if !flat.is_monotonic_increasing() {
        return Err(Error::UnsortedIndex(
            "duration windows need a monotonic time index".into(),
        ));
    }

    let mut starts = Vec::with_capacity(times.len());
    let mut lo = 0;
    for (i, &t) in times.iter().enumerate() {
        let edge = t.checked_sub_signed(d).ok_or_else(|| {
            Error::InvalidInput(format!(
                "window of {}s before {} is out of range",
                d.num_seconds(),
                t
            ))
        })?;
        while times[lo] <= edge {
            lo += 1;
        }
        debug_assert!(lo <= i);
        starts.push(lo);
    }
    Ok(starts)
}

/// Run `f` over each numeric column, in parallel when the config allows it
fn per_numeric_column<F>(table: &Table, config: &EngineConfig, f: F) -> Result<Table>
where
    F: Fn(&[Option<f64>]) -> Result<Vec<Option<f64>>> + Sync,
{
    let positions: Vec<usize> = (0..table.ncols())
        .filter(|&c| table.data()[c].dtype().is_numeric())
        .collect();
    if positions.len() < table.ncols() {
        debug!(
            "window skips {} non-numeric columns",
            table.ncols() - positions.len()
        );
    }
    let run = |c: &usize| -> Result<Column> {
        let values = table.data()[*c].to_f64()?;
        Ok(Column::from_opt_f64(f(&values)?))
    };

    let data = if config.parallel_columns && config.max_threads > 1 && positions.len() > 1 {
        debug!("window over {} columns in parallel", positions.len());
        config::install(config, || positions.par_iter().map(run).collect::<Result<Vec<_>>>())?
    } else {
        positions.iter().map(run).collect::<Result<Vec<_>>>()?
    };
    let columns = table.take_columns(&positions)?.columns().clone();
    Table::with_shared_index(Arc::clone(table.index_arc()), columns, data)
}

/// Seriesのウィンドウ操作
#[derive(Debug, Clone)]
pub struct Rolling {
    series: Series,
    frame: Frame,
}

impl Series {
    /// 固定長ウィンドウ
    ///
    /// `min_periods` の既定値は行数ウィンドウではn、時間幅ウィンドウでは1。
    pub fn rolling(&self, window: Window) -> Result<Rolling> {
        Ok(Rolling {
            series: self.clone(),
            frame: Frame::new(WindowType::Rolling(window), self.index())?,
        })
    }

    /// 拡大ウィンドウ
    pub fn expanding(&self, min_periods: usize) -> Result<Rolling> {
        let frame = Frame::new(WindowType::Expanding, self.index())?;
        Ok(Rolling {
            series: self.clone(),
            frame,
        }
        .min_periods(min_periods))
    }
}

macro_rules! window_methods {
    ($out:ty) => {
        pub fn sum(&self) -> Result<$out> {
            self.run(&WindowAgg::Sum)
        }

        pub fn mean(&self) -> Result<$out> {
            self.run(&WindowAgg::Mean)
        }

        pub fn min(&self) -> Result<$out> {
            self.run(&WindowAgg::Min)
        }

        pub fn max(&self) -> Result<$out> {
            self.run(&WindowAgg::Max)
        }

        /// Non-null observations per window
        pub fn count(&self) -> Result<$out> {
            self.run(&WindowAgg::Count)
        }

        /// 標本標準偏差（ddof=1）
        pub fn std(&self) -> Result<$out> {
            self.run(&WindowAgg::Std)
        }

        pub fn var(&self) -> Result<$out> {
            self.run(&WindowAgg::Var)
        }

        pub fn median(&self) -> Result<$out> {
            self.run(&WindowAgg::Median)
        }

        /// ウィンドウ内の非Null値に任意の関数を適用
        pub fn apply<F>(&self, f: F) -> Result<$out>
        where
            F: Fn(&[f64]) -> Result<f64> + Send + Sync + 'static,
        {
            self.run(&WindowAgg::Apply(Arc::new(f)))
        }

        pub fn min_periods(mut self, min_periods: usize) -> Self {
            self.frame.min_periods = min_periods;
            self
        }

        pub fn window_type(&self) -> WindowType {
            self.frame.kind
        }
    };
}

impl Rolling {
    fn run(&self, agg: &WindowAgg) -> Result<Series> {
        let values = self.series.to_f64()?;
        Ok(self
            .series
            .with_column(Column::from_opt_f64(self.frame.run(&values, agg)?)))
    }

    window_methods!(Series);
}

/// Tableのウィンドウ操作（数値列ごと）
#[derive(Debug, Clone)]
pub struct TableRolling {
    table: Table,
    frame: Frame,
    config: EngineConfig,
}

impl Table {
    pub fn rolling(&self, window: Window) -> Result<TableRolling> {
        Ok(TableRolling {
            table: self.clone(),
            frame: Frame::new(WindowType::Rolling(window), self.index())?,
            config: config::global(),
        })
    }

    pub fn expanding(&self, min_periods: usize) -> Result<TableRolling> {
        let frame = Frame::new(WindowType::Expanding, self.index())?;
        Ok(TableRolling {
            table: self.clone(),
            frame,
            config: config::global(),
        }
        .min_periods(min_periods))
    }
}

impl TableRolling {
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    fn run(&self, agg: &WindowAgg) -> Result<Table> {
        per_numeric_column(&self.table, &self.config, |values| self.frame.run(values, agg))
    }

    window_methods!(Table);
}

/// 指数加重ウィンドウの設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EwmOptions {
    /// 平滑化係数 (0, 1]
    pub alpha: f64,
    /// trueなら正規化した加重平均、falseなら漸化式
    pub adjust: bool,
    pub min_periods: usize,
}

impl EwmOptions {
    /// `alpha = 2 / (span + 1)`
    pub fn span(span: f64) -> Result<Self> {
        if !(span >= 1.0) {
            return Err(Error::InvalidInput(format!("span must be >= 1, got {}", span)));
        }
        Self::alpha(2.0 / (span + 1.0))
    }

    pub fn alpha(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::InvalidInput(format!(
                "alpha must be in (0, 1], got {}",
                alpha
            )));
        }
        Ok(Self {
            alpha,
            adjust: true,
            min_periods: 1,
        })
    }

    pub fn adjust(mut self, adjust: bool) -> Self {
        self.adjust = adjust;
        self
    }

    pub fn min_periods(mut self, min_periods: usize) -> Self {
        self.min_periods = min_periods;
        self
    }
}

/// Exponentially weighted mean. Nulls decay the weights (adjusted) or
/// carry the previous value (recursive).
fn ewm_mean(values: &[Option<f64>], options: &EwmOptions) -> Vec<Option<f64>> {
    let decay = 1.0 - options.alpha;
    let mut num = 0.0;
    let mut den = 0.0;
    let mut last: Option<f64> = None;
    let mut seen = 0usize;
    values
        .iter()
        .map(|v| {
            match (*v, options.adjust) {
                (Some(x), true) => {
                    num = num * decay + x;
                    den = den * decay + 1.0;
                    seen += 1;
                    last = Some(num / den);
                }
                (None, true) => {
                    num *= decay;
                    den *= decay;
                }
                (Some(x), false) => {
                    seen += 1;
                    last = Some(match last {
                        Some(y) => options.alpha * x + decay * y,
                        None => x,
                    });
                }
                (None, false) => {}
            }
            last.filter(|_| seen >= options.min_periods.max(1))
        })
        .collect()
}

/// Seriesの指数加重ウィンドウ
#[derive(Debug, Clone)]
pub struct Ewm {
    series: Series,
    options: EwmOptions,
}

impl Series {
    pub fn ewm(&self, options: EwmOptions) -> Ewm {
        Ewm {
            series: self.clone(),
            options,
        }
    }
}

impl Ewm {
    pub fn mean(&self) -> Result<Series> {
        let values = self.series.to_f64()?;
        Ok(self
            .series
            .with_column(Column::from_opt_f64(ewm_mean(&values, &self.options))))
    }
}

/// Tableの指数加重ウィンドウ（数値列ごと）
#[derive(Debug, Clone)]
pub struct TableEwm {
    table: Table,
    options: EwmOptions,
    config: EngineConfig,
}

impl Table {
    pub fn ewm(&self, options: EwmOptions) -> TableEwm {
        TableEwm {
            table: self.clone(),
            options,
            config: config::global(),
        }
    }
}

impl TableEwm {
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mean(&self) -> Result<Table> {
        per_numeric_column(&self.table, &self.config, |values| {
            Ok(ewm_mean(values, &self.options))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn f(xs: &[Option<f64>]) -> Vec<Value> {
        xs.iter().map(|x| x.map(Value::Float64).unwrap_or(Value::Null)).collect()
    }

    #[test]
    fn rolling_count_window_defaults_min_periods_to_size() {
        let s = Series::from_values(vec![1i64, 2, 3, 4], None).unwrap();
        let out = s.rolling(Window::Count(2)).unwrap().sum().unwrap();
        assert_eq!(out.to_vec(), f(&[None, Some(3.0), Some(5.0), Some(7.0)]));
    }

    #[test]
    fn zero_window_is_rejected() {
        let s = Series::from_values(vec![1i64], None).unwrap();
        assert!(matches!(s.rolling(Window::Count(0)), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn nulls_count_against_min_periods() {
        let s = Series::from_values(vec![Value::Float64(1.0), Value::Null, Value::Float64(3.0)], None)
            .unwrap();
        let out = s.rolling(Window::Count(2)).unwrap().min_periods(1).mean().unwrap();
        assert_eq!(out.to_vec(), f(&[Some(1.0), Some(1.0), Some(3.0)]));
    }

    #[test]
    fn duration_window_before_earliest_time_is_rejected() {
        let first = chrono::NaiveDateTime::MIN;
        let labels = vec![first, first + chrono::Duration::days(1)];
        let s = Series::from_labeled(labels, vec![1i64, 2], None).unwrap();
        assert!(matches!(
            s.rolling(Window::Duration(chrono::Duration::days(2))),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn recursive_ewm() {
        let s = Series::from_values(vec![1.0f64, 2.0, 3.0], None).unwrap();
        let opts = EwmOptions::alpha(0.5).unwrap().adjust(false);
        let out = s.ewm(opts).mean().unwrap();
        assert_eq!(out.to_vec(), f(&[Some(1.0), Some(1.5), Some(2.25)]));
    }

    #[test]
    fn adjusted_ewm_weights() {
        let s = Series::from_values(vec![1.0f64, 2.0], None).unwrap();
        let out = s.ewm(EwmOptions::alpha(0.5).unwrap()).mean().unwrap();
        // (2 + 0.5 * 1) / (1 + 0.5)
        let expected = 2.5 / 1.5;
        match out.get(1) {
            Value::Float64(v) => assert!((v - expected).abs() < 1e-12),
            other => panic!("unexpected {:?}", other),
        }
    }
}
