//! Aggregation functions applied to one group of one column

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::value::{DType, Label, Value};

/// User-supplied reduction of a group's values
pub type CustomFn = Arc<dyn Fn(&Column) -> Result<Value> + Send + Sync>;

/// Aggregation function
///
/// String names resolve once through [`FromStr`]; `"avg"` and `"average"`
/// are accepted for the mean.
#[derive(Clone)]
pub enum AggFunc {
    /// Sum of non-null values; strings concatenate
    Sum,
    Mean,
    Min,
    Max,
    /// Number of non-null values
    Count,
    /// Sample standard deviation (ddof = 1)
    Std,
    /// Sample variance (ddof = 1)
    Var,
    Median,
    Prod,
    /// First non-null value
    First,
    /// Last non-null value
    Last,
    /// Number of distinct non-null values
    NUnique,
    /// Named closure over the group's column
    Custom { name: String, func: CustomFn },
}

impl AggFunc {
    /// Wrap a closure as an aggregation
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Column) -> Result<Value> + Send + Sync + 'static,
    {
        AggFunc::Custom {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name used for result column labels
    pub fn name(&self) -> &str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Mean => "mean",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Count => "count",
            AggFunc::Std => "std",
            AggFunc::Var => "var",
            AggFunc::Median => "median",
            AggFunc::Prod => "prod",
            AggFunc::First => "first",
            AggFunc::Last => "last",
            AggFunc::NUnique => "nunique",
            AggFunc::Custom { name, .. } => name,
        }
    }

    /// Reduce the rows at `positions` of `column`
    pub fn apply(&self, column: &Column, positions: &[usize]) -> Result<Value> {
        match self {
            AggFunc::Count => Ok(Value::Int64(
                positions.iter().filter(|&&p| column.is_valid(p)).count() as i64,
            )),
            AggFunc::First => Ok(positions
                .iter()
                .map(|&p| column.get(p))
                .find(|v| !v.is_null())
                .unwrap_or(Value::Null)),
            AggFunc::Last => Ok(positions
                .iter()
                .rev()
                .map(|&p| column.get(p))
                .find(|v| !v.is_null())
                .unwrap_or(Value::Null)),
            AggFunc::NUnique => Ok(Value::Int64(nunique(column, positions) as i64)),
            AggFunc::Min => extreme(column, positions, true),
            AggFunc::Max => extreme(column, positions, false),
            AggFunc::Sum => sum(column, positions),
            AggFunc::Prod => prod(column, positions),
            AggFunc::Mean => {
                let xs = numbers(column, positions, "mean")?;
                Ok(mean(&xs).map(Value::Float64).unwrap_or(Value::Null))
            }
            AggFunc::Var => {
                let xs = numbers(column, positions, "var")?;
                Ok(variance(&xs).map(Value::from).unwrap_or(Value::Null))
            }
            AggFunc::Std => {
                let xs = numbers(column, positions, "std")?;
                Ok(variance(&xs)
                    .map(|v| Value::from(v.sqrt()))
                    .unwrap_or(Value::Null))
            }
            AggFunc::Median => {
                let mut xs = numbers(column, positions, "median")?;
                Ok(median(&mut xs).map(Value::Float64).unwrap_or(Value::Null))
            }
            AggFunc::Custom { name, func } => {
                let group = column.take(positions)?;
                func(&group).map_err(|e| match e {
                    Error::Computation(msg) => Error::Computation(msg),
                    other => Error::Computation(format!("{}: {}", name, other)),
                })
            }
        }
    }
}

impl fmt::Debug for AggFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggFunc::Custom { name, .. } => write!(f, "Custom({})", name),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl FromStr for AggFunc {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let func = match s.to_lowercase().as_str() {
            "sum" => AggFunc::Sum,
            "mean" | "avg" | "average" => AggFunc::Mean,
            "min" | "minimum" => AggFunc::Min,
            "max" | "maximum" => AggFunc::Max,
            "count" => AggFunc::Count,
            "std" => AggFunc::Std,
            "var" => AggFunc::Var,
            "median" => AggFunc::Median,
            "prod" | "product" => AggFunc::Prod,
            "first" => AggFunc::First,
            "last" => AggFunc::Last,
            "nunique" => AggFunc::NUnique,
            _ => {
                return Err(Error::InvalidInput(format!(
                    "unknown aggregation function '{}'",
                    s
                )))
            }
        };
        Ok(func)
    }
}

/// What to compute for each value column
#[derive(Debug, Clone)]
pub enum AggSpec {
    /// One function for every column; column labels are kept
    Single(AggFunc),
    /// Several functions per column; labels become `(column, function)`
    List(Vec<AggFunc>),
    /// Per-column functions, in the given order
    Map(Vec<(Label, Vec<AggFunc>)>),
}

impl From<AggFunc> for AggSpec {
    fn from(func: AggFunc) -> Self {
        AggSpec::Single(func)
    }
}

impl From<Vec<AggFunc>> for AggSpec {
    fn from(funcs: Vec<AggFunc>) -> Self {
        AggSpec::List(funcs)
    }
}

impl FromStr for AggSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(AggSpec::Single(s.parse()?))
    }
}

impl AggSpec {
    /// Build a list spec from function names
    pub fn from_names(names: &[&str]) -> Result<Self> {
        let funcs = names
            .iter()
            .map(|n| n.parse())
            .collect::<Result<Vec<AggFunc>>>()?;
        Ok(AggSpec::List(funcs))
    }

    /// Build a map spec from `(column, function names)` pairs
    pub fn from_map<L: Into<Label>>(entries: Vec<(L, Vec<&str>)>) -> Result<Self> {
        let entries = entries
            .into_iter()
            .map(|(label, names)| {
                let funcs = names
                    .iter()
                    .map(|n| n.parse())
                    .collect::<Result<Vec<AggFunc>>>()?;
                Ok((label.into(), funcs))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(AggSpec::Map(entries))
    }
}

fn numbers(column: &Column, positions: &[usize], op: &str) -> Result<Vec<f64>> {
    if !column.dtype().is_numeric() {
        return Err(Error::type_mismatch(op, column.dtype(), DType::Float64));
    }
    Ok(positions
        .iter()
        .filter_map(|&p| column.get(p).as_f64())
        .collect())
}

pub(crate) fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

pub(crate) fn variance(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs)?;
    let ss: f64 = xs.iter().map(|x| (x - m) * (x - m)).sum();
    Some(ss / (xs.len() - 1) as f64)
}

pub(crate) fn median(xs: &mut [f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    xs.sort_by(|a, b| a.total_cmp(b));
    let mid = xs.len() / 2;
    if xs.len() % 2 == 0 {
        Some((xs[mid - 1] + xs[mid]) / 2.0)
    } else {
        Some(xs[mid])
    }
}

fn sum(column: &Column, positions: &[usize]) -> Result<Value> {
    let values = positions.iter().map(|&p| column.get(p)).filter(|v| !v.is_null());
    match column.dtype() {
        DType::Boolean | DType::Int64 => Ok(Value::Int64(
            values.filter_map(|v| v.as_i64()).fold(0i64, i64::wrapping_add),
        )),
        DType::UInt64 => Ok(Value::UInt64(
            values
                .map(|v| match v {
                    Value::UInt64(u) => u,
                    _ => 0,
                })
                .fold(0u64, u64::wrapping_add),
        )),
        DType::Float64 => Ok(Value::Float64(values.filter_map(|v| v.as_f64()).sum())),
        DType::String => Ok(Value::String(
            values.filter_map(|v| v.as_str().map(str::to_string)).collect(),
        )),
        other => Err(Error::type_mismatch("sum", other, other)),
    }
}

fn prod(column: &Column, positions: &[usize]) -> Result<Value> {
    match column.dtype() {
        DType::Boolean | DType::Int64 => Ok(Value::Int64(
            positions
                .iter()
                .filter_map(|&p| column.get(p).as_i64())
                .fold(1i64, i64::wrapping_mul),
        )),
        _ => {
            let xs = numbers(column, positions, "prod")?;
            Ok(Value::Float64(xs.iter().product()))
        }
    }
}

fn extreme(column: &Column, positions: &[usize], min: bool) -> Result<Value> {
    let mut best: Option<Value> = None;
    for &p in positions {
        let v = column.get(p);
        if v.is_null() {
            continue;
        }
        best = Some(match best {
            None => v,
            Some(b) => {
                let replace = match (&v, &b) {
                    (Value::Float64(x), Value::Float64(y)) => {
                        if min {
                            x < y
                        } else {
                            x > y
                        }
                    }
                    _ => {
                        let (Ok(x), Ok(y)) = (v.to_label(), b.to_label()) else {
                            return Err(Error::type_mismatch(
                                if min { "min" } else { "max" },
                                v.dtype(),
                                b.dtype(),
                            ));
                        };
                        if min {
                            x < y
                        } else {
                            x > y
                        }
                    }
                };
                if replace {
                    v
                } else {
                    b
                }
            }
        });
    }
    Ok(best.unwrap_or(Value::Null))
}

fn nunique(column: &Column, positions: &[usize]) -> usize {
    let mut labels = HashSet::new();
    let mut floats = HashSet::new();
    for &p in positions {
        match column.get(p) {
            Value::Null => {}
            Value::Float64(f) => {
                // -0.0 and 0.0 count once
                floats.insert((f + 0.0).to_bits());
            }
            v => {
                if let Ok(label) = v.to_label() {
                    labels.insert(label);
                }
            }
        }
    }
    labels.len() + floats.len()
}
