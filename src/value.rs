//! Scalar cell values, column dtypes and index labels

use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{Error, Result};

/// Logical type of a column or scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    /// Only produced while inferring a column made entirely of nulls
    Null,
    Boolean,
    Int64,
    UInt64,
    Float64,
    String,
    Timestamp,
}

impl DType {
    /// Whether arithmetic treats this type as a number
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DType::Boolean | DType::Int64 | DType::UInt64 | DType::Float64
        )
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Null => "null",
            DType::Boolean => "bool",
            DType::Int64 => "int64",
            DType::UInt64 => "uint64",
            DType::Float64 => "float64",
            DType::String => "string",
            DType::Timestamp => "timestamp",
        };
        write!(f, "{}", name)
    }
}

/// Smallest dtype able to hold values of both `left` and `right`
pub fn common_dtype(left: DType, right: DType) -> Result<DType> {
    use DType::*;

    let out = match (left, right) {
        (a, b) if a == b => a,
        (Null, other) | (other, Null) => other,
        (Boolean, Int64) | (Int64, Boolean) => Int64,
        (Boolean, UInt64) | (UInt64, Boolean) => UInt64,
        // no integer dtype holds both ranges
        (Int64, UInt64) | (UInt64, Int64) => Float64,
        (Float64, Boolean | Int64 | UInt64) | (Boolean | Int64 | UInt64, Float64) => Float64,
        _ => return Err(Error::type_mismatch("combine", left, right)),
    };
    Ok(out)
}

/// A single cell. Floats that are NaN never survive construction; they
/// become [`Value::Null`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    String(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn dtype(&self) -> DType {
        match self {
            Value::Null => DType::Null,
            Value::Boolean(_) => DType::Boolean,
            Value::Int64(_) => DType::Int64,
            Value::UInt64(_) => DType::UInt64,
            Value::Float64(_) => DType::Float64,
            Value::String(_) => DType::String,
            Value::Timestamp(_) => DType::Timestamp,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the value; booleans count as 0/1
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int64(v) => Some(*v as f64),
            Value::UInt64(v) => Some(*v as f64),
            Value::Float64(v) if !v.is_nan() => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::Int64(v) => Some(*v),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Boolean(b) => Some(u64::from(*b)),
            Value::Int64(v) => u64::try_from(*v).ok(),
            Value::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    /// Exact integer view, for comparing signed and unsigned values
    pub(crate) fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Boolean(b) => Some(i128::from(*b)),
            Value::Int64(v) => Some(i128::from(*v)),
            Value::UInt64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert into an index label. Floats are rejected because they are not
    /// hashable labels.
    pub fn to_label(&self) -> Result<Label> {
        match self {
            Value::Null => Ok(Label::Null),
            Value::Boolean(b) => Ok(Label::Bool(*b)),
            Value::Int64(v) => Ok(Label::Int(*v)),
            Value::UInt64(v) => Ok(Label::from(*v)),
            Value::String(s) => Ok(Label::Str(s.clone())),
            Value::Timestamp(t) => Ok(Label::Timestamp(*t)),
            Value::Float64(v) if v.is_nan() => Ok(Label::Null),
            Value::Float64(_) => Err(Error::type_mismatch(
                "use as label",
                DType::Float64,
                DType::Null,
            )),
        }
    }

    /// Replace NaN with Null
    pub(crate) fn normalized(self) -> Value {
        match self {
            Value::Float64(v) if v.is_nan() => Value::Null,
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NA"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

macro_rules! impl_value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Boolean,
    i32 => Int64,
    i64 => Int64,
    u32 => UInt64,
    u64 => UInt64,
    String => String,
    NaiveDateTime => Timestamp,
);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Value::Null
        } else {
            Value::Float64(v)
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<Label> for Value {
    fn from(label: Label) -> Self {
        match label {
            Label::Null => Value::Null,
            Label::Bool(b) => Value::Boolean(b),
            Label::Int(v) => Value::Int64(v),
            Label::UInt(v) => Value::UInt64(v),
            Label::Str(s) => Value::String(s),
            Label::Timestamp(t) => Value::Timestamp(t),
        }
    }
}

/// Immutable, totally ordered and hashable identifier of a row or column.
///
/// Hierarchical labels are `Vec<Label>` tuples, one entry per index level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Label {
    /// Missing key; only appears when grouping with `dropna = false`
    Null,
    Bool(bool),
    Int(i64),
    /// Unsigned values above `i64::MAX`; smaller ones normalise to `Int`
    UInt(u64),
    Str(String),
    Timestamp(NaiveDateTime),
}

impl Label {
    pub fn is_null(&self) -> bool {
        matches!(self, Label::Null)
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Label::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Null => write!(f, "NA"),
            Label::Bool(v) => write!(f, "{}", v),
            Label::Int(v) => write!(f, "{}", v),
            Label::UInt(v) => write!(f, "{}", v),
            Label::Str(v) => write!(f, "{}", v),
            Label::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<i64> for Label {
    fn from(v: i64) -> Self {
        Label::Int(v)
    }
}

impl From<i32> for Label {
    fn from(v: i32) -> Self {
        Label::Int(i64::from(v))
    }
}

impl From<usize> for Label {
    fn from(v: usize) -> Self {
        Label::from(v as u64)
    }
}

impl From<u64> for Label {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Label::Int(i),
            Err(_) => Label::UInt(v),
        }
    }
}

impl From<bool> for Label {
    fn from(v: bool) -> Self {
        Label::Bool(v)
    }
}

impl From<&str> for Label {
    fn from(v: &str) -> Self {
        Label::Str(v.to_string())
    }
}

impl From<String> for Label {
    fn from(v: String) -> Self {
        Label::Str(v)
    }
}

impl From<NaiveDateTime> for Label {
    fn from(v: NaiveDateTime) -> Self {
        Label::Timestamp(v)
    }
}

/// Render a label tuple the way error messages show it: `(a, 1)`
pub(crate) fn format_tuple(labels: &[Label]) -> String {
    if labels.len() == 1 {
        return labels[0].to_string();
    }
    let parts: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_becomes_null() {
        assert_eq!(Value::from(f64::NAN), Value::Null);
        assert!(Value::Float64(f64::NAN).is_null());
    }

    #[test]
    fn float_is_not_a_label() {
        assert!(Value::Float64(1.5).to_label().is_err());
        assert_eq!(Value::Int64(3).to_label().unwrap(), Label::Int(3));
        assert_eq!(Value::UInt64(3).to_label().unwrap(), Label::Int(3));
    }

    #[test]
    fn common_dtype_promotes_numbers() {
        assert_eq!(
            common_dtype(DType::Int64, DType::Float64).unwrap(),
            DType::Float64
        );
        assert_eq!(common_dtype(DType::Null, DType::String).unwrap(), DType::String);
        assert!(common_dtype(DType::String, DType::Int64).is_err());
        assert_eq!(
            common_dtype(DType::Int64, DType::UInt64).unwrap(),
            DType::Float64
        );
        assert_eq!(
            common_dtype(DType::Boolean, DType::UInt64).unwrap(),
            DType::UInt64
        );
    }
}
