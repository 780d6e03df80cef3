//! Typed columnar storage with a validity bitmap
//!
//! Buffers are reference counted, so cloning or slicing a column shares the
//! underlying data read-only. Every operation that changes values builds a
//! new buffer.

mod bitmask;

use std::sync::Arc;

use chrono::NaiveDateTime;
use num_traits::ToPrimitive;

use crate::error::{Error, Result};
use crate::value::{common_dtype, DType, Value};

pub use bitmask::BitMask;

/// Physical storage of a column
#[derive(Debug, Clone)]
pub enum ColumnData {
    Boolean(Arc<[bool]>),
    Int64(Arc<[i64]>),
    UInt64(Arc<[u64]>),
    Float64(Arc<[f64]>),
    String(Arc<[String]>),
    Timestamp(Arc<[NaiveDateTime]>),
}

/// A homogeneously typed, fixed-length column
#[derive(Debug, Clone)]
pub struct Column {
    data: ColumnData,
    validity: BitMask,
}

impl PartialEq for Column {
    fn eq(&self, other: &Self) -> bool {
        self.dtype() == other.dtype() && self.len() == other.len() && self.values() == other.values()
    }
}

impl Column {
    /// Build a column from raw data and validity flags
    pub fn new(data: ColumnData, validity: BitMask) -> Result<Self> {
        let len = data_len(&data);
        if validity.len() != len {
            return Err(Error::LengthMismatch {
                expected: len,
                actual: validity.len(),
            });
        }
        Ok(Column { data, validity })
    }

    pub fn from_i64(values: Vec<i64>) -> Self {
        let validity = BitMask::all_valid(values.len());
        Column {
            data: ColumnData::Int64(values.into()),
            validity,
        }
    }

    pub fn from_u64(values: Vec<u64>) -> Self {
        let validity = BitMask::all_valid(values.len());
        Column {
            data: ColumnData::UInt64(values.into()),
            validity,
        }
    }

    /// NaN entries are recorded as nulls
    pub fn from_f64(values: Vec<f64>) -> Self {
        let valid: Vec<bool> = values.iter().map(|v| !v.is_nan()).collect();
        Column {
            data: ColumnData::Float64(values.into()),
            validity: BitMask::from_bools(&valid),
        }
    }

    pub fn from_bool(values: Vec<bool>) -> Self {
        let validity = BitMask::all_valid(values.len());
        Column {
            data: ColumnData::Boolean(values.into()),
            validity,
        }
    }

    pub fn from_strings<S: Into<String>>(values: Vec<S>) -> Self {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        let validity = BitMask::all_valid(values.len());
        Column {
            data: ColumnData::String(values.into()),
            validity,
        }
    }

    pub fn from_timestamps(values: Vec<NaiveDateTime>) -> Self {
        let validity = BitMask::all_valid(values.len());
        Column {
            data: ColumnData::Timestamp(values.into()),
            validity,
        }
    }

    pub fn from_opt_f64(values: Vec<Option<f64>>) -> Self {
        let valid: Vec<bool> = values
            .iter()
            .map(|v| matches!(v, Some(x) if !x.is_nan()))
            .collect();
        let data: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        Column {
            data: ColumnData::Float64(data.into()),
            validity: BitMask::from_bools(&valid),
        }
    }

    pub fn from_opt_i64(values: Vec<Option<i64>>) -> Self {
        let valid: Vec<bool> = values.iter().map(Option::is_some).collect();
        let data: Vec<i64> = values.into_iter().map(|v| v.unwrap_or_default()).collect();
        Column {
            data: ColumnData::Int64(data.into()),
            validity: BitMask::from_bools(&valid),
        }
    }

    /// Infer the narrowest common dtype of `values` and build a column.
    /// A column made only of nulls is stored as Float64.
    pub fn from_values(values: Vec<Value>) -> Result<Self> {
        let mut dtype = DType::Null;
        for v in &values {
            if !v.is_null() {
                dtype = common_dtype(dtype, v.dtype())?;
            }
        }
        if dtype == DType::Null {
            dtype = DType::Float64;
        }
        Self::from_values_as(values, dtype)
    }

    /// Build a column of `dtype`, casting each value
    pub fn from_values_as(values: Vec<Value>, dtype: DType) -> Result<Self> {
        let mut valid = Vec::with_capacity(values.len());
        let casted: Vec<Value> = values
            .into_iter()
            .map(|v| {
                let v = cast_value(v.normalized(), dtype)?;
                valid.push(!v.is_null());
                Ok(v)
            })
            .collect::<Result<_>>()?;

        let data = match dtype {
            DType::Boolean => ColumnData::Boolean(
                casted
                    .iter()
                    .map(|v| v.as_bool().unwrap_or_default())
                    .collect(),
            ),
            DType::Int64 => ColumnData::Int64(
                casted
                    .iter()
                    .map(|v| v.as_i64().unwrap_or_default())
                    .collect(),
            ),
            DType::UInt64 => ColumnData::UInt64(
                casted
                    .iter()
                    .map(|v| match v {
                        Value::UInt64(u) => *u,
                        _ => 0,
                    })
                    .collect(),
            ),
            DType::Float64 | DType::Null => ColumnData::Float64(
                casted
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(f64::NAN))
                    .collect(),
            ),
            DType::String => ColumnData::String(
                casted
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => s,
                        _ => String::new(),
                    })
                    .collect(),
            ),
            DType::Timestamp => ColumnData::Timestamp(
                casted
                    .iter()
                    .map(|v| v.as_timestamp().unwrap_or_default())
                    .collect(),
            ),
        };

        Ok(Column {
            data,
            validity: BitMask::from_bools(&valid),
        })
    }

    /// A column of `len` nulls
    pub fn nulls(dtype: DType, len: usize) -> Self {
        let data = match dtype {
            DType::Boolean => ColumnData::Boolean(vec![false; len].into()),
            DType::Int64 => ColumnData::Int64(vec![0; len].into()),
            DType::UInt64 => ColumnData::UInt64(vec![0; len].into()),
            DType::Float64 | DType::Null => ColumnData::Float64(vec![f64::NAN; len].into()),
            DType::String => ColumnData::String(vec![String::new(); len].into()),
            DType::Timestamp => {
                ColumnData::Timestamp(vec![NaiveDateTime::default(); len].into())
            }
        };
        Column {
            data,
            validity: BitMask::all_null(len),
        }
    }

    pub fn len(&self) -> usize {
        data_len(&self.data)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match &self.data {
            ColumnData::Boolean(_) => DType::Boolean,
            ColumnData::Int64(_) => DType::Int64,
            ColumnData::UInt64(_) => DType::UInt64,
            ColumnData::Float64(_) => DType::Float64,
            ColumnData::String(_) => DType::String,
            ColumnData::Timestamp(_) => DType::Timestamp,
        }
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn validity(&self) -> &BitMask {
        &self.validity
    }

    pub fn is_valid(&self, pos: usize) -> bool {
        pos < self.len() && self.validity.is_set(pos)
    }

    pub fn null_count(&self) -> usize {
        self.len() - self.validity.count_set()
    }

    /// Cell at `pos`; out-of-range positions read as null
    pub fn get(&self, pos: usize) -> Value {
        if !self.is_valid(pos) {
            return Value::Null;
        }
        match &self.data {
            ColumnData::Boolean(d) => Value::Boolean(d[pos]),
            ColumnData::Int64(d) => Value::Int64(d[pos]),
            ColumnData::UInt64(d) => Value::UInt64(d[pos]),
            ColumnData::Float64(d) => Value::from(d[pos]),
            ColumnData::String(d) => Value::String(d[pos].clone()),
            ColumnData::Timestamp(d) => Value::Timestamp(d[pos]),
        }
    }

    /// Checked variant of [`Column::get`]
    pub fn try_get(&self, pos: usize) -> Result<Value> {
        if pos >= self.len() {
            return Err(Error::IndexOutOfBounds {
                index: pos,
                size: self.len(),
            });
        }
        Ok(self.get(pos))
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    /// Numeric view; nulls become `None`. Non-numeric columns fail.
    pub fn to_f64(&self) -> Result<Vec<Option<f64>>> {
        let len = self.len();
        let out = match &self.data {
            ColumnData::Boolean(d) => (0..len)
                .map(|i| self.validity.is_set(i).then(|| if d[i] { 1.0 } else { 0.0 }))
                .collect(),
            ColumnData::Int64(d) => (0..len)
                .map(|i| {
                    if self.validity.is_set(i) {
                        d[i].to_f64()
                    } else {
                        None
                    }
                })
                .collect(),
            ColumnData::UInt64(d) => (0..len)
                .map(|i| {
                    if self.validity.is_set(i) {
                        d[i].to_f64()
                    } else {
                        None
                    }
                })
                .collect(),
            ColumnData::Float64(d) => (0..len)
                .map(|i| (self.validity.is_set(i) && !d[i].is_nan()).then(|| d[i]))
                .collect(),
            _ => {
                return Err(Error::type_mismatch(
                    "use as number",
                    self.dtype(),
                    DType::Float64,
                ))
            }
        };
        Ok(out)
    }

    /// Gather rows by position
    pub fn take(&self, positions: &[usize]) -> Result<Column> {
        let len = self.len();
        if let Some(&bad) = positions.iter().find(|&&p| p >= len) {
            return Err(Error::IndexOutOfBounds {
                index: bad,
                size: len,
            });
        }
        let opt: Vec<Option<usize>> = positions.iter().map(|&p| Some(p)).collect();
        Ok(self.take_opt(&opt))
    }

    /// Gather rows by optional position; `None` and out-of-range positions
    /// produce nulls. Used by alignment and reindexing.
    pub fn take_opt(&self, positions: &[Option<usize>]) -> Column {
        let len = self.len();
        let valid: Vec<bool> = positions
            .iter()
            .map(|p| matches!(p, Some(i) if *i < len && self.validity.is_set(*i)))
            .collect();

        fn gather<T: Clone + Default>(src: &[T], positions: &[Option<usize>]) -> Arc<[T]> {
            positions
                .iter()
                .map(|p| match p {
                    Some(i) if *i < src.len() => src[*i].clone(),
                    _ => T::default(),
                })
                .collect()
        }

        let data = match &self.data {
            ColumnData::Boolean(d) => ColumnData::Boolean(gather(d, positions)),
            ColumnData::Int64(d) => ColumnData::Int64(gather(d, positions)),
            ColumnData::UInt64(d) => ColumnData::UInt64(gather(d, positions)),
            ColumnData::Float64(d) => ColumnData::Float64(gather(d, positions)),
            ColumnData::String(d) => ColumnData::String(gather(d, positions)),
            ColumnData::Timestamp(d) => ColumnData::Timestamp(gather(d, positions)),
        };

        Column {
            data,
            validity: BitMask::from_bools(&valid),
        }
    }

    /// Contiguous sub-range sharing nothing but values
    pub fn slice(&self, start: usize, len: usize) -> Result<Column> {
        let end = start.saturating_add(len);
        if end > self.len() {
            return Err(Error::IndexOutOfBounds {
                index: end,
                size: self.len(),
            });
        }
        let positions: Vec<usize> = (start..end).collect();
        self.take(&positions)
    }

    /// Convert to another dtype
    pub fn cast(&self, dtype: DType) -> Result<Column> {
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        Column::from_values_as(self.values(), dtype)
    }

    /// Replace nulls with `fill`
    pub fn fill_null(&self, fill: &Value) -> Result<Column> {
        if self.null_count() == 0 {
            return Ok(self.clone());
        }
        let values = self
            .values()
            .into_iter()
            .map(|v| if v.is_null() { fill.clone() } else { v })
            .collect();
        Column::from_values(values)
    }

    /// Append columns end to end, promoting to a common dtype
    pub fn concat(columns: &[Column]) -> Result<Column> {
        let mut dtype = DType::Null;
        for col in columns {
            if col.null_count() < col.len() {
                dtype = common_dtype(dtype, col.dtype())?;
            }
        }
        if dtype == DType::Null {
            dtype = columns.first().map(|c| c.dtype()).unwrap_or(DType::Float64);
        }
        let values: Vec<Value> = columns.iter().flat_map(|c| c.values()).collect();
        Column::from_values_as(values, dtype)
    }
}

fn data_len(data: &ColumnData) -> usize {
    match data {
        ColumnData::Boolean(d) => d.len(),
        ColumnData::Int64(d) => d.len(),
        ColumnData::UInt64(d) => d.len(),
        ColumnData::Float64(d) => d.len(),
        ColumnData::String(d) => d.len(),
        ColumnData::Timestamp(d) => d.len(),
    }
}

/// Cast a single value to `dtype`. Nulls pass through.
pub fn cast_value(value: Value, dtype: DType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let from = value.dtype();
    if from == dtype {
        return Ok(value);
    }
    let out = match (dtype, &value) {
        (DType::Float64, _) if from.is_numeric() => value.as_f64().map(Value::Float64),
        (DType::Int64, Value::Boolean(_) | Value::UInt64(_)) => value.as_i64().map(Value::Int64),
        (DType::UInt64, Value::Boolean(b)) => Some(Value::UInt64(u64::from(*b))),
        (DType::UInt64, Value::Int64(i)) => u64::try_from(*i).ok().map(Value::UInt64),
        (DType::Null, _) => Some(Value::Null),
        _ => None,
    };
    out.ok_or_else(|| Error::type_mismatch("cast", from, dtype))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_common_numeric_type() {
        let col = Column::from_values(vec![Value::Int64(1), Value::Float64(2.5), Value::Null])
            .unwrap();
        assert_eq!(col.dtype(), DType::Float64);
        assert_eq!(col.null_count(), 1);
        assert_eq!(col.get(0), Value::Float64(1.0));
    }

    #[test]
    fn mixed_string_and_number_is_rejected() {
        let err = Column::from_values(vec![Value::Int64(1), Value::from("a")]).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn take_opt_fills_nulls() {
        let col = Column::from_i64(vec![10, 20, 30]);
        let taken = col.take_opt(&[Some(2), None, Some(0)]);
        assert_eq!(
            taken.values(),
            vec![Value::Int64(30), Value::Null, Value::Int64(10)]
        );
        // source untouched
        assert_eq!(col.null_count(), 0);
    }

    #[test]
    fn nan_input_is_null() {
        let col = Column::from_f64(vec![1.0, f64::NAN]);
        assert_eq!(col.null_count(), 1);
        assert_eq!(col.to_f64().unwrap(), vec![Some(1.0), None]);
    }
}
