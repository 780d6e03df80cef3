//! Positional shifts and running totals

use crate::column::Column;
use crate::error::{Error, Result};
use crate::series::Series;
use crate::value::{DType, Value};

impl Series {
    /// Move values `periods` rows forward (negative: backward), filling the
    /// vacated rows with nulls. The index stays in place.
    pub fn shift(&self, periods: i64) -> Result<Series> {
        let len = self.len() as i64;
        let positions = (0..len)
            .map(|i| {
                let src = i.checked_sub(periods).ok_or_else(|| {
                    Error::InvalidInput(format!("shift by {} periods overflows", periods))
                })?;
                Ok((0..len).contains(&src).then_some(src as usize))
            })
            .collect::<Result<Vec<Option<usize>>>>()?;
        Ok(self.with_column(self.column().take_opt(&positions)))
    }

    /// `x[i] - x[i - periods]`
    pub fn diff(&self, periods: i64) -> Result<Series> {
        let current = self.to_f64()?;
        let previous = self.shift(periods)?.to_f64()?;
        let out = current
            .iter()
            .zip(&previous)
            .map(|(c, p)| match (c, p) {
                (Some(c), Some(p)) => Some(c - p),
                _ => None,
            })
            .collect();
        Ok(self.with_column(Column::from_opt_f64(out)))
    }

    /// `x[i] / x[i - periods] - 1`
    pub fn pct_change(&self, periods: i64) -> Result<Series> {
        let current = self.to_f64()?;
        let previous = self.shift(periods)?.to_f64()?;
        let out = current
            .iter()
            .zip(&previous)
            .map(|(c, p)| match (c, p) {
                (Some(c), Some(p)) if *p != 0.0 => Some(c / p - 1.0),
                _ => None,
            })
            .collect();
        Ok(self.with_column(Column::from_opt_f64(out)))
    }

    /// Running sum; nulls stay null and do not reset the total
    pub fn cumsum(&self) -> Result<Series> {
        if matches!(self.dtype(), DType::Int64 | DType::Boolean) {
            let mut total = 0i64;
            let values = self
                .to_vec()
                .into_iter()
                .map(|v| match v.as_i64() {
                    Some(x) => {
                        total = total.wrapping_add(x);
                        Value::Int64(total)
                    }
                    None => Value::Null,
                })
                .collect();
            return Ok(self.with_column(Column::from_values_as(values, DType::Int64)?));
        }
        let mut total = 0.0;
        let out = self
            .to_f64()?
            .into_iter()
            .map(|v| {
                v.map(|x| {
                    total += x;
                    total
                })
            })
            .collect();
        Ok(self.with_column(Column::from_opt_f64(out)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_and_diff() {
        let s = Series::from_values(vec![1i64, 4, 9], None).unwrap();
        assert_eq!(
            s.shift(1).unwrap().to_vec(),
            vec![Value::Null, Value::Int64(1), Value::Int64(4)]
        );
        assert_eq!(
            s.diff(1).unwrap().to_vec(),
            vec![Value::Null, Value::Float64(3.0), Value::Float64(5.0)]
        );
    }

    #[test]
    fn cumsum_skips_nulls() {
        let s = Series::from_values(vec![Some(1i64), None, Some(2)], None).unwrap();
        assert_eq!(
            s.cumsum().unwrap().to_vec(),
            vec![Value::Int64(1), Value::Null, Value::Int64(3)]
        );
    }
}
