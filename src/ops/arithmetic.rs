//! Label-aligned elementwise arithmetic and comparisons
//!
//! Operands are aligned on their indexes first (outer join), then combined
//! position by position. Nulls propagate unless a fill value is given.

use std::cmp::Ordering;
use std::sync::Arc;

use log::trace;

use crate::column::Column;
use crate::error::{Error, Result};
use crate::ops::align::{align, JoinKind};
use crate::series::Series;
use crate::table::Table;
use crate::value::{DType, Value};

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl ArithOp {
    fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "subtract",
            ArithOp::Mul => "multiply",
            ArithOp::Div => "divide",
            ArithOp::Rem => "take the remainder of",
            ArithOp::Pow => "raise",
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn test(&self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }
}

fn is_integer(dtype: DType) -> bool {
    matches!(dtype, DType::Boolean | DType::Int64 | DType::UInt64)
}

/// Result dtype of `left op right`
fn result_dtype(op: ArithOp, left: DType, right: &Column) -> Result<DType> {
    let rdt = right.dtype();
    if left == DType::String && rdt == DType::String && op == ArithOp::Add {
        return Ok(DType::String);
    }
    if !left.is_numeric() || !rdt.is_numeric() {
        return Err(Error::type_mismatch(op.symbol(), left, rdt));
    }
    if left == DType::Float64 || rdt == DType::Float64 {
        return Ok(DType::Float64);
    }
    let unsigned = left == DType::UInt64 || rdt == DType::UInt64;
    let signed = left == DType::Int64 || rdt == DType::Int64;
    if unsigned && signed {
        return Ok(DType::Float64);
    }
    match op {
        ArithOp::Div => Ok(DType::Float64),
        _ if unsigned => Ok(DType::UInt64),
        ArithOp::Pow => {
            let negative = right
                .values()
                .iter()
                .any(|v| v.as_i64().map_or(false, |e| e < 0));
            Ok(if negative { DType::Float64 } else { DType::Int64 })
        }
        _ => Ok(DType::Int64),
    }
}

/// Remainder with the sign of the divisor
fn floor_mod_i64(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

/// `base^exp` modulo 2^64
fn wrapping_pow_u64(mut base: u64, mut exp: u64) -> u64 {
    let mut acc = 1u64;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    acc
}

fn floor_mod_f64(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
        r + b
    } else {
        r
    }
}

fn apply_arith(op: ArithOp, dtype: DType, integers: bool, l: &Value, r: &Value) -> Value {
    if l.is_null() || r.is_null() {
        return Value::Null;
    }
    match dtype {
        DType::String => match (l, r) {
            (Value::String(a), Value::String(b)) => Value::String(format!("{}{}", a, b)),
            _ => Value::Null,
        },
        DType::Int64 => {
            let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) else {
                return Value::Null;
            };
            match op {
                ArithOp::Add => Value::Int64(a.wrapping_add(b)),
                ArithOp::Sub => Value::Int64(a.wrapping_sub(b)),
                ArithOp::Mul => Value::Int64(a.wrapping_mul(b)),
                ArithOp::Rem if b == 0 => Value::Null,
                ArithOp::Rem => Value::Int64(floor_mod_i64(a, b)),
                ArithOp::Pow => match u32::try_from(b) {
                    Ok(e) => Value::Int64(a.wrapping_pow(e)),
                    Err(_) => Value::Null,
                },
                ArithOp::Div => Value::Null,
            }
        }
        DType::UInt64 => {
            let (Some(a), Some(b)) = (l.as_u64(), r.as_u64()) else {
                return Value::Null;
            };
            match op {
                ArithOp::Add => Value::UInt64(a.wrapping_add(b)),
                ArithOp::Sub => Value::UInt64(a.wrapping_sub(b)),
                ArithOp::Mul => Value::UInt64(a.wrapping_mul(b)),
                ArithOp::Rem if b == 0 => Value::Null,
                ArithOp::Rem => Value::UInt64(a % b),
                ArithOp::Pow => Value::UInt64(wrapping_pow_u64(a, b)),
                ArithOp::Div => Value::Null,
            }
        }
        _ => {
            let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
                return Value::Null;
            };
            if integers && b == 0.0 && matches!(op, ArithOp::Div | ArithOp::Rem) {
                return Value::Null;
            }
            let out = match op {
                ArithOp::Add => a + b,
                ArithOp::Sub => a - b,
                ArithOp::Mul => a * b,
                ArithOp::Div => a / b,
                ArithOp::Rem => floor_mod_f64(a, b),
                ArithOp::Pow => a.powf(b),
            };
            Value::from(out)
        }
    }
}

/// Combine two equal-length columns
pub fn arith_columns(op: ArithOp, left: &Column, right: &Column) -> Result<Column> {
    if left.len() != right.len() {
        return Err(Error::LengthMismatch {
            expected: left.len(),
            actual: right.len(),
        });
    }
    let dtype = result_dtype(op, left.dtype(), right)?;
    let integers = is_integer(left.dtype()) && is_integer(right.dtype());
    let values = (0..left.len())
        .map(|i| apply_arith(op, dtype, integers, &left.get(i), &right.get(i)))
        .collect();
    Column::from_values_as(values, dtype)
}

fn comparable(left: DType, right: DType) -> bool {
    (left.is_numeric() && right.is_numeric())
        || (left == right && matches!(left, DType::String | DType::Timestamp))
}

fn compare_values(l: &Value, r: &Value) -> Option<Ordering> {
    match (l, r) {
        (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
        (Value::UInt64(a), Value::UInt64(b)) => Some(a.cmp(b)),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Value::Float64(_), _) | (_, Value::Float64(_)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        _ => Some(l.as_i128()?.cmp(&r.as_i128()?)),
    }
}

/// Three-valued comparison of two equal-length columns
pub fn compare_columns(op: CompareOp, left: &Column, right: &Column) -> Result<Column> {
    if left.len() != right.len() {
        return Err(Error::LengthMismatch {
            expected: left.len(),
            actual: right.len(),
        });
    }
    if !comparable(left.dtype(), right.dtype()) {
        return Err(Error::type_mismatch("compare", left.dtype(), right.dtype()));
    }
    let values = (0..left.len())
        .map(|i| match compare_values(&left.get(i), &right.get(i)) {
            Some(ord) => Value::Boolean(op.test(ord)),
            None => Value::Null,
        })
        .collect();
    Column::from_values_as(values, DType::Boolean)
}

/// Replace a missing side with `fill` wherever exactly one side is null
fn fill_one_sided(left: &Column, right: &Column, fill: &Value) -> Result<(Column, Column)> {
    let mut lv = left.values();
    let mut rv = right.values();
    for (l, r) in lv.iter_mut().zip(rv.iter_mut()) {
        match (l.is_null(), r.is_null()) {
            (true, false) => *l = fill.clone(),
            (false, true) => *r = fill.clone(),
            _ => {}
        }
    }
    Ok((Column::from_values(lv)?, Column::from_values(rv)?))
}

fn broadcast(value: &Value, len: usize) -> Result<Column> {
    Column::from_values(vec![value.clone(); len])
}

impl Series {
    /// Align with `other` and combine elementwise
    pub fn binary(&self, other: &Series, op: ArithOp, fill: Option<&Value>) -> Result<Series> {
        let plan = align(self.index(), other.index(), JoinKind::Outer)?;
        let (mut left, mut right) = if plan.is_identity() {
            (self.column().clone(), other.column().clone())
        } else {
            (
                self.column().take_opt(&plan.left_positions),
                other.column().take_opt(&plan.right_positions),
            )
        };
        if let Some(fill) = fill {
            (left, right) = fill_one_sided(&left, &right, fill)?;
        }
        trace!("{:?} over {} aligned rows", op, plan.len());
        let column = arith_columns(op, &left, &right)?;
        Series::new(column, plan.index, shared_name(self, other))
    }

    /// Combine every element with a scalar
    pub fn binary_scalar(&self, value: &Value, op: ArithOp) -> Result<Series> {
        let right = broadcast(value, self.len())?;
        Ok(self.with_column(arith_columns(op, self.column(), &right)?))
    }

    /// Align with `other` and compare elementwise
    pub fn compare(&self, other: &Series, op: CompareOp) -> Result<Series> {
        let plan = align(self.index(), other.index(), JoinKind::Outer)?;
        let left = self.column().take_opt(&plan.left_positions);
        let right = other.column().take_opt(&plan.right_positions);
        let column = compare_columns(op, &left, &right)?;
        Series::new(column, plan.index, shared_name(self, other))
    }

    /// Compare every element with a scalar
    pub fn compare_scalar(&self, value: &Value, op: CompareOp) -> Result<Series> {
        let right = broadcast(value, self.len())?;
        Ok(self.with_column(compare_columns(op, self.column(), &right)?))
    }

    pub fn equal(&self, other: &Series) -> Result<Series> {
        self.compare(other, CompareOp::Eq)
    }

    pub fn not_equal(&self, other: &Series) -> Result<Series> {
        self.compare(other, CompareOp::Ne)
    }

    pub fn lt(&self, other: &Series) -> Result<Series> {
        self.compare(other, CompareOp::Lt)
    }

    pub fn le(&self, other: &Series) -> Result<Series> {
        self.compare(other, CompareOp::Le)
    }

    pub fn gt(&self, other: &Series) -> Result<Series> {
        self.compare(other, CompareOp::Gt)
    }

    pub fn ge(&self, other: &Series) -> Result<Series> {
        self.compare(other, CompareOp::Ge)
    }
}

fn shared_name(left: &Series, right: &Series) -> Option<String> {
    if left.name() == right.name() {
        left.name().map(str::to_string)
    } else {
        None
    }
}

impl Table {
    /// Align rows and columns with `other` and combine cell by cell.
    /// A column present on one side only comes out all null unless `fill`
    /// stands in for the missing side.
    pub fn binary(&self, other: &Table, op: ArithOp, fill: Option<&Value>) -> Result<Table> {
        let rows = align(self.index(), other.index(), JoinKind::Outer)?;
        let cols = align(self.columns(), other.columns(), JoinKind::Outer)?;
        let nrows = rows.len();

        let mut data = Vec::with_capacity(cols.len());
        for (lc, rc) in cols.left_positions.iter().zip(&cols.right_positions) {
            let left = lc.map(|p| self.data()[p].take_opt(&rows.left_positions));
            let right = rc.map(|p| other.data()[p].take_opt(&rows.right_positions));
            let column = match (left, right, fill) {
                (Some(l), Some(r), None) => arith_columns(op, &l, &r)?,
                (l, r, Some(fill)) => {
                    let l = l.unwrap_or_else(|| Column::nulls(DType::Float64, nrows));
                    let r = r.unwrap_or_else(|| Column::nulls(DType::Float64, nrows));
                    let (l, r) = fill_one_sided(&l, &r, fill)?;
                    arith_columns(op, &l, &r)?
                }
                _ => Column::nulls(DType::Float64, nrows),
            };
            data.push(column);
        }
        Table::with_shared_index(Arc::new(rows.index), cols.index, data)
    }

    /// Combine every cell with a scalar
    pub fn binary_scalar(&self, value: &Value, op: ArithOp) -> Result<Table> {
        let right = broadcast(value, self.nrows())?;
        self.map_columns(|c| arith_columns(op, c, &right))
    }
}

macro_rules! arith_methods {
    ($ty:ty, $other:ty; $($op:ident => $name:ident, $fill:ident, $scalar:ident;)*) => {
        impl $ty {
            $(
                pub fn $name(&self, other: &$other) -> Result<$ty> {
                    self.binary(other, ArithOp::$op, None)
                }

                /// Like the plain operator, with `fill` standing in for a
                /// value missing on exactly one side
                pub fn $fill(&self, other: &$other, fill: Value) -> Result<$ty> {
                    self.binary(other, ArithOp::$op, Some(&fill))
                }

                pub fn $scalar<V: Into<Value>>(&self, value: V) -> Result<$ty> {
                    self.binary_scalar(&value.into(), ArithOp::$op)
                }
            )*
        }
    };
}

arith_methods!(Series, Series;
    Add => add, add_fill, add_scalar;
    Sub => sub, sub_fill, sub_scalar;
    Mul => mul, mul_fill, mul_scalar;
    Div => div, div_fill, div_scalar;
    Rem => rem, rem_fill, rem_scalar;
    Pow => pow, pow_fill, pow_scalar;
);

arith_methods!(Table, Table;
    Add => add, add_fill, add_scalar;
    Sub => sub, sub_fill, sub_scalar;
    Mul => mul, mul_fill, mul_scalar;
    Div => div, div_fill, div_scalar;
    Rem => rem, rem_fill, rem_scalar;
    Pow => pow, pow_fill, pow_scalar;
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_style_modulo() {
        assert_eq!(floor_mod_i64(-7, 3), 2);
        assert_eq!(floor_mod_i64(7, -3), -2);
        assert_eq!(floor_mod_f64(-1.0, 4.0), 3.0);
    }

    #[test]
    fn integer_division_by_zero_is_null() {
        let l = Column::from_i64(vec![4, 1]);
        let r = Column::from_i64(vec![2, 0]);
        let out = arith_columns(ArithOp::Div, &l, &r).unwrap();
        assert_eq!(out.values(), vec![Value::Float64(2.0), Value::Null]);
        let out = arith_columns(ArithOp::Rem, &l, &r).unwrap();
        assert_eq!(out.values(), vec![Value::Int64(0), Value::Null]);
    }

    #[test]
    fn negative_exponent_gives_float() {
        let l = Column::from_i64(vec![2, 2]);
        let r = Column::from_i64(vec![3, -1]);
        let out = arith_columns(ArithOp::Pow, &l, &r).unwrap();
        assert_eq!(out.dtype(), DType::Float64);
        assert_eq!(out.values(), vec![Value::Float64(8.0), Value::Float64(0.5)]);
    }

    #[test]
    fn unsigned_stays_unsigned() {
        let l = Column::from_u64(vec![u64::MAX - 10, 5, 3]);
        let r = Column::from_u64(vec![1, 1, 0]);
        let out = arith_columns(ArithOp::Add, &l, &r).unwrap();
        assert_eq!(out.dtype(), DType::UInt64);
        assert_eq!(
            out.values(),
            vec![Value::UInt64(u64::MAX - 9), Value::UInt64(6), Value::UInt64(3)]
        );
        assert_eq!(
            arith_columns(ArithOp::Sub, &r, &l).unwrap().values()[1],
            Value::UInt64(1u64.wrapping_sub(5))
        );
        assert_eq!(
            arith_columns(ArithOp::Rem, &l, &r).unwrap().values()[2],
            Value::Null
        );
        assert_eq!(wrapping_pow_u64(3, 4), 81);
        assert_eq!(wrapping_pow_u64(2, 64), 0);
    }

    #[test]
    fn strings_only_concatenate() {
        let l = Column::from_strings(vec!["a"]);
        let r = Column::from_strings(vec!["b"]);
        assert_eq!(
            arith_columns(ArithOp::Add, &l, &r).unwrap().values(),
            vec![Value::from("ab")]
        );
        assert!(matches!(
            arith_columns(ArithOp::Mul, &l, &r),
            Err(Error::TypeMismatch { .. })
        ));
    }
}
