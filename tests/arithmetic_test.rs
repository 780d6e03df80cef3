use tabrs::error::Error;
use tabrs::ops::align;
use tabrs::{DType, Index, JoinKind, Label, Series, Table, TableIndex, Value};

fn labeled(labels: Vec<&str>, values: Vec<i64>) -> Series {
    Series::from_labeled(labels, values, Some("v".to_string())).unwrap()
}

#[test]
fn test_add_aligns_on_labels() {
    let a = labeled(vec!["a", "b", "c"], vec![1, 2, 3]);
    let b = labeled(vec!["b", "c", "d"], vec![10, 20, 30]);
    let sum = a.add(&b).unwrap();

    assert_eq!(
        sum.index(),
        &TableIndex::Flat(Index::from_values(vec!["a", "b", "c", "d"]))
    );
    assert_eq!(
        sum.to_vec(),
        vec![Value::Null, Value::Int64(12), Value::Int64(23), Value::Null]
    );
    assert_eq!(sum.name(), Some("v"));
}

#[test]
fn test_add_with_fill_value() {
    let a = labeled(vec!["a", "b"], vec![1, 2]);
    let b = labeled(vec!["b", "c"], vec![10, 20]);
    let sum = a.add_fill(&b, Value::Int64(0)).unwrap();
    assert_eq!(
        sum.to_vec(),
        vec![Value::Int64(1), Value::Int64(12), Value::Int64(20)]
    );
}

#[test]
fn test_identical_index_pairs_positionally() {
    let a = labeled(vec!["x", "x"], vec![1, 2]);
    let b = labeled(vec!["x", "x"], vec![10, 20]);
    assert_eq!(
        a.add(&b).unwrap().to_vec(),
        vec![Value::Int64(11), Value::Int64(22)]
    );
}

#[test]
fn test_duplicate_labels_cartesian() {
    let a = labeled(vec!["x", "x"], vec![1, 2]);
    let b = labeled(vec!["x"], vec![10]);
    let plan = align(a.index(), b.index(), JoinKind::Outer).unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(plan.right_positions, vec![Some(0), Some(0)]);
}

#[test]
fn test_scalar_ops() {
    let a = Series::from_values(vec![1i64, 2, 3], None).unwrap();
    assert_eq!(
        a.mul_scalar(2i64).unwrap().to_vec(),
        vec![Value::Int64(2), Value::Int64(4), Value::Int64(6)]
    );
    assert_eq!(
        a.div_scalar(2i64).unwrap().to_vec(),
        vec![Value::Float64(0.5), Value::Float64(1.0), Value::Float64(1.5)]
    );
}

#[test]
fn test_type_mismatch() {
    let a = Series::from_values(vec![1i64], None).unwrap();
    let b = Series::from_values(vec!["x"], None).unwrap();
    assert!(matches!(a.add(&b), Err(Error::TypeMismatch { .. })));
}

#[test]
fn test_comparisons_are_three_valued() {
    let a = Series::from_values(vec![Value::Int64(1), Value::Null, Value::Int64(5)], None).unwrap();
    let b = Series::from_values(vec![2i64, 2, 2], None).unwrap();
    assert_eq!(
        a.lt(&b).unwrap().to_vec(),
        vec![Value::Boolean(true), Value::Null, Value::Boolean(false)]
    );
}

#[test]
fn test_left_and_inner_alignment() {
    let left = TableIndex::Flat(Index::from_values(vec!["b", "a"]));
    let right = TableIndex::Flat(Index::from_values(vec!["a", "c"]));

    let plan = align(&left, &right, JoinKind::Left).unwrap();
    assert_eq!(plan.index, left);
    assert_eq!(plan.right_positions, vec![None, Some(0)]);

    let plan = align(&left, &right, JoinKind::Inner).unwrap();
    assert_eq!(plan.index, TableIndex::Flat(Index::from_values(vec!["a"])));
}

#[test]
fn test_table_add_aligns_rows_and_columns() {
    let a = Table::from_columns(vec![
        ("x", vec![Value::Int64(1), Value::Int64(2)]),
        ("y", vec![Value::Int64(3), Value::Int64(4)]),
    ])
    .unwrap();
    let b = Table::from_columns(vec![("x", vec![Value::Int64(10), Value::Int64(20)])]).unwrap();
    let out = a.add(&b).unwrap();

    assert_eq!(out.shape(), (2, 2));
    assert_eq!(
        out.column("x").unwrap().to_vec(),
        vec![Value::Int64(11), Value::Int64(22)]
    );
    assert_eq!(out.column("y").unwrap().null_count(), 2);
    assert_eq!(out.value(&[Label::Int(0)], &[Label::from("x")]).unwrap(), Value::Int64(11));
}

#[test]
fn test_unsigned_arithmetic_keeps_large_values() {
    let a = Series::from_values(vec![u64::MAX - 10, 5], None).unwrap();
    let b = Series::from_values(vec![1u64, 1], None).unwrap();
    let sum = a.add(&b).unwrap();
    assert_eq!(sum.dtype(), DType::UInt64);
    assert_eq!(sum.null_count(), 0);
    assert_eq!(
        sum.to_vec(),
        vec![Value::UInt64(u64::MAX - 9), Value::UInt64(6)]
    );

    let signed = Series::from_values(vec![-1i64, 2], None).unwrap();
    let mixed = a.add(&signed).unwrap();
    assert_eq!(mixed.dtype(), DType::Float64);
    assert_eq!(mixed.null_count(), 0);
}

#[test]
fn test_signed_unsigned_comparison_is_exact() {
    let big = 1u64 << 53;
    let a = Series::from_values(vec![big as i64 + 1, -1], None).unwrap();
    let b = Series::from_values(vec![big, u64::MAX], None).unwrap();
    assert_eq!(
        a.gt(&b).unwrap().to_vec(),
        vec![Value::Boolean(true), Value::Boolean(false)]
    );
    assert_eq!(
        a.lt(&b).unwrap().to_vec(),
        vec![Value::Boolean(false), Value::Boolean(true)]
    );
}
