use tabrs::error::Error;
use tabrs::{AggFunc, Column, Label, MeltOptions, Series, Table, TableIndex, Value};

fn long() -> Table {
    Table::from_rows(
        vec![
            vec![Value::Int64(1), Value::from("A"), Value::Int64(9)],
            vec![Value::Int64(1), Value::from("B"), Value::Int64(8)],
            vec![Value::Int64(2), Value::from("A"), Value::Int64(7)],
        ],
        vec!["id", "key", "val"],
    )
    .unwrap()
}

#[test]
fn test_pivot() {
    let wide = long()
        .pivot(&[Label::from("id")], &[Label::from("key")], &[Label::from("val")])
        .unwrap();
    assert_eq!(wide.shape(), (2, 2));
    assert_eq!(wide.column_names(), vec!["A", "B"]);
    assert_eq!(
        wide.index().keys(),
        vec![vec![Label::Int(1)], vec![Label::Int(2)]]
    );
    assert_eq!(
        wide.value(&[Label::Int(1)], &[Label::from("B")]).unwrap(),
        Value::Int64(8)
    );
    assert_eq!(
        wide.value(&[Label::Int(2)], &[Label::from("B")]).unwrap(),
        Value::Null
    );
}

#[test]
fn test_pivot_duplicate_pair() {
    let mut rows = long().to_rows();
    rows.push(vec![Value::Int64(2), Value::from("A"), Value::Int64(0)]);
    let t = Table::from_rows(rows, vec!["id", "key", "val"]).unwrap();
    let err = t
        .pivot(&[Label::from("id")], &[Label::from("key")], &[Label::from("val")])
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateKey(_)));

    let agg = t
        .pivot_table(
            &[Label::from("id")],
            &[Label::from("key")],
            &[Label::from("val")],
            AggFunc::Sum,
        )
        .unwrap();
    assert_eq!(
        agg.value(&[Label::Int(2)], &[Label::from("A")]).unwrap(),
        Value::Int64(7)
    );
}

fn two_level_series() -> Series {
    let keys = vec![
        vec![Label::from("r1"), Label::from("a")],
        vec![Label::from("r1"), Label::from("b")],
        vec![Label::from("r2"), Label::from("a")],
        vec![Label::from("r2"), Label::from("b")],
    ];
    let index = TableIndex::from_keys(keys, vec![None, None]).unwrap();
    Series::new(Column::from_i64(vec![1, 2, 3, 4]), index, None).unwrap()
}

#[test]
fn test_unstack_stack_round_trip() {
    let s = two_level_series();
    let wide = s.unstack(1).unwrap();
    assert_eq!(wide.shape(), (2, 2));

    let back = wide.stack(true).unwrap().into_series().unwrap();
    assert_eq!(back.index().keys(), s.index().keys());
    assert_eq!(back.to_vec(), s.to_vec());
}

#[test]
fn test_unstack_duplicate_entry() {
    let keys = vec![
        vec![Label::from("r1"), Label::from("a")],
        vec![Label::from("r1"), Label::from("a")],
    ];
    let index = TableIndex::from_keys(keys, vec![None, None]).unwrap();
    let s = Series::new(Column::from_i64(vec![1, 2]), index, None).unwrap();
    assert!(matches!(s.unstack(1), Err(Error::DuplicateKey(_))));
}

#[test]
fn test_table_unstack_builds_column_hierarchy() {
    let t = Table::from_series(vec![two_level_series().rename(Some("x".to_string()))]).unwrap();
    let wide = t.unstack(1).unwrap();
    assert_eq!(wide.columns().nlevels(), 2);
    assert_eq!(
        wide.value(&[Label::from("r2")], &[Label::from("x"), Label::from("b")])
            .unwrap(),
        Value::Int64(4)
    );

    let stacked = wide.stack(true).unwrap().into_table().unwrap();
    assert_eq!(stacked.nrows(), 4);
    assert_eq!(
        stacked.column("x").unwrap().to_vec(),
        two_level_series().to_vec()
    );
}

#[test]
fn test_melt() {
    let t = Table::from_columns(vec![
        ("id", vec![Value::Int64(1), Value::Int64(2)]),
        ("A", vec![Value::Int64(10), Value::Int64(20)]),
        ("B", vec![Value::Int64(30), Value::Int64(40)]),
    ])
    .unwrap();
    let melted = t
        .melt(
            &MeltOptions::new()
                .id_vars(vec!["id"])
                .var_name("col")
                .value_name("amount"),
        )
        .unwrap();
    assert_eq!(melted.shape(), (4, 3));
    assert_eq!(melted.column_names(), vec!["id", "col", "amount"]);
    assert_eq!(
        melted.column("id").unwrap().to_vec(),
        vec![Value::Int64(1), Value::Int64(2), Value::Int64(1), Value::Int64(2)]
    );

    let err = t
        .melt(&MeltOptions::new().id_vars(vec!["missing"]))
        .unwrap_err();
    assert!(matches!(err, Error::KeyNotFound(_)));
}
