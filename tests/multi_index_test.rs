use tabrs::error::Error;
use tabrs::{Column, Label, MultiIndex, Series, TableIndex, Value};

fn tuples() -> Vec<Vec<Label>> {
    vec![
        vec![Label::from("A"), Label::Int(1)],
        vec![Label::from("A"), Label::Int(2)],
        vec![Label::from("B"), Label::Int(1)],
        vec![Label::from("B"), Label::Int(2)],
    ]
}

#[test]
fn test_multi_index_from_tuples() {
    let names = Some(vec![Some("first".to_string()), Some("second".to_string())]);
    let mi = MultiIndex::from_tuples(tuples(), names).unwrap();

    assert_eq!(mi.len(), 4);
    assert_eq!(mi.nlevels(), 2);
    assert_eq!(mi.levels()[0], vec![Label::from("A"), Label::from("B")]);
    assert_eq!(mi.codes()[1], vec![0, 1, 0, 1]);
    assert_eq!(mi.level_number("second").unwrap(), 1);
    assert_eq!(
        mi.get_tuple(2),
        Some(vec![Label::from("B"), Label::Int(1)])
    );
}

#[test]
fn test_multi_index_from_arrays() {
    let arrays = vec![
        vec![Label::from("x"), Label::from("x"), Label::from("y")],
        vec![Label::Int(1), Label::Int(2), Label::Int(1)],
    ];
    let mi = MultiIndex::from_arrays(arrays, None).unwrap();
    assert_eq!(mi.len(), 3);
    assert_eq!(mi.names(), &[None, None]);
    assert_eq!(mi.get_loc(&[Label::from("x"), Label::Int(2)]).unwrap(), 1);
}

#[test]
fn test_prefix_lookup() {
    let mi = MultiIndex::from_tuples(tuples(), None).unwrap();
    assert_eq!(mi.positions_of(&[Label::from("B")]), vec![2, 3]);
    assert!(mi.positions_of(&[Label::from("C")]).is_empty());
    assert!(matches!(
        mi.get_loc(&[Label::from("C"), Label::Int(1)]),
        Err(Error::KeyNotFound(_))
    ));
}

#[test]
fn test_level_values_and_swap() {
    let mi = MultiIndex::from_tuples(tuples(), None).unwrap();
    let inner = mi.get_level_values(1).unwrap();
    assert_eq!(
        inner.labels(),
        &[Label::Int(1), Label::Int(2), Label::Int(1), Label::Int(2)]
    );
    let swapped = mi.swaplevel(0, 1).unwrap();
    assert_eq!(
        swapped.get_tuple(1),
        Some(vec![Label::Int(2), Label::from("A")])
    );
    assert!(matches!(
        mi.get_level_values(5),
        Err(Error::IndexOutOfBounds { .. })
    ));
}

#[test]
fn test_droplevel_collapses_to_flat() {
    let index = TableIndex::Multi(MultiIndex::from_tuples(tuples(), None).unwrap());
    let flat = index.droplevel(0).unwrap();
    assert!(!flat.is_multi());
    assert!(!flat.is_unique());
}

#[test]
fn test_series_with_multi_index() {
    let index = TableIndex::Multi(MultiIndex::from_tuples(tuples(), None).unwrap());
    let s = Series::new(Column::from_i64(vec![1, 2, 3, 4]), index, None).unwrap();

    let outer = s.loc(&[Label::from("A")]).unwrap();
    assert_eq!(outer.to_vec(), vec![Value::Int64(1), Value::Int64(2)]);

    let sorted = s.sort_index(1).unwrap();
    assert_eq!(
        sorted.to_vec(),
        vec![Value::Int64(1), Value::Int64(3), Value::Int64(2), Value::Int64(4)]
    );
}
