use proptest::prelude::*;
use tabrs::{
    AggFunc, Column, GroupKey, Label, Series, TableIndex, Value, Window,
};

fn keyed_values() -> impl Strategy<Value = (Vec<u8>, Vec<i64>)> {
    (1usize..40).prop_flat_map(|n| {
        (
            prop::collection::vec(0u8..5, n),
            prop::collection::vec(-1000i64..1000, n),
        )
    })
}

proptest! {
    #[test]
    fn group_sizes_cover_every_row((keys, values) in keyed_values()) {
        let s = Series::from_values(values.clone(), None).unwrap();
        let keys: Vec<i64> = keys.into_iter().map(i64::from).collect();
        let sizes = s.groupby(GroupKey::values(keys)).unwrap().size().unwrap();
        let total: i64 = sizes
            .to_vec()
            .into_iter()
            .map(|v| match v {
                Value::Int64(n) => n,
                other => panic!("unexpected size {:?}", other),
            })
            .sum();
        prop_assert_eq!(total as usize, values.len());
    }

    #[test]
    fn transform_keeps_row_index((keys, values) in keyed_values()) {
        let s = Series::from_values(values, None).unwrap();
        let keys: Vec<i64> = keys.into_iter().map(i64::from).collect();
        let out = s
            .groupby(GroupKey::values(keys))
            .unwrap()
            .transform_agg(&AggFunc::Max)
            .unwrap();
        prop_assert_eq!(out.index(), s.index());
        prop_assert_eq!(out.len(), s.len());
    }

    #[test]
    fn singleton_group_mean_is_the_value(values in prop::collection::vec(-1000i64..1000, 1..30)) {
        let s = Series::from_values(values.clone(), None).unwrap();
        let keys: Vec<i64> = (0..values.len() as i64).collect();
        let means = s.groupby(GroupKey::values(keys)).unwrap().mean().unwrap();
        let expected: Vec<Value> = values.iter().map(|&v| Value::Float64(v as f64)).collect();
        prop_assert_eq!(means.to_vec(), expected);
    }

    #[test]
    fn rolling_leading_positions_are_null(
        values in prop::collection::vec(-100.0f64..100.0, 1..30),
        window in 1usize..6,
    ) {
        let s = Series::from_values(values.clone(), None).unwrap();
        let out = s.rolling(Window::Count(window)).unwrap().sum().unwrap();
        for (i, v) in out.to_vec().into_iter().enumerate() {
            prop_assert_eq!(v.is_null(), i + 1 < window);
        }
    }

    #[test]
    fn unstack_then_stack_round_trips(
        rows in 1usize..6,
        cols in 1usize..5,
        seed in prop::collection::vec(-50i64..50, 30),
    ) {
        let mut keys = Vec::with_capacity(rows * cols);
        let mut values = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                keys.push(vec![Label::Int(r as i64), Label::from(format!("c{}", c))]);
                values.push(seed[(r * cols + c) % seed.len()]);
            }
        }
        let index = TableIndex::from_keys(keys, vec![None, None]).unwrap();
        let s = Series::new(Column::from_i64(values), index, None).unwrap();

        let back = s.unstack(1).unwrap().stack(true).unwrap().into_series().unwrap();
        prop_assert_eq!(back.index().keys(), s.index().keys());
        prop_assert_eq!(back.to_vec(), s.to_vec());
    }
}
