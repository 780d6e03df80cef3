use chrono::{Duration, NaiveDate, NaiveDateTime};
use tabrs::config::EngineConfig;
use tabrs::error::Error;
use tabrs::{EwmOptions, Series, Table, Value, Window};

fn floats(xs: &[Option<f64>]) -> Vec<Value> {
    xs.iter()
        .map(|x| x.map(Value::Float64).unwrap_or(Value::Null))
        .collect()
}

fn at(second: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::seconds(second)
}

#[test]
fn test_rolling_mean() {
    let s = Series::from_values(vec![1.0f64, 2.0, 3.0, 4.0, 5.0], None).unwrap();
    let out = s.rolling(Window::Count(3)).unwrap().mean().unwrap();
    assert_eq!(
        out.to_vec(),
        floats(&[None, None, Some(2.0), Some(3.0), Some(4.0)])
    );
    assert_eq!(out.index(), s.index());
}

#[test]
fn test_rolling_min_periods() {
    let s = Series::from_values(vec![1i64, 2, 3, 4], None).unwrap();
    let out = s
        .rolling(Window::Count(3))
        .unwrap()
        .min_periods(2)
        .sum()
        .unwrap();
    assert_eq!(out.to_vec(), floats(&[None, Some(3.0), Some(6.0), Some(9.0)]));
}

#[test]
fn test_rolling_std_and_median() {
    let s = Series::from_values(vec![2.0f64, 4.0, 4.0, 6.0], None).unwrap();
    let r = s.rolling(Window::Count(2)).unwrap();
    let std = r.std().unwrap();
    assert_eq!(std.get(0), Value::Null);
    match std.get(1) {
        Value::Float64(v) => assert!((v - 2f64.sqrt()).abs() < 1e-12),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        r.median().unwrap().to_vec(),
        floats(&[None, Some(3.0), Some(4.0), Some(5.0)])
    );
}

#[test]
fn test_duration_window() {
    let labels = vec![at(0), at(1), at(3), at(4)];
    let s = Series::from_labeled(labels, vec![1i64, 2, 3, 4], None).unwrap();
    let out = s
        .rolling(Window::Duration(Duration::seconds(2)))
        .unwrap()
        .sum()
        .unwrap();
    // (t - 2s, t]
    assert_eq!(
        out.to_vec(),
        floats(&[Some(1.0), Some(3.0), Some(3.0), Some(7.0)])
    );
}

#[test]
fn test_duration_window_needs_sorted_index() {
    let labels = vec![at(5), at(1)];
    let s = Series::from_labeled(labels, vec![1i64, 2], None).unwrap();
    assert!(matches!(
        s.rolling(Window::Duration(Duration::seconds(2))),
        Err(Error::UnsortedIndex(_))
    ));
}

#[test]
fn test_expanding() {
    let s = Series::from_values(vec![3i64, 1, 2], None).unwrap();
    let e = s.expanding(1).unwrap();
    assert_eq!(e.max().unwrap().to_vec(), floats(&[Some(3.0), Some(3.0), Some(3.0)]));
    assert_eq!(e.count().unwrap().to_vec(), floats(&[Some(1.0), Some(2.0), Some(3.0)]));
}

#[test]
fn test_apply_custom() {
    let s = Series::from_values(vec![1.0f64, 5.0, 2.0], None).unwrap();
    let spread = s
        .rolling(Window::Count(2))
        .unwrap()
        .apply(|xs| {
            let hi = xs.iter().cloned().fold(f64::MIN, f64::max);
            let lo = xs.iter().cloned().fold(f64::MAX, f64::min);
            Ok(hi - lo)
        })
        .unwrap();
    assert_eq!(spread.to_vec(), floats(&[None, Some(4.0), Some(3.0)]));

    let err = s
        .rolling(Window::Count(2))
        .unwrap()
        .apply(|_| Err(Error::InvalidInput("nope".into())))
        .unwrap_err();
    assert!(matches!(err, Error::Computation(_)));
}

#[test]
fn test_table_rolling_skips_text_columns() {
    let t = Table::from_columns(vec![
        ("a", vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]),
        ("label", vec![Value::from("x"), Value::from("y"), Value::from("z")]),
        ("b", vec![Value::Float64(1.0), Value::Null, Value::Float64(3.0)]),
    ])
    .unwrap();

    let serial = t
        .rolling(Window::Count(2))
        .unwrap()
        .with_config(EngineConfig::new().with_parallel_columns(false))
        .sum()
        .unwrap();
    let parallel = t
        .rolling(Window::Count(2))
        .unwrap()
        .with_config(EngineConfig::new().with_max_threads(2))
        .sum()
        .unwrap();

    assert_eq!(serial.column_names(), vec!["a", "b"]);
    assert_eq!(serial, parallel);
    assert_eq!(
        serial.column("a").unwrap().to_vec(),
        floats(&[None, Some(3.0), Some(5.0)])
    );
    assert_eq!(serial.column("b").unwrap().to_vec(), floats(&[None, None, None]));
}

#[test]
fn test_ewm_span() {
    let s = Series::from_values(vec![1.0f64, 1.0, 1.0], None).unwrap();
    let out = s.ewm(EwmOptions::span(3.0).unwrap()).mean().unwrap();
    assert_eq!(out.to_vec(), floats(&[Some(1.0), Some(1.0), Some(1.0)]));
    assert!(EwmOptions::span(0.5).is_err());
    assert!(EwmOptions::alpha(1.5).is_err());
}
