use chrono::{Duration, NaiveDate, NaiveDateTime};
use tabrs::error::Error;
use tabrs::{AggFunc, Frequency, Label, Series, Side, Table, Value};

fn at(minute: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::minutes(minute)
}

fn minute_ticks(n: i64) -> Series {
    let labels: Vec<NaiveDateTime> = (0..n).map(at).collect();
    let values: Vec<i64> = (0..n).collect();
    Series::from_labeled(labels, values, Some("v".to_string())).unwrap()
}

#[test]
fn test_downsample_sum() {
    let out = minute_ticks(12)
        .resample("5min")
        .unwrap()
        .closed(Side::Left)
        .label(Side::Left)
        .sum()
        .unwrap();
    let labels: Vec<Label> = (0..3).map(|i| Label::Timestamp(at(i * 5))).collect();
    assert_eq!(out.index().keys(), labels.into_iter().map(|l| vec![l]).collect::<Vec<_>>());
    assert_eq!(
        out.to_vec(),
        vec![Value::Int64(10), Value::Int64(35), Value::Int64(21)]
    );
}

#[test]
fn test_first_at_native_frequency_is_identity() {
    let s = minute_ticks(7);
    let out = s.resample("1min").unwrap().agg(&AggFunc::First).unwrap();
    assert_eq!(out, s);
}

#[test]
fn test_ohlc() {
    let out = minute_ticks(10).resample("5min").unwrap().ohlc().unwrap();
    assert_eq!(out.column_names(), vec!["open", "high", "low", "close"]);
    assert_eq!(
        out.row(1).unwrap(),
        vec![Value::Int64(5), Value::Int64(9), Value::Int64(5), Value::Int64(9)]
    );
}

#[test]
fn test_upsample() {
    let labels = vec![at(0), at(10)];
    let s = Series::from_labeled(labels, vec![1.0f64, 2.0], None).unwrap();
    let r = s.resample("5min").unwrap();

    assert_eq!(
        r.asfreq().unwrap().to_vec(),
        vec![Value::Float64(1.0), Value::Null, Value::Float64(2.0)]
    );
    assert_eq!(
        r.ffill(None).unwrap().to_vec(),
        vec![Value::Float64(1.0), Value::Float64(1.0), Value::Float64(2.0)]
    );
    assert_eq!(
        r.bfill(None).unwrap().to_vec(),
        vec![Value::Float64(1.0), Value::Float64(2.0), Value::Float64(2.0)]
    );
}

#[test]
fn test_ffill_limit() {
    let labels = vec![at(0), at(20)];
    let s = Series::from_labeled(labels, vec![1i64, 2], None).unwrap();
    let out = s.resample("5min").unwrap().ffill(Some(1)).unwrap();
    assert_eq!(
        out.to_vec(),
        vec![
            Value::Int64(1),
            Value::Int64(1),
            Value::Null,
            Value::Null,
            Value::Int64(2)
        ]
    );
}

#[test]
fn test_calendar_month_buckets() {
    let days = vec![
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
    ];
    let s = Series::from_labeled(days, vec![1i64, 2, 3], None).unwrap();
    let out = s.resample("M").unwrap().count().unwrap();
    assert_eq!(
        out.to_vec(),
        vec![Value::Int64(2), Value::Int64(0), Value::Int64(1)]
    );
}

#[test]
fn test_table_resample_on_column() {
    let t = Table::from_columns(vec![
        (
            "when",
            vec![
                Value::Timestamp(at(0)),
                Value::Timestamp(at(3)),
                Value::Timestamp(at(7)),
            ],
        ),
        ("qty", vec![Value::Int64(1), Value::Int64(2), Value::Int64(4)]),
    ])
    .unwrap();
    let out = t.resample("5min").unwrap().on("when").sum().unwrap();
    assert_eq!(out.column_names(), vec!["qty"]);
    assert_eq!(out.index().names(), vec![Some("when".to_string())]);
    assert_eq!(
        out.column("qty").unwrap().to_vec(),
        vec![Value::Int64(3), Value::Int64(4)]
    );
}

#[test]
fn test_invalid_frequency() {
    let s = minute_ticks(2);
    assert!(matches!(s.resample("0min"), Err(Error::InvalidFrequency(_))));
    assert!(matches!(s.resample("fortnight"), Err(Error::InvalidFrequency(_))));
    assert_eq!("2H".parse::<Frequency>().unwrap(), Frequency::Hour(2));
}

#[test]
fn test_frequency_too_wide_is_rejected() {
    let s = minute_ticks(3);
    assert!(matches!(
        s.resample("200000000min"),
        Err(Error::InvalidFrequency(_))
    ));
    let t = Table::from_series(vec![s]).unwrap();
    assert!(matches!(t.resample("4000000000H"), Err(Error::InvalidFrequency(_))));
}
