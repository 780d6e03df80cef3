use std::env;

use tabrs::config::EngineConfig;
use tabrs::error::Error;
use tabrs::{AggFunc, GroupKey, Series, Value};

#[test]
fn test_builders() {
    let config = EngineConfig::new()
        .with_parallel_group_threshold(4)
        .with_max_threads(0)
        .with_parallel_columns(false);
    assert_eq!(config.parallel_group_threshold, 4);
    assert_eq!(config.max_threads, 1);
    assert!(!config.parallel_columns);
}

#[test]
fn test_from_toml() {
    let config = EngineConfig::from_toml_str(
        r#"
        parallel_group_threshold = 2
        max_threads = 3
        parallel_columns = false
        "#,
    )
    .unwrap();
    assert_eq!(
        config,
        EngineConfig::new()
            .with_parallel_group_threshold(2)
            .with_max_threads(3)
            .with_parallel_columns(false)
    );
    assert!(config.parallel_for(2));
    assert!(!config.parallel_for(1));
}

#[test]
fn test_env_overrides() {
    env::set_var("TABRS_MAX_THREADS", "2");
    env::set_var("TABRS_PARALLEL_THRESHOLD", "not a number");
    let config = EngineConfig::new()
        .with_parallel_group_threshold(7)
        .with_env_overrides();
    env::remove_var("TABRS_MAX_THREADS");
    env::remove_var("TABRS_PARALLEL_THRESHOLD");

    assert_eq!(config.max_threads, 2);
    assert_eq!(config.parallel_group_threshold, 7);
}

#[test]
fn test_parallel_groups_match_serial() {
    let n = 200i64;
    let values: Vec<i64> = (0..n).collect();
    let keys: Vec<i64> = (0..n).map(|i| i % 50).collect();
    let s = Series::from_values(values, Some("v".to_string())).unwrap();

    let serial = s
        .groupby(GroupKey::values(keys.clone()))
        .unwrap()
        .with_config(EngineConfig::new().with_max_threads(1))
        .sum()
        .unwrap();
    let parallel = s
        .groupby(GroupKey::values(keys))
        .unwrap()
        .with_config(
            EngineConfig::new()
                .with_max_threads(4)
                .with_parallel_group_threshold(1),
        )
        .sum()
        .unwrap();

    assert_eq!(serial, parallel);
    assert_eq!(serial.get(0), Value::Int64(50 + 100 + 150));
}

#[test]
fn test_parallel_groups_report_first_failing_group() {
    let values: Vec<i64> = (0..64).collect();
    let keys: Vec<i64> = (0..64).map(|i| i / 8).collect();
    let s = Series::from_values(values, None).unwrap();
    let picky = AggFunc::custom("picky", |c| {
        let first = c.get(0);
        match first {
            Value::Int64(v) if v == 24 || v == 48 => {
                Err(Error::Computation(format!("group starting at {}", v)))
            }
            other => Ok(other),
        }
    });

    for _ in 0..8 {
        let err = s
            .groupby(GroupKey::values(keys.clone()))
            .unwrap()
            .with_config(
                EngineConfig::new()
                    .with_max_threads(4)
                    .with_parallel_group_threshold(1),
            )
            .agg(&picky)
            .unwrap_err();
        match err {
            Error::Computation(msg) => assert_eq!(msg, "group starting at 24"),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
