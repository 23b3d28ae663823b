#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{NaiveDate, TimeZone, Utc};
use forecast_api::models::ForecastRecord;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

/// Every variable the configuration layer reads, cleared.
pub const CONFIG_VARS: &[&str] = &[
    "FORECAST_CONFIG",
    "REPOSITORY_TYPE",
    "LOCAL_DATA_PATH",
    "GOOGLE_CLOUD_PROJECT_ID",
    "BIGQUERY_DATASET_ID",
    "BIGQUERY_TABLE_ID",
    "GOOGLE_APPLICATION_CREDENTIALS",
    "GOOGLE_OAUTH_ACCESS_TOKEN",
    "BIGQUERY_LOCATION",
    "BIGQUERY_API_URL",
    "APP_NAME",
    "APP_VERSION",
    "DEBUG",
    "HOST",
    "PORT",
    "API_V1_PREFIX",
    "CORS_ORIGINS",
    "BQ_MAX_BYTES_BILLED",
    "BQ_USE_QUERY_CACHE",
    "BQ_MAX_DISTINCT_VALUES",
    "BQ_QUERY_TIMEOUT_SECS",
    "BQ_SLOW_QUERY_THRESHOLD_SECS",
];

/// Like [`with_scoped_env`], starting from a configuration-free environment.
pub fn with_clean_config_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let mut all: Vec<(&str, Option<&str>)> = CONFIG_VARS
        .iter()
        .filter(|var| !changes.iter().any(|(k, _)| *k == **var))
        .map(|var| (*var, None))
        .collect();
    all.extend_from_slice(changes);
    with_scoped_env(&all, f)
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Builder for test forecast records.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: ForecastRecord,
}

impl RecordBuilder {
    pub fn new(site_id: i64, product_id: &str, week: &str) -> Self {
        Self {
            record: ForecastRecord {
                forecast_datetime: Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap(),
                forecast_run_id: "run-2024-01".to_string(),
                site_id,
                brand: 100,
                mh_segment: "FOOD".to_string(),
                mh_family: "DAIRY".to_string(),
                mh_class: "MILK".to_string(),
                mh_brick: "WHOLE MILK".to_string(),
                product_id: product_id.to_string(),
                forecast_week: date(week),
                actual_qty: Some(10.0),
                predicted_qty: Some(12.0),
                model_used: "prophet".to_string(),
                qty_group: Some(1),
                forecast_week_number: Some(1),
                training_data_max_date: Some(date("2023-12-31")),
                forecast_horizon: Some(4),
            },
        }
    }

    pub fn brand(mut self, brand: i64) -> Self {
        self.record.brand = brand;
        self
    }

    pub fn segment(mut self, segment: &str) -> Self {
        self.record.mh_segment = segment.to_string();
        self
    }

    pub fn run(mut self, run_id: &str, generated: (i32, u32, u32)) -> Self {
        self.record.forecast_run_id = run_id.to_string();
        self.record.forecast_datetime = Utc
            .with_ymd_and_hms(generated.0, generated.1, generated.2, 6, 0, 0)
            .unwrap();
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.record.model_used = model.to_string();
        self
    }

    pub fn quantities(mut self, actual: Option<f64>, predicted: Option<f64>) -> Self {
        self.record.actual_qty = actual;
        self.record.predicted_qty = predicted;
        self
    }

    pub fn qty_group(mut self, group: Option<i64>) -> Self {
        self.record.qty_group = group;
        self
    }

    pub fn build(self) -> ForecastRecord {
        self.record
    }
}

/// A small data set spanning two runs, three sites, two segments and
/// January through February 2024.
pub fn sample_records() -> Vec<ForecastRecord> {
    vec![
        RecordBuilder::new(8013, "P-100", "2024-01-01").build(),
        RecordBuilder::new(8013, "P-200", "2024-01-08")
            .quantities(None, Some(7.5))
            .build(),
        RecordBuilder::new(8013, "P-100", "2024-01-15")
            .segment("NONFOOD")
            .brand(200)
            .qty_group(Some(3))
            .build(),
        RecordBuilder::new(8020, "P-100", "2024-01-22")
            .model("lgbm")
            .quantities(Some(4.0), Some(5.0))
            .build(),
        RecordBuilder::new(8020, "P-300", "2024-01-31")
            .segment("NONFOOD")
            .qty_group(None)
            .build(),
        RecordBuilder::new(8031, "P-300", "2024-02-05")
            .brand(300)
            .quantities(None, None)
            .build(),
        RecordBuilder::new(8013, "P-100", "2024-02-05")
            .run("run-2024-02", (2024, 2, 1))
            .quantities(None, Some(15.0))
            .build(),
        RecordBuilder::new(8020, "P-200", "2024-02-12")
            .run("run-2024-02", (2024, 2, 1))
            .model("lgbm")
            .quantities(None, Some(3.0))
            .build(),
    ]
}
