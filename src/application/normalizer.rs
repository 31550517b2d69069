// Field normalizer - Maps loosely-typed report records onto canonical samples
use crate::domain::telemetry::{MetricSpec, Sample};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

/// A record as delivered by the push channel or the history endpoint.
pub type RawRecord = Map<String, Value>;

pub const TIMESTAMP_KEYS: &[&str] = &["timestamp", "time", "ts"];
pub const STATUS_KEYS: &[&str] = &["status_code", "statusCode", "status"];
pub const RUNNING_KEYS: &[&str] = &["running"];
pub const BATTERY_ID_KEYS: &[&str] = &["battery_id", "batteryId", "BatteryId"];
pub const START_TIME_KEYS: &[&str] = &["start_time", "startTime", "started_at"];
pub const DATA_FILE_KEYS: &[&str] = &["file_name", "fileName"];
pub const DEVICE_ID_KEYS: &[&str] = &["device_id", "deviceId", "DeviceId"];
pub const CIRCUIT_ID_KEYS: &[&str] = &["circuit_id", "circuitId", "circuitNo"];

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

/// First key in priority order that is present and not null.
pub fn lookup<'a, K: AsRef<str>>(raw: &'a RawRecord, keys: &[K]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(k.as_ref()))
        .find(|v| !v.is_null())
}

/// Numeric coercion that never fails: anything non-numeric is missing.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

pub fn coerce_integer(value: &Value) -> Option<i64> {
    let number = coerce_number(value)?;
    (number.fract() == 0.0).then_some(number as i64)
}

pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Accepts RFC 3339, naive ISO-8601 / `YYYY-MM-DD HH:MM:SS` (taken as UTC),
/// or epoch seconds / milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let epoch = n.as_f64()?;
            let millis = if epoch.abs() > EPOCH_MILLIS_THRESHOLD {
                epoch
            } else {
                epoch * 1000.0
            };
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(time) = DateTime::parse_from_rfc3339(s) {
                return Some(time.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

/// Normalizes with the ingestion wall clock as the timestamp fallback.
pub fn normalize(raw: &RawRecord, specs: &[MetricSpec]) -> Sample {
    normalize_at(raw, specs, Utc::now())
}

pub fn normalize_at(raw: &RawRecord, specs: &[MetricSpec], fallback: DateTime<Utc>) -> Sample {
    let timestamp = lookup(raw, TIMESTAMP_KEYS)
        .and_then(parse_timestamp)
        .unwrap_or(fallback);

    let mut sample = Sample::empty(timestamp);
    for spec in specs {
        let value = lookup(raw, &spec.candidate_source_keys).and_then(coerce_number);
        sample.set(spec.key, value);
    }
    sample.status_code = lookup(raw, STATUS_KEYS).and_then(coerce_integer);
    sample
}
