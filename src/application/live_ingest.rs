// Push-channel ingestion - Turns `live_data` payloads into per-circuit updates
use crate::application::normalizer::{
    coerce_bool, coerce_integer, coerce_string, lookup, normalize_at, parse_timestamp, RawRecord,
    BATTERY_ID_KEYS, CIRCUIT_ID_KEYS, DATA_FILE_KEYS, DEVICE_ID_KEYS, RUNNING_KEYS,
    START_TIME_KEYS,
};
use crate::domain::entity::{CircuitStatus, DeviceId, EntityId, SummaryPatch};
use crate::domain::telemetry::{MetricSpec, Sample};
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("live_data payload is not an object")]
    NotAnObject,
    #[error("live_data payload has a non-array `circuits` field")]
    InvalidCircuits,
    #[error("record {index} is not an object")]
    RecordNotAnObject { index: usize },
    #[error("record {index} has no usable circuit id")]
    MissingCircuit { index: usize },
    #[error("record {index} has no device id and no device is selected")]
    MissingDevice { index: usize },
}

/// One broadcast: `{ timestamp, circuits: [rawRecord, ...] }`.
#[derive(Debug, Clone)]
pub struct LiveDataMessage {
    pub timestamp: Option<DateTime<Utc>>,
    pub circuits: Vec<Value>,
}

impl LiveDataMessage {
    pub fn from_value(payload: Value) -> Result<Self, IngestError> {
        let Value::Object(mut map) = payload else {
            return Err(IngestError::NotAnObject);
        };
        let timestamp = map.get("timestamp").and_then(parse_timestamp);
        let circuits = match map.remove("circuits") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(circuits)) => circuits,
            Some(_) => return Err(IngestError::InvalidCircuits),
        };
        Ok(Self {
            timestamp,
            circuits,
        })
    }
}

/// Normalized reading plus the summary fields derivable from one record.
#[derive(Debug, Clone)]
pub struct LiveRecord {
    pub entity: EntityId,
    pub sample: Sample,
    pub patch: SummaryPatch,
}

/// Splits a message into independent per-record results so one malformed
/// record never affects the rest of the batch.
pub fn extract_records(
    message: &LiveDataMessage,
    specs: &[MetricSpec],
    selected_device: Option<DeviceId>,
    received_at: DateTime<Utc>,
) -> Vec<Result<LiveRecord, IngestError>> {
    let fallback = message.timestamp.unwrap_or(received_at);
    message
        .circuits
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let Value::Object(raw) = value else {
                return Err(IngestError::RecordNotAnObject { index });
            };
            let entity = entity_for(raw, selected_device, index)?;
            let sample = normalize_at(raw, specs, fallback);
            let patch = summary_patch(raw, &sample);
            Ok(LiveRecord {
                entity,
                sample,
                patch,
            })
        })
        .collect()
}

fn entity_for(
    raw: &RawRecord,
    selected_device: Option<DeviceId>,
    index: usize,
) -> Result<EntityId, IngestError> {
    let circuit_id = lookup(raw, CIRCUIT_ID_KEYS)
        .and_then(coerce_integer)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or(IngestError::MissingCircuit { index })?;
    let device_id = lookup(raw, DEVICE_ID_KEYS)
        .and_then(coerce_integer)
        .and_then(|id| u32::try_from(id).ok())
        .or(selected_device)
        .ok_or(IngestError::MissingDevice { index })?;
    Ok(EntityId::new(device_id, circuit_id))
}

/// A record on the push channel means the circuit is reporting, so it counts
/// as running unless it says otherwise.
fn summary_patch(raw: &RawRecord, sample: &Sample) -> SummaryPatch {
    let running = lookup(raw, RUNNING_KEYS).and_then(coerce_bool).unwrap_or(true);
    SummaryPatch {
        status: Some(CircuitStatus::from_code(sample.status_code, running)),
        collecting: Some(true),
        battery_id: lookup(raw, BATTERY_ID_KEYS).and_then(coerce_string),
        data_file: lookup(raw, DATA_FILE_KEYS).and_then(coerce_string),
        started_at: lookup(raw, START_TIME_KEYS).and_then(parse_timestamp),
        last_updated_at: Some(sample.timestamp),
        latest: Some(sample.clone()),
        ..Default::default()
    }
}
