// Monitored circuit (device, circuit) domain model
use super::telemetry::Sample;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub type DeviceId = u32;
pub type CircuitId = u32;

/// Identity of one monitored test channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId {
    pub device_id: DeviceId,
    pub circuit_id: CircuitId,
}

impl EntityId {
    pub fn new(device_id: DeviceId, circuit_id: CircuitId) -> Self {
        Self {
            device_id,
            circuit_id,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.device_id, self.circuit_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitStatus {
    Idle,
    Rest,
    Charging,
    Discharging,
    Stopped,
    Paused,
    Running,
    Unknown,
}

impl CircuitStatus {
    /// Maps a firmware status code. Codes outside the table fall back to
    /// `Running` while the circuit is reporting, `Unknown` otherwise.
    pub fn from_code(code: Option<i64>, running: bool) -> Self {
        match code {
            Some(1) => CircuitStatus::Rest,
            Some(2) => CircuitStatus::Charging,
            Some(3) => CircuitStatus::Discharging,
            Some(4) => CircuitStatus::Stopped,
            Some(5) => CircuitStatus::Paused,
            _ if running => CircuitStatus::Running,
            _ => CircuitStatus::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CircuitStatus::Idle => "Idle",
            CircuitStatus::Rest => "Rest",
            CircuitStatus::Charging => "Charging",
            CircuitStatus::Discharging => "Discharging",
            CircuitStatus::Stopped => "Stop",
            CircuitStatus::Paused => "Paused",
            CircuitStatus::Running => "Running",
            CircuitStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub entity_id: EntityId,
    pub display_name: String,
    pub status: CircuitStatus,
    pub collecting: bool,
    pub battery_id: Option<String>,
    pub data_file: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub latest: Option<Sample>,
}

impl EntitySummary {
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            display_name: format!("Circuit {}", entity_id.circuit_id),
            status: CircuitStatus::Idle,
            collecting: false,
            battery_id: None,
            data_file: None,
            started_at: None,
            last_updated_at: None,
            latest: None,
        }
    }

    /// Applies every field the patch carries; absent fields keep their value.
    pub fn merge(&mut self, patch: SummaryPatch) {
        if let Some(name) = patch.display_name {
            self.display_name = name;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(collecting) = patch.collecting {
            self.collecting = collecting;
        }
        if patch.battery_id.is_some() {
            self.battery_id = patch.battery_id;
        }
        if patch.data_file.is_some() {
            self.data_file = patch.data_file;
        }
        if patch.started_at.is_some() {
            self.started_at = patch.started_at;
        }
        if patch.last_updated_at.is_some() {
            self.last_updated_at = patch.last_updated_at;
        }
        if patch.latest.is_some() {
            self.latest = patch.latest;
        }
    }
}

/// Partial update for an [`EntitySummary`].
#[derive(Debug, Clone, Default)]
pub struct SummaryPatch {
    pub display_name: Option<String>,
    pub status: Option<CircuitStatus>,
    pub collecting: Option<bool>,
    pub battery_id: Option<String>,
    pub data_file: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub latest: Option<Sample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_table() {
        assert_eq!(CircuitStatus::from_code(Some(1), true).label(), "Rest");
        assert_eq!(CircuitStatus::from_code(Some(2), true).label(), "Charging");
        assert_eq!(CircuitStatus::from_code(Some(3), false).label(), "Discharging");
        assert_eq!(CircuitStatus::from_code(Some(4), true).label(), "Stop");
        assert_eq!(CircuitStatus::from_code(Some(5), true).label(), "Paused");
    }

    #[test]
    fn test_unknown_code_falls_back_to_running() {
        assert_eq!(CircuitStatus::from_code(Some(9), true), CircuitStatus::Running);
        assert_eq!(CircuitStatus::from_code(None, true), CircuitStatus::Running);
        assert_eq!(CircuitStatus::from_code(Some(9), false), CircuitStatus::Unknown);
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut summary = EntitySummary::new(EntityId::new(2, 5));
        assert_eq!(summary.display_name, "Circuit 5");

        summary.merge(SummaryPatch {
            battery_id: Some("MK5AJKAPBB00601".to_string()),
            status: Some(CircuitStatus::Charging),
            ..Default::default()
        });
        summary.merge(SummaryPatch {
            collecting: Some(true),
            ..Default::default()
        });

        assert_eq!(summary.battery_id.as_deref(), Some("MK5AJKAPBB00601"));
        assert_eq!(summary.status, CircuitStatus::Charging);
        assert!(summary.collecting);
    }
}
