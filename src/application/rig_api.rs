// Port for the rig backend's HTTP API
use crate::application::normalizer::RawRecord;
use crate::domain::entity::{DeviceId, EntityId};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    /// The session layer must log the operator out.
    #[error("unauthorized")]
    Unauthorized,
    #[error("backend responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected payload: {0}")]
    Payload(String),
}

/// A device as reported by the device listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub device_id: DeviceId,
    pub name: Option<String>,
    pub circuit_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

impl CircuitCommand {
    pub const ALL: [CircuitCommand; 4] = [
        CircuitCommand::Start,
        CircuitCommand::Pause,
        CircuitCommand::Resume,
        CircuitCommand::Stop,
    ];

    /// Accepts the action names used by the dashboard menu as aliases.
    pub fn from_action(action: &str) -> Option<Self> {
        match action.to_ascii_lowercase().as_str() {
            "start" | "collect" => Some(CircuitCommand::Start),
            "pause" => Some(CircuitCommand::Pause),
            "resume" | "continue" => Some(CircuitCommand::Resume),
            "stop" => Some(CircuitCommand::Stop),
            _ => None,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            CircuitCommand::Start => "/api/DBCUpload/create-db-files",
            CircuitCommand::Pause => "/api/command/pause",
            CircuitCommand::Resume => "/api/command/continue",
            CircuitCommand::Stop => "/api/command/stop",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CircuitCommand::Start => "Start Collect",
            CircuitCommand::Pause => "Pause",
            CircuitCommand::Resume => "Continue",
            CircuitCommand::Stop => "Stop",
        }
    }
}

#[async_trait]
pub trait RigApi: Send + Sync {
    /// List registered devices
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, ApiError>;

    /// Fetch at most `limit` recent raw records for one circuit, oldest first
    async fn fetch_history(&self, entity: EntityId, limit: usize) -> Result<Vec<RawRecord>, ApiError>;

    /// Dispatch a control command; returns the backend's response body
    async fn send_command(
        &self,
        command: CircuitCommand,
        entity: EntityId,
    ) -> Result<serde_json::Value, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_aliases() {
        assert_eq!(CircuitCommand::from_action("collect"), Some(CircuitCommand::Start));
        assert_eq!(CircuitCommand::from_action("Continue"), Some(CircuitCommand::Resume));
        assert_eq!(CircuitCommand::from_action("stop"), Some(CircuitCommand::Stop));
        assert_eq!(CircuitCommand::from_action("reboot"), None);
        assert_eq!(CircuitCommand::Resume.endpoint(), "/api/command/continue");
    }
}
