// HTTP implementation of the rig backend API
use crate::application::normalizer::{coerce_integer, coerce_string, lookup, RawRecord, DEVICE_ID_KEYS};
use crate::application::rig_api::{ApiError, CircuitCommand, DeviceInfo, RigApi};
use crate::domain::entity::EntityId;
use crate::infrastructure::config::{prepare_path, BackendSettings};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

const CIRCUIT_COUNT_KEYS: &[&str] = &["circuitCount", "circuit_count", "circuits"];
const DEVICE_NAME_KEYS: &[&str] = &["name", "deviceName"];

#[derive(Debug, Clone)]
pub struct HttpRigApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    devices_path: String,
    history_path: String,
}

#[derive(Debug, Deserialize)]
struct DeviceListResponse {
    #[serde(default)]
    devices: Vec<Value>,
}

/// `{ data: [...] }` on success, `{ error }` otherwise.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpRigApi {
    pub fn new(settings: &BackendSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.request_timeout_ms))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone().filter(|t| !t.is_empty()),
            devices_path: settings.devices_path.clone(),
            history_path: settings.history_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Accept", "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Payload(format!("invalid JSON body: {}", e)))
    }
}

#[async_trait]
impl RigApi for HttpRigApi {
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, ApiError> {
        let body = self.execute(self.client.get(self.url(&self.devices_path))).await?;
        parse_device_list(body)
    }

    async fn fetch_history(&self, entity: EntityId, limit: usize) -> Result<Vec<RawRecord>, ApiError> {
        let mut vars = HashMap::new();
        vars.insert("device".to_string(), entity.device_id.to_string());
        vars.insert("circuit".to_string(), entity.circuit_id.to_string());
        let path = prepare_path(&self.history_path, &vars);

        tracing::debug!("Fetching history for {} from {}", entity, path);
        let request = self.client.get(self.url(&path)).query(&[("limit", limit)]);
        let body = self.execute(request).await?;
        parse_history(body)
    }

    async fn send_command(&self, command: CircuitCommand, entity: EntityId) -> Result<Value, ApiError> {
        let payload = json!({
            "deviceId": entity.device_id,
            "circuitId": entity.circuit_id,
            "circuitNo": entity.circuit_id,
        });
        let request = self.client.post(self.url(command.endpoint())).json(&payload);
        let body = self.execute(request).await?;
        tracing::info!("[CMD] {} -> {}: {}", command.endpoint(), entity, body);
        Ok(body)
    }
}

fn parse_device_list(body: Value) -> Result<Vec<DeviceInfo>, ApiError> {
    let response: DeviceListResponse = serde_json::from_value(body)
        .map_err(|e| ApiError::Payload(format!("device list: {}", e)))?;

    let mut devices = Vec::new();
    for entry in response.devices {
        let Value::Object(raw) = entry else {
            tracing::warn!("Skipping non-object device entry");
            continue;
        };
        let device_id = lookup(&raw, DEVICE_ID_KEYS)
            .or_else(|| raw.get("id"))
            .and_then(coerce_integer)
            .and_then(|id| u32::try_from(id).ok());
        let Some(device_id) = device_id else {
            tracing::warn!("Skipping device entry without an id");
            continue;
        };
        devices.push(DeviceInfo {
            device_id,
            name: lookup(&raw, DEVICE_NAME_KEYS).and_then(coerce_string),
            circuit_count: lookup(&raw, CIRCUIT_COUNT_KEYS)
                .and_then(coerce_integer)
                .and_then(|n| u32::try_from(n).ok()),
        });
    }
    Ok(devices)
}

fn parse_history(body: Value) -> Result<Vec<RawRecord>, ApiError> {
    let response: HistoryResponse = serde_json::from_value(body)
        .map_err(|e| ApiError::Payload(format!("history: {}", e)))?;

    if let Some(error) = response.error {
        return Err(ApiError::Payload(error));
    }

    Ok(response
        .data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_list_shapes() {
        let body = json!({"devices": [
            {"deviceId": 2, "name": "Rack A", "circuitCount": 8},
            {"id": "5"},
            {"name": "no id"},
            "junk"
        ]});
        let devices = parse_device_list(body).unwrap();
        assert_eq!(
            devices,
            vec![
                DeviceInfo {
                    device_id: 2,
                    name: Some("Rack A".to_string()),
                    circuit_count: Some(8)
                },
                DeviceInfo {
                    device_id: 5,
                    name: None,
                    circuit_count: None
                },
            ]
        );
    }

    #[test]
    fn test_parse_history_data_and_error() {
        let records = parse_history(json!({"data": [{"voltage": 12.1}, 7, {"MaxTemp": 30}]})).unwrap();
        assert_eq!(records.len(), 2);

        match parse_history(json!({"error": "no db file for circuit"})) {
            Err(ApiError::Payload(msg)) => assert_eq!(msg, "no db file for circuit"),
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(parse_history(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_base_url_and_token_normalized() {
        let settings = BackendSettings {
            base_url: "http://rig.local:5001/".to_string(),
            token: Some(String::new()),
            ..Default::default()
        };
        let api = HttpRigApi::new(&settings).unwrap();
        assert_eq!(api.url("/api/devices"), "http://rig.local:5001/api/devices");
        assert!(api.token.is_none());
    }
}
