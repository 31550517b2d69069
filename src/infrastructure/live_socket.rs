// Push-channel listener - socket.io over WebSocket, reconnecting forever
use crate::application::live_ingest::LiveDataMessage;
use crate::infrastructure::config::LiveSettings;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};

pub const LIVE_DATA_EVENT: &str = "live_data";

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// engine.io handshake; answered with a namespace connect
    Open,
    /// engine.io ping; answered with a pong
    Ping,
    Event { name: String, payload: Value },
    /// engine.io close; the server is going away
    Close,
    Ignored,
}

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("unrecognized frame: {0}")]
    Unrecognized(String),
    #[error("invalid event body: {0}")]
    InvalidEvent(String),
}

/// Decodes socket.io (`42["live_data", {...}]`) frames as well as plain
/// `{ "event": ..., "data": ... }` envelopes and bare `live_data` payloads.
pub fn decode_frame(text: &str) -> Result<Frame, FrameError> {
    let text = text.trim();
    if text.starts_with('{') {
        return decode_json_frame(text);
    }
    if let Some(rest) = text.strip_prefix("42") {
        return decode_socketio_event(rest);
    }
    match text {
        "1" => Ok(Frame::Close),
        "2" => Ok(Frame::Ping),
        "3" | "6" => Ok(Frame::Ignored),
        t if t.starts_with('0') => Ok(Frame::Open),
        t if t.starts_with("40") || t.starts_with("41") || t.starts_with("43") => Ok(Frame::Ignored),
        _ => Err(FrameError::Unrecognized(truncate(text))),
    }
}

fn decode_json_frame(text: &str) -> Result<Frame, FrameError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| FrameError::InvalidEvent(e.to_string()))?;
    let Value::Object(mut map) = value else {
        return Err(FrameError::InvalidEvent("expected an object".to_string()));
    };
    match map.remove("event") {
        Some(Value::String(name)) => Ok(Frame::Event {
            name,
            payload: unwrap_string_payload(map.remove("data").unwrap_or(Value::Null)),
        }),
        Some(_) => Err(FrameError::InvalidEvent("non-string event name".to_string())),
        None if map.contains_key("circuits") => Ok(Frame::Event {
            name: LIVE_DATA_EVENT.to_string(),
            payload: Value::Object(map),
        }),
        None => Ok(Frame::Ignored),
    }
}

fn decode_socketio_event(rest: &str) -> Result<Frame, FrameError> {
    // optional "/namespace," then optional ack id
    let rest = match rest.strip_prefix('/') {
        Some(namespaced) => namespaced
            .split_once(',')
            .map(|(_, body)| body)
            .ok_or_else(|| FrameError::InvalidEvent("unterminated namespace".to_string()))?,
        None => rest,
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit());

    let value: Value =
        serde_json::from_str(rest).map_err(|e| FrameError::InvalidEvent(e.to_string()))?;
    let Value::Array(mut items) = value else {
        return Err(FrameError::InvalidEvent("expected an array".to_string()));
    };
    if items.is_empty() {
        return Err(FrameError::InvalidEvent("empty event".to_string()));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(FrameError::InvalidEvent("non-string event name".to_string()));
    };
    let payload = items.into_iter().next().unwrap_or(Value::Null);
    Ok(Frame::Event {
        name,
        payload: unwrap_string_payload(payload),
    })
}

/// Some emitters send the payload JSON-encoded as a string.
fn unwrap_string_payload(payload: Value) -> Value {
    match payload {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(64).collect()
}

fn connect_url(settings: &LiveSettings, token: Option<&str>) -> String {
    match token {
        Some(token) if !token.is_empty() => {
            let separator = if settings.url.contains('?') { '&' } else { '?' };
            format!("{}{}token={}", settings.url, separator, urlencoding::encode(token))
        }
        _ => settings.url.clone(),
    }
}

/// Connects, forwards `live_data` messages in receipt order, and reconnects
/// after a delay on any disconnect. Returns once the receiver is dropped.
pub async fn run_live_socket(
    settings: LiveSettings,
    token: Option<String>,
    sender: mpsc::Sender<LiveDataMessage>,
) {
    let url = connect_url(&settings, token.as_deref());
    let delay = Duration::from_millis(settings.reconnect_delay_ms);

    loop {
        tracing::info!("Connecting to live data stream at {}", settings.url);
        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((ws, _)) => {
                tracing::info!("Connected to live data stream");
                match pump(ws, &sender).await {
                    Ok(()) => tracing::warn!("Live data stream closed"),
                    Err(e) => tracing::warn!("Live data stream error: {}", e),
                }
            }
            Err(e) => tracing::warn!("Live data connection error: {}", e),
        }

        if sender.is_closed() {
            break;
        }
        tokio::time::sleep(delay).await;
    }
}

async fn pump<S>(
    ws: tokio_tungstenite::WebSocketStream<S>,
    sender: &mpsc::Sender<LiveDataMessage>,
) -> Result<(), tungstenite::Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws.split();

    while let Some(msg) = read.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match decode_frame(&text) {
            Ok(Frame::Open) => write.send(Message::text("40")).await?,
            Ok(Frame::Ping) => write.send(Message::text("3")).await?,
            Ok(Frame::Close) => break,
            Ok(Frame::Event { name, payload }) if name == LIVE_DATA_EVENT => {
                match LiveDataMessage::from_value(payload) {
                    Ok(message) => {
                        if sender.send(message).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => tracing::warn!("Dropping malformed live_data message: {}", e),
                }
            }
            Ok(Frame::Event { name, .. }) => tracing::debug!("Ignoring event {}", name),
            Ok(Frame::Ignored) => {}
            Err(e) => tracing::warn!("Dropping frame: {}", e),
        }
    }
    Ok(())
}
