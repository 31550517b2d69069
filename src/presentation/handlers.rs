// HTTP request handlers
use crate::application::rig_api::{ApiError, CircuitCommand};
use crate::application::view_session::DetailTab;
use crate::domain::entity::{CircuitId, DeviceId, EntityId};
use crate::presentation::app_state::AppState;
use crate::presentation::view_binder::ViewError;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;

impl IntoResponse for ViewError {
    fn into_response(self) -> Response {
        let status = match &self {
            ViewError::NoDetail => StatusCode::CONFLICT,
            ViewError::UnknownEntity(_) | ViewError::UnknownMetric(_) => StatusCode::NOT_FOUND,
            ViewError::Api(ApiError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ViewError::Api(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn svg_response(svg: String) -> Response {
    ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response()
}

fn not_found(what: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": format!("unknown {}", what) }))).into_response()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn list_devices(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "devices": state.binder.devices(),
        "selected": state.binder.selected_device(),
    }))
}

/// Re-enumerate devices from the backend
pub async fn refresh_devices(State(state): State<Arc<AppState>>) -> Result<Response, ViewError> {
    let devices = state.binder.load_devices().await?;
    Ok(Json(devices).into_response())
}

pub async fn select_device(
    Path(device_id): Path<DeviceId>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    state.binder.select_device(device_id);
    Json(state.binder.cards())
}

pub async fn list_cards(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.binder.cards())
}

pub async fn open_detail(
    Path((device_id, circuit_id)): Path<(DeviceId, CircuitId)>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ViewError> {
    let panel = state.binder.open_detail(EntityId::new(device_id, circuit_id))?;
    Ok(Json(panel).into_response())
}

pub async fn close_detail(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.binder.close_detail() {
        Some(entity) => Json(json!({ "closed": entity })).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn get_detail(State(state): State<Arc<AppState>>) -> Result<Response, ViewError> {
    Ok(Json(state.binder.detail_panel()?).into_response())
}

pub async fn select_tab(
    Path(tab): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ViewError> {
    let Some(tab) = DetailTab::from_name(&tab) else {
        return Ok(not_found("tab"));
    };
    Ok(Json(state.binder.select_tab(tab)?).into_response())
}

pub async fn chart_svg(
    Path(metric): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ViewError> {
    Ok(svg_response(state.binder.render_chart(&metric)?))
}

pub async fn overview_svg(State(state): State<Arc<AppState>>) -> Result<Response, ViewError> {
    Ok(svg_response(state.binder.render_overview()?))
}

pub async fn detail_table(State(state): State<Arc<AppState>>) -> Result<Response, ViewError> {
    Ok(Json(state.binder.table()?).into_response())
}

pub async fn send_command(
    Path(action): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ViewError> {
    let Some(command) = CircuitCommand::from_action(&action) else {
        return Ok(not_found("command"));
    };
    let reply = state.binder.dispatch(command).await?;
    Ok(Json(reply).into_response())
}

/// Server-sent stream of region updates
pub async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let binder = state.binder.clone();
    let stream = BroadcastStream::new(binder.subscribe()).filter_map(move |event| {
        let binder = binder.clone();
        async move {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::debug!("Event subscriber lagged: {}", e);
                    return None;
                }
            };
            let Some(update) = binder.to_update(event) else {
                return None;
            };
            match Event::default().event(update.name()).json_data(&update) {
                Ok(sse) => Some(Ok::<_, Infallible>(sse)),
                Err(e) => {
                    tracing::warn!("Failed to encode update: {}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
