// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::view_session::ViewSession;
use crate::infrastructure::config::load_viewer_config;
use crate::infrastructure::http_rig_api::HttpRigApi;
use crate::infrastructure::live_socket::run_live_socket;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    chart_svg, close_detail, detail_table, get_detail, health_check, list_cards, list_devices,
    open_detail, overview_svg, refresh_devices, select_device, select_tab, send_command,
    stream_events,
};
use crate::presentation::view_binder::ViewBinder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_viewer_config()?;

    // Backend adapter (infrastructure layer)
    let api = Arc::new(HttpRigApi::new(&config.backend)?);

    // Session and binder (application + presentation layers)
    let session = Arc::new(Mutex::new(ViewSession::new(
        config.metric_specs(),
        config.history.capacity,
    )));
    let (events, _) = broadcast::channel(256);
    let binder = Arc::new(ViewBinder::new(
        api,
        session,
        events,
        config.poller_config(),
        config.backend.default_circuit_count,
    ));

    if let Err(e) = binder.load_devices().await {
        tracing::warn!("Initial device enumeration failed: {}", e);
    }

    // Push channel; messages are applied one at a time in receipt order
    let (live_tx, mut live_rx) = mpsc::channel(100);
    tokio::spawn(run_live_socket(
        config.live.clone(),
        config.backend.token.clone(),
        live_tx,
    ));
    let live_binder = binder.clone();
    tokio::spawn(async move {
        while let Some(message) = live_rx.recv().await {
            live_binder.apply_live(&message);
        }
    });

    let state = Arc::new(AppState { binder });

    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/devices", get(list_devices))
        .route("/devices/refresh", post(refresh_devices))
        .route("/devices/:device_id/select", post(select_device))
        .route("/cards", get(list_cards))
        .route("/detail", get(get_detail).delete(close_detail))
        .route("/detail/open/:device_id/:circuit_id", post(open_detail))
        .route("/detail/tab/:tab", post(select_tab))
        .route("/detail/charts/:metric", get(chart_svg))
        .route("/detail/overview", get(overview_svg))
        .route("/detail/table", get(detail_table))
        .route("/detail/commands/:action", post(send_command))
        .route("/events", get(stream_events))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting rig-telemetry-viewer on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}
