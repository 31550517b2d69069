// View binder - Owns the view session lifecycle and renders visible regions
use crate::application::live_ingest::LiveDataMessage;
use crate::application::poller::{PollerConfig, PollerHandle};
use crate::application::rig_api::{ApiError, CircuitCommand, DeviceInfo, RigApi};
use crate::application::view_session::{
    lock_session, DetailTab, Discovery, SessionEvent, SharedSession,
};
use crate::domain::entity::{CircuitStatus, DeviceId, EntityId, EntitySummary};
use crate::domain::telemetry::{Metric, MetricSpec, Sample};
use crate::presentation::chart_renderer;
use crate::presentation::svg_surface::SvgSurface;
use crate::presentation::table::{render_table, TableView};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

const CHART_WIDTH: f64 = 640.0;
const CHART_HEIGHT: f64 = 260.0;
const OVERVIEW_WIDTH: f64 = 420.0;
const OVERVIEW_HEIGHT: f64 = 240.0;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("no detail view is open")]
    NoDetail,
    #[error("unknown circuit {0}")]
    UnknownEntity(EntityId),
    #[error("unknown metric {0}")]
    UnknownMetric(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricValue {
    pub key: &'static str,
    pub label: String,
    pub value: String,
}

/// Gallery card for one circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardView {
    pub entity: EntityId,
    pub id: String,
    pub display_name: String,
    pub status: &'static str,
    pub status_class: &'static str,
    pub collect: &'static str,
    pub battery_id: String,
    pub metrics: Vec<MetricValue>,
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailPanel {
    pub entity: EntityId,
    pub display_name: String,
    pub run_status: &'static str,
    pub collect_status: &'static str,
    pub battery_id: String,
    pub data_file: String,
    pub started_at: Option<String>,
    pub tab: DetailTab,
    pub sample_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartLink {
    pub metric: &'static str,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlAction {
    pub action: CircuitCommand,
    pub label: &'static str,
}

/// Content refreshed when a tab is activated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tab", rename_all = "lowercase")]
pub enum TabPanel {
    Chart { charts: Vec<ChartLink> },
    Table { table: TableView },
    Controls { entity: EntityId, actions: Vec<ControlAction> },
}

/// Region re-render pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewUpdate {
    Card(CardView),
    Detail { entity: EntityId, tab: DetailTab },
    DetailClosed { entity: EntityId },
    SessionExpired,
}

impl ViewUpdate {
    pub fn name(&self) -> &'static str {
        match self {
            ViewUpdate::Card(_) => "card",
            ViewUpdate::Detail { .. } => "detail",
            ViewUpdate::DetailClosed { .. } => "detail_closed",
            ViewUpdate::SessionExpired => "session_expired",
        }
    }
}

pub struct ViewBinder {
    api: Arc<dyn RigApi>,
    session: SharedSession,
    poller: Mutex<Option<PollerHandle>>,
    poller_config: PollerConfig,
    default_circuit_count: u32,
    devices: Mutex<Vec<DeviceInfo>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ViewBinder {
    pub fn new(
        api: Arc<dyn RigApi>,
        session: SharedSession,
        events: broadcast::Sender<SessionEvent>,
        poller_config: PollerConfig,
        default_circuit_count: u32,
    ) -> Self {
        Self {
            api,
            session,
            poller: Mutex::new(None),
            poller_config,
            default_circuit_count,
            devices: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Enumerates devices and their circuits; the first device is selected
    /// when nothing is selected yet.
    pub async fn load_devices(&self) -> Result<Vec<DeviceInfo>, ViewError> {
        let devices = self.api.list_devices().await?;
        tracing::info!("Loaded {} devices", devices.len());
        *self.devices.lock().unwrap_or_else(|p| p.into_inner()) = devices.clone();

        let discoveries: Vec<Discovery> = {
            let mut slot = self.poller.lock().unwrap_or_else(|p| p.into_inner());
            let mut session = lock_session(&self.session);
            let discoveries: Vec<Discovery> = devices
                .iter()
                .map(|device| session.discover_device(device, self.default_circuit_count))
                .collect();
            if discoveries.iter().any(|d| d.closed_detail.is_some()) {
                if let Some(poller) = slot.take() {
                    poller.stop();
                }
            }
            discoveries
        };
        for discovery in discoveries {
            if let Some(entity) = discovery.closed_detail {
                self.publish(SessionEvent::DetailClosed { entity });
            }
            for entity in discovery.entities {
                self.publish(SessionEvent::EntityChanged { entity });
            }
        }

        let needs_selection = lock_session(&self.session).selected_device().is_none();
        if needs_selection {
            if let Some(first) = devices.first() {
                self.select_device(first.device_id);
            }
        }
        Ok(devices)
    }

    /// Devices seen by the last successful enumeration.
    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn selected_device(&self) -> Option<DeviceId> {
        lock_session(&self.session).selected_device()
    }

    pub fn select_device(&self, device_id: DeviceId) {
        let mut slot = self.poller.lock().unwrap_or_else(|p| p.into_inner());
        let closed = lock_session(&self.session).select_device(device_id);
        tracing::info!("Selected device {}", device_id);
        if let Some(entity) = closed {
            if let Some(poller) = slot.take() {
                poller.stop();
            }
            self.publish(SessionEvent::DetailClosed { entity });
        }
    }

    /// Stops any running poller before the new view's poller starts, so at
    /// most one timer exists.
    pub fn open_detail(&self, entity: EntityId) -> Result<DetailPanel, ViewError> {
        let mut slot = self.poller.lock().unwrap_or_else(|p| p.into_inner());
        if !lock_session(&self.session).registry().contains(&entity) {
            return Err(ViewError::UnknownEntity(entity));
        }
        if let Some(previous) = slot.take() {
            previous.stop();
        }

        let (previous, ticket) = {
            let mut session = lock_session(&self.session);
            let previous = session.detail().map(|d| d.entity);
            (previous, session.open_detail(entity))
        };
        if let Some(previous) = previous.filter(|p| *p != entity) {
            self.publish(SessionEvent::DetailClosed { entity: previous });
        }

        *slot = Some(PollerHandle::spawn(
            self.api.clone(),
            self.session.clone(),
            self.events.clone(),
            ticket,
            self.poller_config,
        ));
        drop(slot);
        self.detail_panel()
    }

    pub fn close_detail(&self) -> Option<EntityId> {
        let mut slot = self.poller.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(poller) = slot.take() {
            poller.stop();
        }
        let closed = lock_session(&self.session).close_detail();
        if let Some(entity) = closed {
            tracing::info!("Closed detail view for {}", entity);
            self.publish(SessionEvent::DetailClosed { entity });
        }
        closed
    }

    pub fn active_poller(&self) -> Option<EntityId> {
        self.poller
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .filter(|p| !p.is_finished())
            .map(PollerHandle::entity)
    }

    /// Applies one push message in receipt order and notifies subscribers.
    pub fn apply_live(&self, message: &LiveDataMessage) {
        let events = lock_session(&self.session).apply_live(message, Utc::now());
        for event in events {
            self.publish(event);
        }
    }

    pub fn cards(&self) -> Vec<CardView> {
        let session = lock_session(&self.session);
        let specs = session.metrics();
        match session.selected_device() {
            Some(device) => session
                .registry()
                .for_device(device)
                .map(|s| card_view(s, specs))
                .collect(),
            None => session.registry().iter().map(|s| card_view(s, specs)).collect(),
        }
    }

    pub fn card(&self, entity: &EntityId) -> Option<CardView> {
        let session = lock_session(&self.session);
        session
            .registry()
            .get(entity)
            .map(|s| card_view(s, session.metrics()))
    }

    pub fn detail_panel(&self) -> Result<DetailPanel, ViewError> {
        let session = lock_session(&self.session);
        let detail = session.detail().ok_or(ViewError::NoDetail)?;
        let summary = session
            .registry()
            .get(&detail.entity)
            .ok_or(ViewError::UnknownEntity(detail.entity))?;

        Ok(DetailPanel {
            entity: detail.entity,
            display_name: summary.display_name.clone(),
            run_status: summary.status.label(),
            collect_status: if summary.collecting { "Started" } else { "Stopped" },
            battery_id: battery_label(summary),
            data_file: summary.data_file.clone().unwrap_or_else(|| "--".to_string()),
            started_at: summary
                .started_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            tab: detail.tab,
            sample_count: session.history().len(&detail.entity),
        })
    }

    /// Activates a tab and returns that tab's refreshed content.
    pub fn select_tab(&self, tab: DetailTab) -> Result<TabPanel, ViewError> {
        if !lock_session(&self.session).select_tab(tab) {
            return Err(ViewError::NoDetail);
        }
        match tab {
            DetailTab::Chart => {
                let session = lock_session(&self.session);
                let charts = session
                    .metrics()
                    .iter()
                    .map(|spec| ChartLink {
                        metric: spec.key.key(),
                        title: spec.title(),
                        url: format!("/detail/charts/{}", spec.key.key()),
                    })
                    .collect();
                Ok(TabPanel::Chart { charts })
            }
            DetailTab::Table => Ok(TabPanel::Table {
                table: self.table()?,
            }),
            DetailTab::Controls => {
                let entity = self.detail_entity()?;
                let actions = CircuitCommand::ALL
                    .into_iter()
                    .map(|action| ControlAction {
                        action,
                        label: action.label(),
                    })
                    .collect();
                Ok(TabPanel::Controls { entity, actions })
            }
        }
    }

    fn detail_entity(&self) -> Result<EntityId, ViewError> {
        lock_session(&self.session)
            .detail()
            .map(|d| d.entity)
            .ok_or(ViewError::NoDetail)
    }

    /// Snapshot and metric specs for the open view, taken under one lock.
    fn detail_data(&self) -> Result<(Vec<MetricSpec>, Vec<Sample>), ViewError> {
        let session = lock_session(&self.session);
        let (_, samples) = session.detail_snapshot().ok_or(ViewError::NoDetail)?;
        Ok((session.metrics().to_vec(), samples))
    }

    pub fn render_chart(&self, metric: &str) -> Result<String, ViewError> {
        let (specs, samples) = self.detail_data()?;
        let spec = Metric::from_key(metric)
            .and_then(|key| specs.iter().find(|s| s.key == key))
            .ok_or_else(|| ViewError::UnknownMetric(metric.to_string()))?;

        let mut surface = SvgSurface::new(CHART_WIDTH, CHART_HEIGHT);
        chart_renderer::render(&mut surface, spec, &samples);
        Ok(surface.finish())
    }

    pub fn render_overview(&self) -> Result<String, ViewError> {
        let (specs, samples) = self.detail_data()?;
        let mut surface = SvgSurface::new(OVERVIEW_WIDTH, OVERVIEW_HEIGHT);
        chart_renderer::render_overview(&mut surface, &specs, &samples);
        Ok(surface.finish())
    }

    pub fn table(&self) -> Result<TableView, ViewError> {
        let (specs, samples) = self.detail_data()?;
        Ok(render_table(&specs, &samples))
    }

    pub async fn dispatch(&self, command: CircuitCommand) -> Result<serde_json::Value, ViewError> {
        let entity = self.detail_entity()?;
        tracing::info!("Dispatching {:?} to {}", command, entity);
        Ok(self.api.send_command(command, entity).await?)
    }

    /// Turns a session mutation into the region that needs re-rendering.
    pub fn to_update(&self, event: SessionEvent) -> Option<ViewUpdate> {
        match event {
            SessionEvent::EntityChanged { entity } => self.card(&entity).map(ViewUpdate::Card),
            SessionEvent::HistoryChanged { entity } => {
                let session = lock_session(&self.session);
                session
                    .detail()
                    .filter(|d| d.entity == entity)
                    .map(|d| ViewUpdate::Detail {
                        entity,
                        tab: d.tab,
                    })
            }
            SessionEvent::DetailClosed { entity } => Some(ViewUpdate::DetailClosed { entity }),
            SessionEvent::SessionExpired => Some(ViewUpdate::SessionExpired),
        }
    }
}

fn battery_label(summary: &EntitySummary) -> String {
    summary
        .battery_id
        .clone()
        .unwrap_or_else(|| "Unknown".to_string())
}

fn status_class(status: CircuitStatus) -> &'static str {
    match status {
        CircuitStatus::Running | CircuitStatus::Charging | CircuitStatus::Discharging => "running",
        CircuitStatus::Paused => "paused",
        CircuitStatus::Idle | CircuitStatus::Rest | CircuitStatus::Stopped => "stopped",
        CircuitStatus::Unknown => "unknown",
    }
}

fn card_view(summary: &EntitySummary, specs: &[MetricSpec]) -> CardView {
    let metrics = specs
        .iter()
        .map(|spec| MetricValue {
            key: spec.key.key(),
            label: spec.label.clone(),
            value: spec.format_value(summary.latest.as_ref().and_then(|s| s.value(spec.key))),
        })
        .collect();

    CardView {
        entity: summary.entity_id,
        id: summary.entity_id.to_string(),
        display_name: summary.display_name.clone(),
        status: summary.status.label(),
        status_class: status_class(summary.status),
        collect: if summary.collecting {
            "Collect: Started"
        } else {
            "Collect: Stopped"
        },
        battery_id: battery_label(summary),
        metrics,
        last_updated: summary
            .last_updated_at
            .map(|t| t.format("%H:%M:%S").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::normalizer::RawRecord;
    use crate::application::view_session::ViewSession;
    use crate::domain::telemetry::default_metric_specs;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRig {
        commands: Mutex<Vec<(CircuitCommand, EntityId)>>,
        rack_a_circuits: Mutex<Option<u32>>,
    }

    #[async_trait]
    impl RigApi for FakeRig {
        async fn list_devices(&self) -> Result<Vec<DeviceInfo>, ApiError> {
            Ok(vec![
                DeviceInfo {
                    device_id: 2,
                    name: None,
                    circuit_count: *self.rack_a_circuits.lock().unwrap(),
                },
                DeviceInfo {
                    device_id: 3,
                    name: Some("Rack B".to_string()),
                    circuit_count: Some(4),
                },
            ])
        }

        async fn fetch_history(
            &self,
            _entity: EntityId,
            _limit: usize,
        ) -> Result<Vec<RawRecord>, ApiError> {
            Ok(Vec::new())
        }

        async fn send_command(
            &self,
            command: CircuitCommand,
            entity: EntityId,
        ) -> Result<serde_json::Value, ApiError> {
            self.commands.lock().unwrap().push((command, entity));
            Ok(json!({"ok": true}))
        }
    }

    fn binder() -> (ViewBinder, Arc<FakeRig>) {
        let rig = Arc::new(FakeRig::default());
        let session = Arc::new(Mutex::new(ViewSession::new(default_metric_specs(), 50)));
        let (events, _) = broadcast::channel(64);
        let config = PollerConfig {
            interval: Duration::from_millis(20),
            history_limit: 50,
        };
        (ViewBinder::new(rig.clone(), session, events, config, 16), rig)
    }

    fn live(value: serde_json::Value) -> LiveDataMessage {
        LiveDataMessage::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_load_devices_selects_first() {
        let (binder, _) = binder();
        let devices = binder.load_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(binder.devices(), devices);
        assert_eq!(binder.selected_device(), Some(2));

        let cards = binder.cards();
        assert_eq!(cards.len(), 16);
        assert!(cards.iter().all(|c| c.entity.device_id == 2));
        assert_eq!(cards[0].collect, "Collect: Stopped");
        assert_eq!(cards[0].battery_id, "Unknown");
        assert!(cards[0].metrics.iter().all(|m| m.value == "--"));
    }

    #[tokio::test]
    async fn test_live_data_updates_card() {
        let (binder, _) = binder();
        binder.load_devices().await.unwrap();
        let mut updates = binder.subscribe();

        binder.apply_live(&live(json!({"circuits": [
            {"circuit_id": 5, "MaxTemp": 42.5, "PackVol": 12.5, "status": 3, "battery_id": "MK5AJKAPBB00601"}
        ]})));

        let event = updates.recv().await.unwrap();
        let Some(ViewUpdate::Card(card)) = binder.to_update(event) else {
            panic!("expected a card update");
        };
        assert_eq!(card.id, "2-5");
        assert_eq!(card.status, "Discharging");
        assert_eq!(card.status_class, "running");
        assert_eq!(card.collect, "Collect: Started");
        assert_eq!(card.battery_id, "MK5AJKAPBB00601");
        assert_eq!(card.metrics[0].value, "42.5 °C");
        assert_eq!(card.metrics[1].value, "12.50 V");
    }

    #[tokio::test]
    async fn test_single_active_poller() {
        let (binder, _) = binder();
        binder.load_devices().await.unwrap();

        binder.open_detail(EntityId::new(2, 5)).unwrap();
        assert_eq!(binder.active_poller(), Some(EntityId::new(2, 5)));

        let panel = binder.open_detail(EntityId::new(2, 6)).unwrap();
        assert_eq!(panel.entity, EntityId::new(2, 6));
        assert_eq!(panel.tab, DetailTab::Chart);
        assert_eq!(binder.active_poller(), Some(EntityId::new(2, 6)));

        assert_eq!(binder.close_detail(), Some(EntityId::new(2, 6)));
        assert_eq!(binder.active_poller(), None);
        assert!(matches!(binder.render_chart("voltage"), Err(ViewError::NoDetail)));
        assert_eq!(binder.close_detail(), None);
    }

    #[tokio::test]
    async fn test_open_unknown_entity_is_rejected() {
        let (binder, _) = binder();
        binder.load_devices().await.unwrap();
        assert!(matches!(
            binder.open_detail(EntityId::new(9, 1)),
            Err(ViewError::UnknownEntity(_))
        ));
        assert_eq!(binder.active_poller(), None);
    }

    #[tokio::test]
    async fn test_tabs_and_rendering() {
        let (binder, _) = binder();
        binder.load_devices().await.unwrap();
        binder.open_detail(EntityId::new(2, 5)).unwrap();
        binder.apply_live(&live(json!({"circuits": [
            {"circuit_id": 5, "timestamp": "2026-01-01T10:00:00", "voltage": 12.1, "file_name": "RealTimeData_2_5.db"},
            {"circuit_id": 5, "timestamp": "2026-01-01T10:00:01", "voltage": 12.3}
        ]})));

        match binder.select_tab(DetailTab::Table).unwrap() {
            TabPanel::Table { table } => {
                assert_eq!(table.rows.len(), 2);
                assert_eq!(table.rows[0].cells[1], "12.30 V");
            }
            other => panic!("unexpected panel: {:?}", other),
        }
        match binder.select_tab(DetailTab::Controls).unwrap() {
            TabPanel::Controls { entity, actions } => {
                assert_eq!(entity, EntityId::new(2, 5));
                assert_eq!(actions.len(), 4);
            }
            other => panic!("unexpected panel: {:?}", other),
        }
        match binder.select_tab(DetailTab::Chart).unwrap() {
            TabPanel::Chart { charts } => assert_eq!(charts[1].url, "/detail/charts/voltage"),
            other => panic!("unexpected panel: {:?}", other),
        }

        let panel = binder.detail_panel().unwrap();
        assert_eq!(panel.data_file, "RealTimeData_2_5.db");
        assert_eq!(panel.sample_count, 2);

        let svg = binder.render_chart("voltage").unwrap();
        assert!(svg.contains("<polyline"));
        assert!(!binder.render_chart("current").unwrap().contains("<polyline"));
        assert!(matches!(binder.render_chart("humidity"), Err(ViewError::UnknownMetric(_))));
        assert!(binder.render_overview().unwrap().contains("12.30 V"));

        binder.close_detail();
    }

    #[tokio::test]
    async fn test_dispatch_targets_open_detail() {
        let (binder, rig) = binder();
        binder.load_devices().await.unwrap();
        assert!(matches!(
            binder.dispatch(CircuitCommand::Pause).await,
            Err(ViewError::NoDetail)
        ));

        binder.open_detail(EntityId::new(2, 3)).unwrap();
        binder.dispatch(CircuitCommand::Pause).await.unwrap();
        assert_eq!(
            rig.commands.lock().unwrap().as_slice(),
            &[(CircuitCommand::Pause, EntityId::new(2, 3))]
        );
        binder.close_detail();
    }

    #[tokio::test]
    async fn test_device_switch_closes_detail() {
        let (binder, _) = binder();
        binder.load_devices().await.unwrap();
        binder.open_detail(EntityId::new(2, 1)).unwrap();
        let mut updates = binder.subscribe();

        binder.select_device(3);

        assert_eq!(binder.active_poller(), None);
        assert_eq!(
            updates.recv().await.unwrap(),
            SessionEvent::DetailClosed {
                entity: EntityId::new(2, 1)
            }
        );
        assert_eq!(binder.cards().len(), 4);
    }

    #[tokio::test]
    async fn test_dropped_circuit_stops_poller() {
        let (binder, rig) = binder();
        binder.load_devices().await.unwrap();
        binder.open_detail(EntityId::new(2, 12)).unwrap();
        assert_eq!(binder.active_poller(), Some(EntityId::new(2, 12)));

        *rig.rack_a_circuits.lock().unwrap() = Some(4);
        let mut updates = binder.subscribe();
        binder.load_devices().await.unwrap();

        assert_eq!(binder.active_poller(), None);
        assert!(matches!(binder.detail_panel(), Err(ViewError::NoDetail)));
        assert_eq!(
            updates.recv().await.unwrap(),
            SessionEvent::DetailClosed {
                entity: EntityId::new(2, 12)
            }
        );
        assert_eq!(binder.cards().len(), 4);
        assert!(binder.card(&EntityId::new(2, 12)).is_none());
    }
}
