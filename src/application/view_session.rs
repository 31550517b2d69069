// View session - Single owner of the viewer's mutable state
use crate::application::entity_registry::EntityRegistry;
use crate::application::history_store::HistoryStore;
use crate::application::live_ingest::{extract_records, LiveDataMessage};
use crate::application::normalizer::{normalize, RawRecord};
use crate::application::rig_api::DeviceInfo;
use crate::domain::entity::{DeviceId, EntityId, SummaryPatch};
use crate::domain::telemetry::{MetricSpec, Sample};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

pub type SharedSession = Arc<Mutex<ViewSession>>;

/// Session state is consistent after every method, so a poisoned lock is
/// still safe to use.
pub fn lock_session(session: &SharedSession) -> MutexGuard<'_, ViewSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailTab {
    Chart,
    Table,
    Controls,
}

impl DetailTab {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "chart" | "liveChart" => Some(DetailTab::Chart),
            "table" | "liveTable" => Some(DetailTab::Table),
            "controls" => Some(DetailTab::Controls),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailView {
    pub entity: EntityId,
    pub tab: DetailTab,
    generation: u64,
}

/// Identifies the detail view a poll was issued for. Results carrying an
/// outdated ticket are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    pub entity: EntityId,
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Applied(usize),
    Stale,
}

/// Result of enumerating one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub entities: Vec<EntityId>,
    /// Detail view closed because its circuit was dropped.
    pub closed_detail: Option<EntityId>,
}

/// Mutations the view layer re-renders on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    EntityChanged { entity: EntityId },
    HistoryChanged { entity: EntityId },
    DetailClosed { entity: EntityId },
    SessionExpired,
}

#[derive(Debug)]
pub struct ViewSession {
    metrics: Vec<MetricSpec>,
    registry: EntityRegistry,
    history: HistoryStore,
    selected_device: Option<DeviceId>,
    detail: Option<DetailView>,
    generation: u64,
}

impl ViewSession {
    pub fn new(metrics: Vec<MetricSpec>, history_capacity: usize) -> Self {
        Self {
            metrics,
            registry: EntityRegistry::new(),
            history: HistoryStore::new(history_capacity),
            selected_device: None,
            detail: None,
            generation: 0,
        }
    }

    pub fn metrics(&self) -> &[MetricSpec] {
        &self.metrics
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn selected_device(&self) -> Option<DeviceId> {
        self.selected_device
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    /// Samples for the open detail view, or nothing when no view is open.
    pub fn detail_snapshot(&self) -> Option<(EntityId, Vec<Sample>)> {
        self.detail
            .map(|detail| (detail.entity, self.history.snapshot(&detail.entity)))
    }

    /// Creates summaries for every circuit of a listed device and drops
    /// circuits the device no longer reports. A detail view open on a
    /// dropped circuit is closed.
    pub fn discover_device(&mut self, device: &DeviceInfo, default_circuits: u32) -> Discovery {
        let count = device.circuit_count.unwrap_or(default_circuits);
        let retired: Vec<EntityId> = self
            .registry
            .for_device(device.device_id)
            .map(|s| s.entity_id)
            .filter(|id| id.circuit_id > count)
            .collect();

        let mut closed_detail = None;
        for entity in retired {
            if self.detail.is_some_and(|d| d.entity == entity) {
                closed_detail = self.close_detail();
            }
            self.registry.remove(&entity);
            self.history.clear(&entity);
            tracing::info!("Circuit {} is no longer reported", entity);
        }

        let entities = (1..=count)
            .map(|circuit| {
                let entity = EntityId::new(device.device_id, circuit);
                self.registry.upsert(entity, SummaryPatch::default());
                entity
            })
            .collect();
        Discovery {
            entities,
            closed_detail,
        }
    }

    /// Switching device discards all history and closes the detail view.
    /// Returns the entity whose detail view was closed.
    pub fn select_device(&mut self, device_id: DeviceId) -> Option<EntityId> {
        if self.selected_device == Some(device_id) {
            return None;
        }
        self.selected_device = Some(device_id);
        let closed = self.close_detail();
        self.history.clear_all();
        closed
    }

    /// Opens the detail view for `entity`, discarding the previous entity's
    /// history before anything can be appended for the new one.
    pub fn open_detail(&mut self, entity: EntityId) -> PollTicket {
        if let Some(previous) = self.detail.take() {
            if previous.entity != entity {
                self.history.clear(&previous.entity);
            }
        }
        self.generation += 1;
        self.detail = Some(DetailView {
            entity,
            tab: DetailTab::Chart,
            generation: self.generation,
        });
        PollTicket {
            entity,
            generation: self.generation,
        }
    }

    pub fn close_detail(&mut self) -> Option<EntityId> {
        let detail = self.detail.take()?;
        self.generation += 1;
        self.history.clear(&detail.entity);
        Some(detail.entity)
    }

    pub fn select_tab(&mut self, tab: DetailTab) -> bool {
        match self.detail.as_mut() {
            Some(detail) => {
                detail.tab = tab;
                true
            }
            None => false,
        }
    }

    pub fn is_current(&self, ticket: &PollTicket) -> bool {
        self.detail
            .is_some_and(|d| d.entity == ticket.entity && d.generation == ticket.generation)
    }

    /// Merges a history fetch into the store. Pushed samples newer than the
    /// fetched window are kept; an empty fetch leaves the store untouched.
    pub fn apply_poll(&mut self, ticket: &PollTicket, records: &[RawRecord]) -> PollOutcome {
        if !self.is_current(ticket) {
            return PollOutcome::Stale;
        }
        let mut samples: Vec<Sample> = records
            .iter()
            .map(|raw| normalize(raw, &self.metrics))
            .collect();
        // backends may answer newest-first
        samples.sort_by_key(|s| s.timestamp);
        let Some(newest_fetched) = samples.last().map(|s| s.timestamp) else {
            return PollOutcome::Applied(0);
        };
        let applied = samples.len();

        samples.extend(
            self.history
                .snapshot(&ticket.entity)
                .into_iter()
                .filter(|s| s.timestamp > newest_fetched),
        );
        let latest = samples.last().cloned();
        self.history.replace(ticket.entity, samples);

        if let Some(latest) = latest {
            self.refresh_latest(ticket.entity, latest);
        }
        PollOutcome::Applied(applied)
    }

    fn refresh_latest(&mut self, entity: EntityId, latest: Sample) {
        if !self.registry.contains(&entity) {
            return;
        }
        let is_newer = self
            .registry
            .get(&entity)
            .and_then(|s| s.last_updated_at)
            .is_none_or(|seen| latest.timestamp > seen);
        if is_newer {
            self.registry.upsert(
                entity,
                SummaryPatch {
                    last_updated_at: Some(latest.timestamp),
                    latest: Some(latest),
                    ..Default::default()
                },
            );
        }
    }

    /// Applies a push message in record order. Malformed records are logged
    /// and skipped.
    pub fn apply_live(
        &mut self,
        message: &LiveDataMessage,
        received_at: DateTime<Utc>,
    ) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let records = extract_records(message, &self.metrics, self.selected_device, received_at);

        for record in records {
            let mut record = match record {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Dropping live record: {}", e);
                    continue;
                }
            };

            let Some(summary) = self.registry.get(&record.entity) else {
                tracing::debug!("Skipping live record for undiscovered circuit {}", record.entity);
                continue;
            };
            if summary.started_at.is_none() && record.patch.started_at.is_none() {
                record.patch.started_at = Some(record.sample.timestamp);
            }

            self.history.append(record.entity, record.sample);
            self.registry.upsert(record.entity, record.patch);
            events.push(SessionEvent::EntityChanged {
                entity: record.entity,
            });
            if self.detail.is_some_and(|d| d.entity == record.entity) {
                events.push(SessionEvent::HistoryChanged {
                    entity: record.entity,
                });
            }
        }

        tracing::debug!(
            "Applied live_data message: {} circuits, {} events",
            message.circuits.len(),
            events.len()
        );
        events
    }
}
