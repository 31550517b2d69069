// Poller - Periodic history fetch bound to the open detail view
use crate::application::rig_api::{ApiError, RigApi};
use crate::application::view_session::{lock_session, PollOutcome, PollTicket, SessionEvent, SharedSession};
use crate::domain::entity::EntityId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub interval: Duration,
    pub history_limit: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            history_limit: 50,
        }
    }
}

/// Running poll timer. Stopping it prevents further ticks; a request already
/// in flight completes and its result is dropped by the staleness check.
pub struct PollerHandle {
    entity: EntityId,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn spawn(
        api: Arc<dyn RigApi>,
        session: SharedSession,
        events: broadcast::Sender<SessionEvent>,
        ticket: PollTicket,
        config: PollerConfig,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        tracing::info!(
            "Starting poller for {} every {:?} (limit {})",
            ticket.entity,
            config.interval,
            config.history_limit
        );
        let task = tokio::spawn(run(api, session, events, ticket, config, stop_rx));
        Self {
            entity: ticket.entity,
            stop,
            task,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) -> JoinHandle<()> {
        tracing::info!("Stopping poller for {}", self.entity);
        let _ = self.stop.send(true);
        self.task
    }
}

async fn run(
    api: Arc<dyn RigApi>,
    session: SharedSession,
    events: broadcast::Sender<SessionEvent>,
    ticket: PollTicket,
    config: PollerConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticks = tokio::time::interval(config.interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = ticks.tick() => {}
        }
        if *stop_rx.borrow() || !lock_session(&session).is_current(&ticket) {
            break;
        }

        match api.fetch_history(ticket.entity, config.history_limit).await {
            Ok(records) => {
                let outcome = lock_session(&session).apply_poll(&ticket, &records);
                match outcome {
                    PollOutcome::Applied(0) => {}
                    PollOutcome::Applied(count) => {
                        tracing::debug!("Applied {} history records for {}", count, ticket.entity);
                        let _ = events.send(SessionEvent::HistoryChanged { entity: ticket.entity });
                        let _ = events.send(SessionEvent::EntityChanged { entity: ticket.entity });
                    }
                    PollOutcome::Stale => {
                        tracing::debug!("Discarding stale history response for {}", ticket.entity);
                        break;
                    }
                }
            }
            Err(ApiError::Unauthorized) => {
                tracing::error!("History fetch for {} unauthorized; session expired", ticket.entity);
                let _ = events.send(SessionEvent::SessionExpired);
                break;
            }
            Err(e) => {
                tracing::warn!("History fetch for {} failed: {}", ticket.entity, e);
            }
        }
    }

    tracing::debug!("Poller for {} exited", ticket.entity);
}
