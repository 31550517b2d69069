// Application layer - Ingestion, state and polling use cases
pub mod entity_registry;
pub mod history_store;
pub mod live_ingest;
pub mod normalizer;
pub mod poller;
pub mod rig_api;
pub mod view_session;
