// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod http_rig_api;
pub mod live_socket;
