// Application state for HTTP handlers
use crate::presentation::view_binder::ViewBinder;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub binder: Arc<ViewBinder>,
}
