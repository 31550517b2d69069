// Presentation layer - HTTP handlers, rendering and view binding
pub mod app_state;
pub mod chart_renderer;
pub mod handlers;
pub mod surface;
pub mod svg_surface;
pub mod table;
pub mod view_binder;
