// Domain layer - Circuits, samples and metric configuration
pub mod entity;
pub mod telemetry;
