// Deploy-trigger core shared by the service binary and its tests

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod models;
pub mod reconcile;
pub mod schedule;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod trigger;
