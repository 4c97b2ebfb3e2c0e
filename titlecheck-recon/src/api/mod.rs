//! HTTP API surface: health and the reconciliation triggers

pub mod health;
pub mod trigger;

pub use health::health_routes;
pub use trigger::trigger_routes;
