//! Shared types for the titlecheck verification pipeline
//!
//! Holds the common error type, configuration loading, and the domain
//! models exchanged between the inbox watcher, reconciler, and the
//! collaborator clients.

pub mod config;
pub mod error;
pub mod models;

pub use config::Settings;
pub use error::{Error, Result};
