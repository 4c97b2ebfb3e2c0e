//! Configuration loading and validation
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `TITLECHECK_CONFIG` environment variable
//! 3. Default path `./titlecheck.toml`
//!
//! Missing file falls back to compiled defaults so the service can start in
//! a development environment with only env overrides.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default poll interval between inbox cycles (15 minutes)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 900;

/// Default pairing window between the two authority response messages
pub const DEFAULT_PAIRING_WINDOW_HOURS: i64 = 12;

/// Store bulk-update request limit; batches never exceed this
pub const MAX_UPDATE_BATCH: usize = 25;

/// Service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Authority sender addresses considered when listing unread mail
    pub authority_senders: Vec<String>,
    /// Seconds between inbox polling cycles
    pub poll_interval_secs: u64,
    /// Maximum hours between a results spreadsheet and its documents archive
    pub pairing_window_hours: i64,
    /// Mailbox folder receiving successfully processed messages
    pub processed_folder: String,
    /// Mailbox folder receiving failed messages
    pub failed_folder: String,
    /// Root directory for the filesystem object store
    pub blob_root: PathBuf,
    /// Base URL of the mailbox provider API
    pub mailbox_base_url: String,
    /// Base URL of the case-record store Web API
    pub case_store_base_url: String,
    /// OAuth token endpoint shared by the mailbox and store clients
    pub token_url: String,
    /// Records per bulk-update request (store limit is 25)
    pub update_batch_size: usize,
    /// Overall deadline for one reconciliation run, in seconds
    pub reconcile_deadline_secs: u64,
    /// HTTP bind address for the trigger/health surface
    pub bind_address: String,
    /// Time-limited read URL validity for archived title documents, in minutes
    pub read_url_ttl_mins: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            authority_senders: Vec::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            pairing_window_hours: DEFAULT_PAIRING_WINDOW_HOURS,
            processed_folder: "Processed".to_string(),
            failed_folder: "Failed".to_string(),
            blob_root: PathBuf::from("./titlecheck_data"),
            mailbox_base_url: String::new(),
            case_store_base_url: String::new(),
            token_url: String::new(),
            update_batch_size: MAX_UPDATE_BATCH,
            reconcile_deadline_secs: 300,
            bind_address: "127.0.0.1:5810".to_string(),
            read_url_ttl_mins: 60,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        Ok(settings)
    }

    /// Resolve the config file path: CLI flag, then env var, then default
    pub fn resolve_path(cli_arg: Option<&str>) -> PathBuf {
        if let Some(path) = cli_arg {
            return PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("TITLECHECK_CONFIG") {
            return PathBuf::from(path);
        }
        PathBuf::from("./titlecheck.toml")
    }

    /// Load from the resolved path, falling back to defaults when the file
    /// is absent (an explicitly-passed path that is missing is an error)
    pub fn load_or_default(cli_arg: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(cli_arg);
        if path.exists() {
            Self::load(&path)
        } else if cli_arg.is_some() {
            Err(Error::Config(format!("config file not found: {}", path.display())))
        } else {
            tracing::warn!(path = %path.display(), "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Validate settings that have no safe fallback
    pub fn validate(&self) -> Result<()> {
        if self.authority_senders.is_empty() {
            return Err(Error::Config("authority_senders must not be empty".to_string()));
        }
        if self.pairing_window_hours <= 0 {
            return Err(Error::Config("pairing_window_hours must be positive".to_string()));
        }
        if self.update_batch_size == 0 || self.update_batch_size > MAX_UPDATE_BATCH {
            return Err(Error::Config(format!(
                "update_batch_size must be 1..={}, got {}",
                MAX_UPDATE_BATCH, self.update_batch_size
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be positive".to_string()));
        }
        Ok(())
    }
}
