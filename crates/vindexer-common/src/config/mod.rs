//! Configuration types for the vIndexer system

mod ledger;
mod schema;
mod store;

pub use ledger::LedgerConfig;
pub use schema::{FieldSpec, VoteLayout, WireSchema};
pub use store::{StoreBackend, StoreConfig};

use {
    serde::{Deserialize, Serialize},
    std::{fs, path::Path, time::Duration},
};

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Address of the voting contract whose history is indexed
    pub contract_address: String,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub indexer: PollConfig,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub schema: WireSchema,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

/// Poll loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_error_backoff")]
    pub error_backoff_ms: u64,
    /// Store outbound message bodies in the events collection
    #[serde(default)]
    pub record_events: bool,
    /// Seed an absent watermark from the contract's latest transaction
    #[serde(default)]
    pub start_from_latest: bool,
    #[serde(default = "default_startup_attempts")]
    pub startup_check_attempts: u32,
    #[serde(default = "default_startup_interval")]
    pub startup_check_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            poll_interval_ms: default_poll_interval(),
            error_backoff_ms: default_error_backoff(),
            record_events: false,
            start_from_latest: false,
            startup_check_attempts: default_startup_attempts(),
            startup_check_interval_ms: default_startup_interval(),
        }
    }
}

impl PollConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn startup_check_interval(&self) -> Duration {
        Duration::from_millis(self.startup_check_interval_ms)
    }
}

/// HTTP surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_path_prefix")]
    pub path_prefix: Option<String>,
    #[serde(default = "default_feed_interval")]
    pub live_feed_interval_ms: u64,
    #[serde(default = "default_feed_size")]
    pub live_feed_size: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            path_prefix: default_path_prefix(),
            live_feed_interval_ms: default_feed_interval(),
            live_feed_size: default_feed_size(),
        }
    }
}

impl IndexerConfig {
    pub fn new(contract_address: impl Into<String>) -> Self {
        Self {
            contract_address: contract_address.into(),
            ledger: LedgerConfig::default(),
            store: StoreConfig::default(),
            indexer: PollConfig::default(),
            api: ApiSettings::default(),
            schema: WireSchema::default(),
            log_level: default_log_level(),
            metrics_enabled: true,
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str::<Self>(&contents)?)
    }

    /// Rejects configurations the indexer cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.contract_address.trim().is_empty() {
            return Err(Error::Config("contract address is not set".to_string()));
        }
        if self.ledger.endpoint.trim().is_empty() {
            return Err(Error::Config("ledger endpoint is not set".to_string()));
        }
        self.store.validate()?;

        let poll = &self.indexer;
        if poll.page_size == 0 || poll.page_size > 100 {
            return Err(Error::Config(format!(
                "page size must be within 1..=100, got {}",
                poll.page_size
            )));
        }
        if poll.error_backoff_ms < poll.poll_interval_ms {
            return Err(Error::Config(
                "error backoff must not be shorter than the poll interval".to_string(),
            ));
        }
        if self.api.live_feed_size == 0 {
            return Err(Error::Config("live feed size must be positive".to_string()));
        }

        self.schema.validate()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    50
}

fn default_poll_interval() -> u64 {
    30_000
}

fn default_error_backoff() -> u64 {
    60_000
}

fn default_startup_attempts() -> u32 {
    5
}

fn default_startup_interval() -> u64 {
    2_000
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_path_prefix() -> Option<String> {
    Some("/api".to_string())
}

fn default_feed_interval() -> u64 {
    10_000
}

fn default_feed_size() -> usize {
    5
}
