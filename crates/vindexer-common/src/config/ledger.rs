use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of a toncenter-compatible API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Upper bound for a single RPC round trip
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Upstream requests allowed per `get_transactions` call
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout_ms: default_timeout(),
            max_pages: default_max_pages(),
        }
    }
}

impl LedgerConfig {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_endpoint() -> String {
    "https://testnet.toncenter.com/api/v2/jsonRPC".to_string()
}

fn default_timeout() -> u64 {
    15_000
}

fn default_max_pages() -> usize {
    20
}
