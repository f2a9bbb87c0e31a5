use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Raw outbound message captured for later inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub transaction_hash: String,
    pub message_index: u32,
    pub lt: u64,
    pub timestamp: DateTime<Utc>,
    pub message_type: String,
    pub raw_data: String,
    pub created_at: DateTime<Utc>,
}
