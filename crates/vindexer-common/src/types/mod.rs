//! Common data types used throughout the vIndexer system

pub mod contract;
pub mod event;
pub mod transaction;
pub mod vote;

pub use contract::{ContractState, MethodResult, StackEntry};
pub use event::EventRecord;
pub use transaction::{Message, MessageBody, Transaction};
pub use vote::{Pagination, PollStats, VoteRecord, MAX_PAGE_LIMIT};

use serde::{Deserialize, Serialize};

/// Snapshot of indexing progress, as reported by the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerProgress {
    pub last_processed_lt: u64,
    pub processed_transactions: u64,
    pub indexed_votes: u64,
}
