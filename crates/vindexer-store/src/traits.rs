use {
    async_trait::async_trait,
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    vindexer_common::{EventRecord, Pagination, PollStats, Result, VoteRecord},
};

/// Key under which the resume watermark is persisted.
pub const WATERMARK_KEY: &str = "last_processed_lt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    Claimed,
    /// Already claimed earlier; the first claim transaction is kept
    AlreadyClaimed,
    NotFound,
}

/// The storage surface the indexer and the HTTP layer share.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait VoteStore: Send + Sync + 'static {
    /// Upsert keyed by `(poll_id, voter_address)`. An existing record keeps
    /// its `created_at`, `indexed_at` and reward fields, and is only
    /// overwritten by a vote with an equal or later `lt`.
    async fn record_vote(&self, vote: VoteRecord) -> Result<()>;

    /// Votes of a poll in `lt` order.
    async fn votes_for_poll(&self, poll_id: u64, page: Pagination) -> Result<Vec<VoteRecord>>;

    /// Votes cast by a voter, newest first.
    async fn votes_for_voter(&self, voter_address: &str) -> Result<Vec<VoteRecord>>;

    /// Unclaimed votes carrying a positive reward.
    async fn unclaimed_rewards(&self, voter_address: &str) -> Result<Vec<VoteRecord>>;

    /// One-way transition of `reward_claimed` to true.
    async fn mark_reward_claimed(
        &self,
        poll_id: u64,
        voter_address: &str,
        claim_transaction_hash: &str,
    ) -> Result<ClaimOutcome>;

    /// Attaches a computed reward to a vote. Returns false if no vote matched.
    async fn set_reward_amount(&self, poll_id: u64, voter_address: &str, amount: Decimal) -> Result<bool>;

    async fn poll_stats(&self, poll_id: u64) -> Result<PollStats>;

    /// Most recently indexed votes by `lt`, newest first.
    async fn recent_votes(&self, limit: usize) -> Result<Vec<VoteRecord>>;

    /// Stores an outbound message; a duplicate is a no-op.
    async fn record_event(&self, event: EventRecord) -> Result<()>;

    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>>;

    /// `None` until the first transaction has been processed.
    async fn last_processed_lt(&self) -> Result<Option<u64>>;

    /// Moves the watermark forward to `lt`; never moves it back. Returns the
    /// resulting watermark.
    async fn advance_watermark(&self, lt: u64) -> Result<u64>;

    /// Administrative overwrite of the watermark, in either direction.
    async fn reset_watermark(&self, lt: u64) -> Result<()>;

    /// Cheap round trip used by health checks.
    async fn ping(&self) -> Result<()>;

    /// Close the storage (flush any pending writes, close connections, etc.)
    async fn close(&self) -> Result<()>;
}
