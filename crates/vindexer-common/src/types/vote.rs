use {
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
};

/// One counted vote per `(poll_id, voter_address)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub poll_id: u64,
    pub voter_address: String,
    pub option_index: u64,
    pub timestamp: DateTime<Utc>,
    pub transaction_hash: String,
    pub lt: u64,
    pub reward_claimed: bool,
    pub reward_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub indexed_at: DateTime<Utc>,
}

impl VoteRecord {
    /// A freshly decoded vote with unset reward fields.
    pub fn new(
        poll_id: u64,
        voter_address: impl Into<String>,
        option_index: u64,
        timestamp: DateTime<Utc>,
        transaction_hash: impl Into<String>,
        lt: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            poll_id,
            voter_address: voter_address.into(),
            option_index,
            timestamp,
            transaction_hash: transaction_hash.into(),
            lt,
            reward_claimed: false,
            reward_amount: None,
            claim_transaction_hash: None,
            claimed_at: None,
            created_at: now,
            indexed_at: now,
        }
    }

    /// Unclaimed and carrying a positive reward.
    pub fn has_claimable_reward(&self) -> bool {
        !self.reward_claimed && self.reward_amount.map_or(false, |amount| amount > Decimal::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStats {
    pub poll_id: u64,
    pub total_votes: u64,
    /// Votes per option index, ascending by option
    pub vote_breakdown: BTreeMap<u64, u64>,
}

impl PollStats {
    pub fn from_options<I: IntoIterator<Item = u64>>(poll_id: u64, options: I) -> Self {
        let mut vote_breakdown = BTreeMap::new();
        let mut total_votes = 0;
        for option in options {
            *vote_breakdown.entry(option).or_insert(0) += 1;
            total_votes += 1;
        }
        Self {
            poll_id,
            total_votes,
            vote_breakdown,
        }
    }
}

/// Largest page a caller can ask for.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Pagination pass-through; the store applies it when a limit is present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl Pagination {
    /// `(offset, limit)` when a limit was requested, the limit clamped to
    /// `1..=MAX_PAGE_LIMIT`.
    pub fn window(&self) -> Option<(usize, usize)> {
        let limit = self.limit?.clamp(1, MAX_PAGE_LIMIT) as usize;
        let page = self.page.unwrap_or(1).max(1) as usize;
        Some(((page - 1) * limit, limit))
    }
}
