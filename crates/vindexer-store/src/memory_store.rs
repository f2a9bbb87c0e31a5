use {
    crate::traits::{ClaimOutcome, VoteStore},
    async_trait::async_trait,
    chrono::Utc,
    rust_decimal::Decimal,
    std::{
        collections::BTreeMap,
        sync::{Arc, Mutex, MutexGuard},
    },
    vindexer_common::{Error, EventRecord, Pagination, PollStats, Result, VoteRecord},
};

#[derive(Debug, Default)]
struct MemoryState {
    votes: BTreeMap<(u64, String), VoteRecord>,
    events: BTreeMap<(String, u32), EventRecord>,
    watermark: Option<u64>,
}

/// Process-local store, used for tests and for `STORE_BACKEND=memory`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))
    }

    pub fn vote_count(&self) -> usize {
        self.lock().map(|state| state.votes.len()).unwrap_or(0)
    }

    pub fn event_count(&self) -> usize {
        self.lock().map(|state| state.events.len()).unwrap_or(0)
    }
}

#[async_trait]
impl VoteStore for MemoryStore {
    async fn record_vote(&self, vote: VoteRecord) -> Result<()> {
        let mut state = self.lock()?;
        let key = (vote.poll_id, vote.voter_address.clone());
        match state.votes.get_mut(&key) {
            Some(existing) => {
                if existing.lt <= vote.lt {
                    existing.option_index = vote.option_index;
                    existing.timestamp = vote.timestamp;
                    existing.transaction_hash = vote.transaction_hash;
                    existing.lt = vote.lt;
                }
            }
            None => {
                state.votes.insert(key, vote);
            }
        }
        Ok(())
    }

    async fn votes_for_poll(&self, poll_id: u64, page: Pagination) -> Result<Vec<VoteRecord>> {
        let state = self.lock()?;
        let mut votes: Vec<VoteRecord> = state
            .votes
            .range((poll_id, String::new())..)
            .take_while(|((id, _), _)| *id == poll_id)
            .map(|(_, vote)| vote.clone())
            .collect();
        votes.sort_by_key(|vote| vote.lt);

        Ok(match page.window() {
            Some((offset, limit)) => votes.into_iter().skip(offset).take(limit).collect(),
            None => votes,
        })
    }

    async fn votes_for_voter(&self, voter_address: &str) -> Result<Vec<VoteRecord>> {
        let state = self.lock()?;
        let mut votes: Vec<VoteRecord> = state
            .votes
            .values()
            .filter(|vote| vote.voter_address == voter_address)
            .cloned()
            .collect();
        votes.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.lt.cmp(&a.lt)));
        Ok(votes)
    }

    async fn unclaimed_rewards(&self, voter_address: &str) -> Result<Vec<VoteRecord>> {
        let mut votes = self.votes_for_voter(voter_address).await?;
        votes.retain(VoteRecord::has_claimable_reward);
        Ok(votes)
    }

    async fn mark_reward_claimed(
        &self,
        poll_id: u64,
        voter_address: &str,
        claim_transaction_hash: &str,
    ) -> Result<ClaimOutcome> {
        let mut state = self.lock()?;
        let Some(vote) = state.votes.get_mut(&(poll_id, voter_address.to_string())) else {
            return Ok(ClaimOutcome::NotFound);
        };
        if vote.reward_claimed {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }

        vote.reward_claimed = true;
        vote.claim_transaction_hash = Some(claim_transaction_hash.to_string());
        vote.claimed_at = Some(Utc::now());
        Ok(ClaimOutcome::Claimed)
    }

    async fn set_reward_amount(&self, poll_id: u64, voter_address: &str, amount: Decimal) -> Result<bool> {
        let mut state = self.lock()?;
        match state.votes.get_mut(&(poll_id, voter_address.to_string())) {
            Some(vote) => {
                vote.reward_amount = Some(amount);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn poll_stats(&self, poll_id: u64) -> Result<PollStats> {
        let state = self.lock()?;
        let options = state
            .votes
            .range((poll_id, String::new())..)
            .take_while(|((id, _), _)| *id == poll_id)
            .map(|(_, vote)| vote.option_index);
        Ok(PollStats::from_options(poll_id, options))
    }

    async fn recent_votes(&self, limit: usize) -> Result<Vec<VoteRecord>> {
        let state = self.lock()?;
        let mut votes: Vec<VoteRecord> = state.votes.values().cloned().collect();
        votes.sort_by(|a, b| b.lt.cmp(&a.lt));
        votes.truncate(limit);
        Ok(votes)
    }

    async fn record_event(&self, event: EventRecord) -> Result<()> {
        let mut state = self.lock()?;
        state
            .events
            .entry((event.transaction_hash.clone(), event.message_index))
            .or_insert(event);
        Ok(())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>> {
        let state = self.lock()?;
        let mut events: Vec<EventRecord> = state.events.values().cloned().collect();
        events.sort_by(|a, b| b.lt.cmp(&a.lt).then(a.message_index.cmp(&b.message_index)));
        events.truncate(limit);
        Ok(events)
    }

    async fn last_processed_lt(&self) -> Result<Option<u64>> {
        Ok(self.lock()?.watermark)
    }

    async fn advance_watermark(&self, lt: u64) -> Result<u64> {
        let mut state = self.lock()?;
        let next = state.watermark.map_or(lt, |current| current.max(lt));
        state.watermark = Some(next);
        Ok(next)
    }

    async fn reset_watermark(&self, lt: u64) -> Result<()> {
        self.lock()?.watermark = Some(lt);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::conformance};

    #[tokio::test]
    async fn test_memory_store_conformance() {
        conformance::run_all(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_counts() {
        let store = MemoryStore::new();
        store
            .record_vote(conformance::vote(1, "EQvoter", 0, 10))
            .await
            .unwrap();
        store
            .record_vote(conformance::vote(1, "EQvoter", 1, 11))
            .await
            .unwrap();
        assert_eq!(store.vote_count(), 1);
        assert_eq!(store.event_count(), 0);
    }
}
