//! Behaviour every `VoteStore` backend has to share.

use {
    crate::traits::{ClaimOutcome, VoteStore},
    chrono::{TimeZone, Utc},
    rust_decimal::Decimal,
    vindexer_common::{EventRecord, Pagination, VoteRecord},
};

pub fn vote(poll_id: u64, voter: &str, option_index: u64, lt: u64) -> VoteRecord {
    let timestamp = Utc.timestamp_opt(1_700_000_000 + lt as i64, 0).unwrap();
    VoteRecord::new(poll_id, voter, option_index, timestamp, format!("{:064x}", lt), lt)
}

pub async fn run_all<S: VoteStore>(store: &S) {
    upsert_is_idempotent(store).await;
    later_vote_replaces_option(store).await;
    older_vote_does_not_overwrite(store).await;
    stats_count_each_option(store).await;
    pagination_windows(store).await;
    claims_are_one_way(store).await;
    unclaimed_rewards_filter(store).await;
    events_deduplicate(store).await;
    watermark_is_monotonic(store).await;
}

async fn upsert_is_idempotent<S: VoteStore>(store: &S) {
    let first = vote(100, "EQidem", 2, 10);
    store.record_vote(first.clone()).await.unwrap();
    let stored = store.votes_for_poll(100, Pagination::default()).await.unwrap();

    let mut again = first.clone();
    again.created_at = again.created_at + chrono::Duration::hours(1);
    again.indexed_at = again.created_at;
    store.record_vote(again).await.unwrap();

    let votes = store.votes_for_poll(100, Pagination::default()).await.unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].option_index, 2);
    assert_eq!(votes[0].created_at, stored[0].created_at);
    assert_eq!(votes[0].indexed_at, stored[0].indexed_at);
}

async fn later_vote_replaces_option<S: VoteStore>(store: &S) {
    store.record_vote(vote(101, "EQrevote", 0, 20)).await.unwrap();
    store.set_reward_amount(101, "EQrevote", Decimal::new(15, 1)).await.unwrap();
    store.record_vote(vote(101, "EQrevote", 3, 25)).await.unwrap();

    let votes = store.votes_for_voter("EQrevote").await.unwrap();
    assert_eq!(votes.len(), 1);
    assert_eq!(votes[0].option_index, 3);
    assert_eq!(votes[0].lt, 25);
    assert_eq!(votes[0].reward_amount, Some(Decimal::new(15, 1)));
}

async fn older_vote_does_not_overwrite<S: VoteStore>(store: &S) {
    store.record_vote(vote(102, "EQreplay", 1, 40)).await.unwrap();
    store.record_vote(vote(102, "EQreplay", 0, 30)).await.unwrap();

    let votes = store.votes_for_poll(102, Pagination::default()).await.unwrap();
    assert_eq!(votes[0].option_index, 1);
    assert_eq!(votes[0].lt, 40);
}

async fn stats_count_each_option<S: VoteStore>(store: &S) {
    for (i, option) in [0u64, 1, 0, 2, 0].into_iter().enumerate() {
        let voter = format!("EQstats{}", i);
        store.record_vote(vote(103, &voter, option, 50 + i as u64)).await.unwrap();
    }

    let stats = store.poll_stats(103).await.unwrap();
    assert_eq!(stats.total_votes, 5);
    assert_eq!(
        stats.vote_breakdown.into_iter().collect::<Vec<_>>(),
        vec![(0, 3), (1, 1), (2, 1)]
    );

    let empty = store.poll_stats(9_999).await.unwrap();
    assert_eq!(empty.total_votes, 0);
    assert!(empty.vote_breakdown.is_empty());
}

async fn pagination_windows<S: VoteStore>(store: &S) {
    for i in 0..5u64 {
        let voter = format!("EQpage{}", i);
        store.record_vote(vote(104, &voter, 0, 60 + i)).await.unwrap();
    }

    let all = store.votes_for_poll(104, Pagination::default()).await.unwrap();
    assert_eq!(all.iter().map(|v| v.lt).collect::<Vec<_>>(), vec![60, 61, 62, 63, 64]);

    let page = Pagination { page: Some(2), limit: Some(2) };
    let second = store.votes_for_poll(104, page).await.unwrap();
    assert_eq!(second.iter().map(|v| v.lt).collect::<Vec<_>>(), vec![62, 63]);
}

async fn claims_are_one_way<S: VoteStore>(store: &S) {
    store.record_vote(vote(105, "EQclaim", 1, 70)).await.unwrap();

    let outcome = store.mark_reward_claimed(105, "EQclaim", "claim-a").await.unwrap();
    assert_eq!(outcome, ClaimOutcome::Claimed);
    let first = store.votes_for_voter("EQclaim").await.unwrap().remove(0);

    let outcome = store.mark_reward_claimed(105, "EQclaim", "claim-b").await.unwrap();
    assert_eq!(outcome, ClaimOutcome::AlreadyClaimed);
    let second = store.votes_for_voter("EQclaim").await.unwrap().remove(0);

    assert!(second.reward_claimed);
    assert_eq!(second.claim_transaction_hash.as_deref(), Some("claim-a"));
    assert_eq!(second.claimed_at, first.claimed_at);

    // Re-indexing the vote does not undo the claim
    store.record_vote(vote(105, "EQclaim", 1, 70)).await.unwrap();
    let third = store.votes_for_voter("EQclaim").await.unwrap().remove(0);
    assert!(third.reward_claimed);

    let missing = store.mark_reward_claimed(105, "EQnobody", "claim-c").await.unwrap();
    assert_eq!(missing, ClaimOutcome::NotFound);
}

async fn unclaimed_rewards_filter<S: VoteStore>(store: &S) {
    store.record_vote(vote(106, "EQrewards", 0, 80)).await.unwrap();
    store.record_vote(vote(107, "EQrewards", 1, 81)).await.unwrap();
    store.record_vote(vote(108, "EQrewards", 2, 82)).await.unwrap();
    store.record_vote(vote(109, "EQrewards", 2, 83)).await.unwrap();

    store.set_reward_amount(106, "EQrewards", Decimal::new(5, 0)).await.unwrap();
    store.set_reward_amount(107, "EQrewards", Decimal::new(7, 0)).await.unwrap();
    store.set_reward_amount(108, "EQrewards", Decimal::ZERO).await.unwrap();
    store.mark_reward_claimed(107, "EQrewards", "claim").await.unwrap();

    let unclaimed = store.unclaimed_rewards("EQrewards").await.unwrap();
    assert_eq!(unclaimed.len(), 1);
    assert_eq!(unclaimed[0].poll_id, 106);

    let assigned = store.set_reward_amount(106, "EQnobody", Decimal::ONE).await.unwrap();
    assert!(!assigned);
}

async fn events_deduplicate<S: VoteStore>(store: &S) {
    let event = EventRecord {
        transaction_hash: "ab".repeat(32),
        message_index: 0,
        lt: 90,
        timestamp: Utc.timestamp_opt(1_700_000_090, 0).unwrap(),
        message_type: "outbound".to_string(),
        raw_data: "00".to_string(),
        created_at: Utc::now(),
    };
    store.record_event(event.clone()).await.unwrap();
    store.record_event(event.clone()).await.unwrap();
    store
        .record_event(EventRecord { message_index: 1, ..event })
        .await
        .unwrap();

    let events = store.recent_events(10).await.unwrap();
    let matching = events.iter().filter(|e| e.lt == 90).count();
    assert_eq!(matching, 2);
}

async fn watermark_is_monotonic<S: VoteStore>(store: &S) {
    store.reset_watermark(1_000).await.unwrap();
    assert_eq!(store.advance_watermark(1_500).await.unwrap(), 1_500);
    assert_eq!(store.advance_watermark(1_200).await.unwrap(), 1_500);
    assert_eq!(store.last_processed_lt().await.unwrap(), Some(1_500));

    store.reset_watermark(800).await.unwrap();
    assert_eq!(store.last_processed_lt().await.unwrap(), Some(800));

    // the full u64 range orders correctly, with no wrap past i64::MAX
    let high = i64::MAX as u64 + 10;
    assert_eq!(store.advance_watermark(high).await.unwrap(), high);
    assert_eq!(store.advance_watermark(900).await.unwrap(), high);
    assert_eq!(store.last_processed_lt().await.unwrap(), Some(high));
}
