//! The poll loop: fetch new account history, decode, store, sleep.
//!
//! A single task per [`VoteIndexer`] runs cycles sequentially. Its lifecycle
//! is a small state machine held in a `watch` channel:
//!
//! ```text
//! Stopped --start()--> Running --stop()--> Stopping --(cycle ends)--> Stopped
//! ```
//!
//! `stop()` is observed at the top of a cycle and during the sleep between
//! cycles, never in the middle of one. The watermark advances after every
//! transaction, so a crash mid-page resumes at the last stored transaction.
//!
//! `restart_from_lt()` bumps a watermark epoch under the same lock the loop
//! takes to advance the watermark. A cycle that started before the reset
//! sees the new epoch and drops the rest of its page instead of moving the
//! watermark past the override.

use {
    crate::decoder::{Decoded, MessageDecoder},
    serde::{Deserialize, Serialize},
    std::{
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc, Mutex,
        },
        time::Instant,
    },
    tokio::{
        sync::{watch, Mutex as AsyncMutex},
        task::JoinHandle,
    },
    tracing::{debug, error, info, trace, warn},
    vindexer_common::{
        utils::{datetime_from_unix, wait_for, RetryPolicy, WaitOutcome},
        EventRecord, IndexerProgress, PollConfig, Result, Transaction, VoteRecord, WireSchema,
    },
    vindexer_ledger::{LedgerClient, TransactionQuery},
    vindexer_metrics::metrics,
    vindexer_store::VoteStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexerState {
    Stopped,
    Running,
    Stopping,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub processed: usize,
    pub votes: usize,
    pub skipped: usize,
    pub events: usize,
    pub watermark: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerStatus {
    pub is_indexing: bool,
    pub state: IndexerState,
    /// Seconds since the indexer was constructed
    pub uptime: u64,
    #[serde(flatten)]
    pub progress: IndexerProgress,
}

pub struct VoteIndexer {
    contract_address: String,
    config: PollConfig,
    decoder: MessageDecoder,
    ledger: Arc<dyn LedgerClient>,
    store: Arc<dyn VoteStore>,
    state: watch::Sender<IndexerState>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Incremented by every administrative watermark reset
    watermark_epoch: AsyncMutex<u64>,
    started_at: Instant,
    processed_transactions: AtomicU64,
    indexed_votes: AtomicU64,
}

impl VoteIndexer {
    pub fn new(
        contract_address: impl Into<String>,
        config: PollConfig,
        schema: WireSchema,
        ledger: Arc<dyn LedgerClient>,
        store: Arc<dyn VoteStore>,
    ) -> Self {
        let (state, _) = watch::channel(IndexerState::Stopped);
        Self {
            contract_address: contract_address.into(),
            config,
            decoder: MessageDecoder::new(schema),
            ledger,
            store,
            state,
            task: Mutex::new(None),
            watermark_epoch: AsyncMutex::new(0),
            started_at: Instant::now(),
            processed_transactions: AtomicU64::new(0),
            indexed_votes: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> IndexerState {
        *self.state.borrow()
    }

    /// Starts the loop. Returns false if it was already running.
    ///
    /// Calling this while a stop is pending cancels the stop and lets the
    /// existing task carry on.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut previous = IndexerState::Running;
        self.state.send_if_modified(|state| {
            previous = *state;
            if *state == IndexerState::Running {
                return false;
            }
            *state = IndexerState::Running;
            true
        });

        match previous {
            IndexerState::Running => {
                debug!("Indexer already running");
                false
            }
            IndexerState::Stopping => {
                info!("Pending stop cancelled, indexer keeps running");
                true
            }
            IndexerState::Stopped => {
                info!("Starting vote indexer for {}", self.contract_address);
                let indexer = Arc::clone(self);
                let handle = tokio::spawn(async move { indexer.run().await });
                if let Ok(mut task) = self.task.lock() {
                    *task = Some(handle);
                }
                true
            }
        }
    }

    /// Requests a stop. The in-flight cycle, if any, completes first.
    pub fn stop(&self) -> bool {
        let requested = self.state.send_if_modified(|state| {
            if *state != IndexerState::Running {
                return false;
            }
            *state = IndexerState::Stopping;
            true
        });
        if requested {
            info!("Stopping vote indexer");
        }
        requested
    }

    /// Waits for the loop task to exit after `stop()`.
    pub async fn join(&self) {
        let handle = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Indexer task ended abnormally: {}", e);
            }
        }
    }

    /// Administrative override: rewrite the watermark, then make sure the
    /// loop is running. A cycle in flight keeps none of its later advances.
    pub async fn restart_from_lt(self: &Arc<Self>, lt: u64) -> Result<()> {
        {
            let mut epoch = self.watermark_epoch.lock().await;
            self.store.reset_watermark(lt).await?;
            *epoch += 1;
        }
        metrics::set_watermark(lt);
        info!("Reindexing from lt {}", lt);
        self.start();
        Ok(())
    }

    pub async fn status(&self) -> Result<IndexerStatus> {
        let state = self.state();
        let last_processed_lt = self.store.last_processed_lt().await?.unwrap_or(0);
        Ok(IndexerStatus {
            is_indexing: state == IndexerState::Running,
            state,
            uptime: self.started_at.elapsed().as_secs(),
            progress: IndexerProgress {
                last_processed_lt,
                processed_transactions: self.processed_transactions.load(Ordering::Relaxed),
                indexed_votes: self.indexed_votes.load(Ordering::Relaxed),
            },
        })
    }

    /// Polls the ledger until it answers for the contract, within the
    /// configured startup budget.
    pub async fn wait_for_ledger(&self) -> WaitOutcome<Option<u64>> {
        let policy = RetryPolicy::new(
            self.config.startup_check_interval(),
            self.config.startup_check_attempts,
            self.config.startup_check_interval() * self.config.startup_check_attempts.max(1),
        );
        wait_for(&policy, |attempt| async move {
            debug!("Ledger check attempt {}", attempt);
            let state = self.ledger.get_contract_state(&self.contract_address).await?;
            Ok(Some(state.last_transaction_lt))
        })
        .await
    }

    async fn run(self: Arc<Self>) {
        let mut state_rx = self.state.subscribe();

        match self.wait_for_ledger().await {
            WaitOutcome::Confirmed { value, attempts } => {
                info!("Ledger reachable after {} attempt(s), contract lt {:?}", attempts, value)
            }
            WaitOutcome::TimedOut { attempts } => {
                warn!("Ledger not reachable after {} attempts, polling anyway", attempts)
            }
        }

        while self.should_continue() {
            let started = Instant::now();
            let delay = match self.run_cycle().await {
                Ok(report) => {
                    if report.processed > 0 {
                        info!(
                            "Processed {} transaction(s): {} vote(s), {} skipped, watermark {}",
                            report.processed, report.votes, report.skipped, report.watermark
                        );
                    } else {
                        debug!("No new transactions after lt {}", report.watermark);
                    }
                    self.config.poll_interval()
                }
                Err(e) => {
                    metrics::CYCLE_ERRORS.inc();
                    let backoff = self.config.error_backoff();
                    if e.is_transient() {
                        warn!("Poll cycle failed, retrying in {:?}: {}", backoff, e);
                    } else {
                        error!("Poll cycle failed, retrying in {:?}: {}", backoff, e);
                    }
                    backoff
                }
            };
            metrics::CYCLE_DURATION.observe(started.elapsed().as_secs_f64());

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stop_requested(&mut state_rx) => {}
            }
        }

        info!("Vote indexer stopped");
    }

    /// Top-of-cycle check. Completes a pending stop atomically so a racing
    /// `start()` either keeps this task alive or spawns a fresh one.
    fn should_continue(&self) -> bool {
        let mut keep_running = true;
        self.state.send_if_modified(|state| match state {
            IndexerState::Running => false,
            IndexerState::Stopping => {
                keep_running = false;
                *state = IndexerState::Stopped;
                true
            }
            IndexerState::Stopped => {
                keep_running = false;
                false
            }
        });
        keep_running
    }

    /// One fetch-decode-store pass over transactions above the watermark.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let (epoch, watermark) = {
            let epoch = self.watermark_epoch.lock().await;
            (*epoch, self.load_watermark().await?)
        };
        let mut transactions = self
            .ledger
            .get_transactions(
                &self.contract_address,
                TransactionQuery::new(self.config.page_size, watermark),
            )
            .await?;

        let mut report = CycleReport {
            fetched: transactions.len(),
            watermark,
            ..CycleReport::default()
        };

        transactions.retain(|tx| tx.lt > watermark);
        transactions.sort_by_key(|tx| tx.lt);
        transactions.dedup_by_key(|tx| tx.lt);

        for tx in &transactions {
            if !self.process_transaction(tx, epoch, &mut report).await? {
                info!(
                    "Watermark was reset during the cycle, dropping {} transaction(s) from lt {}",
                    transactions.len() - report.processed,
                    tx.lt
                );
                break;
            }
        }

        metrics::record_cycle(report.processed as u64, report.votes as u64, report.skipped as u64);
        Ok(report)
    }

    async fn load_watermark(&self) -> Result<u64> {
        if let Some(lt) = self.store.last_processed_lt().await? {
            return Ok(lt);
        }
        if !self.config.start_from_latest {
            return Ok(0);
        }

        let state = self.ledger.get_contract_state(&self.contract_address).await?;
        let lt = state.last_transaction_lt.unwrap_or(0);
        self.store.reset_watermark(lt).await?;
        info!("No watermark stored, starting from the contract's latest lt {}", lt);
        Ok(lt)
    }

    /// Returns false, leaving the watermark alone, when an administrative
    /// reset happened since the cycle read the watermark.
    async fn process_transaction(&self, tx: &Transaction, epoch: u64, report: &mut CycleReport) -> Result<bool> {
        trace!("Processing transaction {} at lt {}", tx.hash, tx.lt);

        if let Some(vote) = self.decode_vote(tx, report) {
            debug!(
                "Vote poll {} option {} by {} (lt {})",
                vote.poll_id, vote.option_index, vote.voter_address, vote.lt
            );
            self.store.record_vote(vote).await?;
            report.votes += 1;
            self.indexed_votes.fetch_add(1, Ordering::Relaxed);
        }

        if self.config.record_events {
            for event in outbound_events(tx) {
                self.store.record_event(event).await?;
                report.events += 1;
                metrics::EVENTS_RECORDED.inc();
            }
        }

        {
            let current = self.watermark_epoch.lock().await;
            if *current != epoch {
                return Ok(false);
            }
            report.watermark = self.store.advance_watermark(tx.lt).await?;
        }
        report.processed += 1;
        self.processed_transactions.fetch_add(1, Ordering::Relaxed);
        metrics::set_watermark(report.watermark);
        Ok(true)
    }

    fn decode_vote(&self, tx: &Transaction, report: &mut CycleReport) -> Option<VoteRecord> {
        let message = tx.in_message.as_ref()?;
        let body = message.body.as_ref()?;

        match self.decoder.decode(body) {
            Ok(Decoded::Vote(vote)) => {
                let Some(voter) = message.source.as_deref() else {
                    debug!("Vote without a sender in {}, skipping", tx.hash);
                    report.skipped += 1;
                    return None;
                };
                Some(VoteRecord::new(
                    vote.poll_id,
                    voter,
                    vote.option_index,
                    datetime_from_unix(tx.now),
                    tx.hash.clone(),
                    tx.lt,
                ))
            }
            Ok(Decoded::Unknown { opcode }) => {
                trace!("Ignoring message with opcode {:?} in {}", opcode, tx.hash);
                None
            }
            Err(e) => {
                debug!("Skipping undecodable message in {}: {}", tx.hash, e);
                report.skipped += 1;
                None
            }
        }
    }
}

fn outbound_events(tx: &Transaction) -> impl Iterator<Item = EventRecord> + '_ {
    tx.out_messages
        .iter()
        .enumerate()
        .filter_map(move |(index, message)| {
            let body = message.body.as_ref()?;
            Some(EventRecord {
                transaction_hash: tx.hash.clone(),
                message_index: index as u32,
                lt: tx.lt,
                timestamp: datetime_from_unix(tx.now),
                message_type: "event".to_string(),
                raw_data: body.to_hex(),
                created_at: chrono::Utc::now(),
            })
        })
}

async fn stop_requested(rx: &mut watch::Receiver<IndexerState>) {
    loop {
        let state = *rx.borrow_and_update();
        if state != IndexerState::Running {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        mockall::{predicate::eq, Sequence},
        std::{sync::atomic::AtomicUsize, time::Duration},
        tokio::sync::Notify,
        vindexer_common::{ContractState, Error, Message, MessageBody, MethodResult, StackEntry},
        vindexer_ledger::MockLedgerClient,
        vindexer_store::{traits::MockVoteStore, MemoryStore},
    };

    const CONTRACT: &str = "EQvoting";

    fn vote_body(poll_id: u64, option_index: u32) -> MessageBody {
        let mut data = 1_073_741_822u32.to_be_bytes().to_vec();
        data.extend_from_slice(&poll_id.to_be_bytes());
        data.extend_from_slice(&option_index.to_be_bytes());
        MessageBody::from_bytes(data)
    }

    fn tx(lt: u64, voter: &str, body: Option<MessageBody>) -> Transaction {
        Transaction {
            lt,
            hash: format!("{:064x}", lt),
            now: 1_700_000_000 + lt as i64,
            in_message: Some(Message {
                source: Some(voter.to_string()),
                destination: Some(CONTRACT.to_string()),
                value: 50_000_000,
                body,
            }),
            out_messages: Vec::new(),
        }
    }

    fn contract_state(lt: u64) -> ContractState {
        ContractState {
            state: "active".to_string(),
            balance: 1_000_000_000,
            last_transaction_lt: Some(lt),
            last_transaction_hash: Some("aa".repeat(32)),
        }
    }

    fn config() -> PollConfig {
        PollConfig {
            page_size: 50,
            poll_interval_ms: 10,
            error_backoff_ms: 20,
            record_events: false,
            start_from_latest: false,
            startup_check_attempts: 1,
            startup_check_interval_ms: 10,
        }
    }

    fn indexer(ledger: MockLedgerClient, store: Arc<dyn VoteStore>, config: PollConfig) -> Arc<VoteIndexer> {
        Arc::new(VoteIndexer::new(
            CONTRACT,
            config,
            WireSchema::v1(),
            Arc::new(ledger),
            store,
        ))
    }

    #[tokio::test]
    async fn test_cycle_processes_in_lt_order() {
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_transactions()
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    tx(5, "EQa", Some(vote_body(1, 0))),
                    tx(2, "EQb", Some(vote_body(1, 1))),
                    tx(8, "EQc", Some(vote_body(1, 0))),
                ])
            });

        let mut store = MockVoteStore::new();
        let mut seq = Sequence::new();
        store.expect_last_processed_lt().returning(|| Ok(None));
        for lt in [2u64, 5, 8] {
            store
                .expect_record_vote()
                .withf(move |vote| vote.lt == lt)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
            store
                .expect_advance_watermark()
                .with(eq(lt))
                .times(1)
                .in_sequence(&mut seq)
                .returning(|lt| Ok(lt));
        }

        let report = indexer(ledger, Arc::new(store), config())
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(report.fetched, 3);
        assert_eq!(report.processed, 3);
        assert_eq!(report.votes, 3);
        assert_eq!(report.watermark, 8);
    }

    #[tokio::test]
    async fn test_resume_fetches_above_watermark() {
        let store = Arc::new(MemoryStore::new());
        store.reset_watermark(8).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_transactions()
            .withf(|address, query| address == CONTRACT && query.from_lt == 8 && query.limit == 50)
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    tx(9, "EQnew", Some(vote_body(4, 1))),
                    tx(8, "EQold", Some(vote_body(4, 0))),
                ])
            });

        let report = indexer(ledger, store.clone(), config()).run_cycle().await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(store.last_processed_lt().await.unwrap(), Some(9));

        let votes = store.votes_for_poll(4, Default::default()).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].voter_address, "EQnew");
    }

    #[tokio::test]
    async fn test_reindexing_same_transaction_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_transactions()
            .times(2)
            .returning(|_, _| Ok(vec![tx(3, "EQvoter", Some(vote_body(2, 1)))]));
        let indexer = indexer(ledger, store.clone(), config());

        indexer.run_cycle().await.unwrap();
        let first = store.votes_for_voter("EQvoter").await.unwrap();

        store.reset_watermark(0).await.unwrap();
        indexer.run_cycle().await.unwrap();
        let second = store.votes_for_voter("EQvoter").await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(first[0].created_at, second[0].created_at);
        assert_eq!(second[0].option_index, 1);
    }

    #[tokio::test]
    async fn test_undecodable_bodies_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = MockLedgerClient::new();
        ledger.expect_get_transactions().returning(|_, _| {
            let mut short = vote_body(1, 1);
            short.bit_len = 40;
            Ok(vec![
                tx(1, "EQshort", Some(short)),
                tx(2, "EQtransfer", None),
                tx(3, "EQother", Some(MessageBody::from_bytes(vec![0, 0, 0, 0, 0x68, 0x69]))),
                tx(4, "EQvalid", Some(vote_body(1, 2))),
            ])
        });

        let report = indexer(ledger, store.clone(), config()).run_cycle().await.unwrap();
        assert_eq!(report.processed, 4);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.votes, 1);
        assert_eq!(store.last_processed_lt().await.unwrap(), Some(4));
        assert_eq!(store.vote_count(), 1);
    }

    #[tokio::test]
    async fn test_ledger_error_leaves_watermark() {
        let store = Arc::new(MemoryStore::new());
        store.reset_watermark(11).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_transactions()
            .returning(|_, _| Err(Error::Network("connection reset".to_string())));

        let result = indexer(ledger, store.clone(), config()).run_cycle().await;
        assert!(matches!(result, Err(Error::Network(_))));
        assert_eq!(store.last_processed_lt().await.unwrap(), Some(11));
    }

    #[tokio::test]
    async fn test_start_from_latest_seeds_watermark() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_contract_state()
            .times(1)
            .returning(|_| Ok(contract_state(100)));
        ledger
            .expect_get_transactions()
            .withf(|_, query| query.from_lt == 100)
            .returning(|_, _| Ok(Vec::new()));

        let config = PollConfig {
            start_from_latest: true,
            ..config()
        };
        let report = indexer(ledger, store.clone(), config).run_cycle().await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.watermark, 100);
        assert_eq!(store.last_processed_lt().await.unwrap(), Some(100));
    }

    #[tokio::test]
    async fn test_outbound_messages_recorded_as_events() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = MockLedgerClient::new();
        ledger.expect_get_transactions().returning(|_, _| {
            let mut transaction = tx(6, "EQvoter", Some(vote_body(3, 0)));
            for body in [Some(MessageBody::from_bytes(vec![1, 2])), None] {
                transaction.out_messages.push(Message {
                    source: Some(CONTRACT.to_string()),
                    destination: None,
                    value: 0,
                    body,
                });
            }
            Ok(vec![transaction])
        });

        let config = PollConfig {
            record_events: true,
            ..config()
        };
        let indexer = indexer(ledger, store.clone(), config);
        let report = indexer.run_cycle().await.unwrap();
        assert_eq!(report.events, 1);

        // Replaying the same page does not duplicate events
        store.reset_watermark(0).await.unwrap();
        indexer.run_cycle().await.unwrap();

        let events = store.recent_events(10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].raw_data, "0102");
        assert_eq!(events[0].message_type, "event");
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_ends_loop() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_contract_state()
            .returning(|_| Ok(contract_state(1)));
        ledger
            .expect_get_transactions()
            .returning(|_, _| Ok(Vec::new()));

        let indexer = indexer(ledger, store, config());
        assert_eq!(indexer.state(), IndexerState::Stopped);

        assert!(indexer.start());
        assert!(!indexer.start());
        assert_eq!(indexer.state(), IndexerState::Running);
        assert!(indexer.status().await.unwrap().is_indexing);

        assert!(indexer.stop());
        assert!(!indexer.stop());
        indexer.join().await;
        assert_eq!(indexer.state(), IndexerState::Stopped);
        assert!(!indexer.status().await.unwrap().is_indexing);
    }

    #[tokio::test]
    async fn test_restart_from_lt_lowers_watermark_and_starts() {
        let store = Arc::new(MemoryStore::new());
        store.reset_watermark(500).await.unwrap();

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_contract_state()
            .returning(|_| Ok(contract_state(500)));
        ledger
            .expect_get_transactions()
            .returning(|_, _| Ok(Vec::new()));

        let indexer = indexer(ledger, store.clone(), config());
        indexer.restart_from_lt(120).await.unwrap();

        assert_eq!(indexer.state(), IndexerState::Running);
        assert_eq!(store.last_processed_lt().await.unwrap(), Some(120));

        indexer.stop();
        indexer.join().await;
    }

    /// Holds its first `get_transactions` call until released, then answers
    /// with a vote at lt 510. Later calls see an empty history.
    #[derive(Default)]
    struct HeldLedger {
        entered: Notify,
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LedgerClient for HeldLedger {
        async fn get_contract_state(&self, _address: &str) -> Result<ContractState> {
            Ok(contract_state(510))
        }

        async fn get_transactions(&self, _address: &str, _query: TransactionQuery) -> Result<Vec<Transaction>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
                return Ok(Vec::new());
            }
            self.entered.notify_one();
            self.release.notified().await;
            Ok(vec![tx(510, "EQlate", Some(vote_body(1, 0)))])
        }

        async fn call_readonly_method(
            &self,
            _address: &str,
            method: &str,
            _args: Vec<StackEntry>,
        ) -> Result<MethodResult> {
            Err(Error::Contract {
                method: method.to_string(),
                exit_code: 11,
            })
        }
    }

    #[tokio::test]
    async fn test_reindex_during_cycle_keeps_override() {
        let store = Arc::new(MemoryStore::new());
        store.reset_watermark(500).await.unwrap();
        let ledger = Arc::new(HeldLedger::default());
        let indexer = Arc::new(VoteIndexer::new(
            CONTRACT,
            config(),
            WireSchema::v1(),
            ledger.clone(),
            store.clone(),
        ));

        let cycle = tokio::spawn({
            let indexer = indexer.clone();
            async move { indexer.run_cycle().await }
        });
        ledger.entered.notified().await;

        indexer.restart_from_lt(120).await.unwrap();
        ledger.release.notify_one();

        let report = cycle.await.unwrap().unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(report.processed, 0);

        indexer.stop();
        indexer.join().await;
        assert_eq!(store.last_processed_lt().await.unwrap(), Some(120));
    }

    #[tokio::test]
    async fn test_loop_recovers_after_failed_cycle() {
        let store = Arc::new(MemoryStore::new());
        let fetched_at = Arc::new(Mutex::new(Vec::new()));

        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_contract_state()
            .returning(|_| Ok(contract_state(3)));
        let calls = AtomicUsize::new(0);
        let times = fetched_at.clone();
        ledger.expect_get_transactions().returning(move |_, _| {
            times.lock().unwrap().push(Instant::now());
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(Error::Network("connection reset".to_string())),
                1 => Ok(vec![tx(3, "EQvoter", Some(vote_body(2, 1)))]),
                _ => Ok(Vec::new()),
            }
        });

        let indexer = indexer(ledger, store.clone(), config());
        indexer.start();

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.last_processed_lt().await.unwrap() != Some(3) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loop never retried after the failed cycle");

        assert_eq!(indexer.state(), IndexerState::Running);
        assert_eq!(store.vote_count(), 1);

        indexer.stop();
        indexer.join().await;

        // the retry waited out the error backoff, not the poll interval
        let times = fetched_at.lock().unwrap().clone();
        assert!(times.len() >= 2);
        assert!(times[1] - times[0] >= config().error_backoff());
    }

    #[tokio::test]
    async fn test_status_reports_progress() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = MockLedgerClient::new();
        ledger
            .expect_get_transactions()
            .returning(|_, _| Ok(vec![tx(7, "EQv", Some(vote_body(1, 1)))]));

        let indexer = indexer(ledger, store, config());
        indexer.run_cycle().await.unwrap();

        let status = indexer.status().await.unwrap();
        assert_eq!(status.state, IndexerState::Stopped);
        assert_eq!(status.progress.last_processed_lt, 7);
        assert_eq!(status.progress.processed_transactions, 1);
        assert_eq!(status.progress.indexed_votes, 1);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isIndexing"], false);
        assert_eq!(json["lastProcessedLt"], 7);
        assert_eq!(json["state"], "stopped");
    }
}
