use {
    crate::traits::{ClaimOutcome, VoteStore, WATERMARK_KEY},
    async_trait::async_trait,
    rust_decimal::{prelude::ToPrimitive, Decimal},
    sqlx::{
        postgres::{PgArguments, PgPool, PgPoolOptions, PgRow},
        Row,
    },
    std::time::Duration,
    tracing::{debug, info},
    vindexer_common::{
        Error, EventRecord, Pagination, PollStats, Result, StoreConfig, VoteRecord,
    },
};

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, PgArguments>;

const UNIQUE_VIOLATION: &str = "23505";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS votes (
        poll_id NUMERIC(20, 0) NOT NULL,
        voter_address TEXT NOT NULL,
        option_index NUMERIC(20, 0) NOT NULL,
        voted_at TIMESTAMP WITH TIME ZONE NOT NULL,
        transaction_hash TEXT NOT NULL,
        lt NUMERIC(20, 0) NOT NULL,
        reward_claimed BOOLEAN NOT NULL DEFAULT FALSE,
        reward_amount NUMERIC,
        claim_transaction_hash TEXT,
        claimed_at TIMESTAMP WITH TIME ZONE,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
        indexed_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (poll_id, voter_address)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS votes_voter_idx ON votes(voter_address)",
    "CREATE INDEX IF NOT EXISTS votes_voted_at_idx ON votes(voted_at DESC)",
    "CREATE INDEX IF NOT EXISTS votes_lt_idx ON votes(lt DESC)",
    "CREATE INDEX IF NOT EXISTS votes_reward_claimed_idx ON votes(reward_claimed)",
    r#"
    CREATE TABLE IF NOT EXISTS events (
        transaction_hash TEXT NOT NULL,
        message_index INTEGER NOT NULL,
        lt NUMERIC(20, 0) NOT NULL,
        event_time TIMESTAMP WITH TIME ZONE NOT NULL,
        message_type TEXT NOT NULL,
        raw_data TEXT NOT NULL,
        created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (transaction_hash, message_index)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS events_lt_idx ON events(lt DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS indexer_meta (
        id TEXT PRIMARY KEY,
        value NUMERIC(20, 0) NOT NULL,
        updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
];

const VOTE_COLUMNS: &str = "poll_id, voter_address, option_index, voted_at, transaction_hash, lt, \
     reward_claimed, reward_amount, claim_transaction_hash, claimed_at, created_at, indexed_at";

/// PostgreSQL storage implementation
pub struct PostgresStore {
    config: StoreConfig,
    pool: PgPool,
}

fn db_error(e: sqlx::Error) -> Error {
    Error::Storage(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION))
}

fn to_u64(value: Decimal, column: &str) -> Result<u64> {
    value
        .to_u64()
        .ok_or_else(|| Error::Storage(format!("{} out of range: {}", column, value)))
}

fn vote_from_row(row: &PgRow) -> Result<VoteRecord> {
    Ok(VoteRecord {
        poll_id: to_u64(row.try_get("poll_id").map_err(db_error)?, "poll_id")?,
        voter_address: row.try_get("voter_address").map_err(db_error)?,
        option_index: to_u64(row.try_get("option_index").map_err(db_error)?, "option_index")?,
        timestamp: row.try_get("voted_at").map_err(db_error)?,
        transaction_hash: row.try_get("transaction_hash").map_err(db_error)?,
        lt: to_u64(row.try_get("lt").map_err(db_error)?, "lt")?,
        reward_claimed: row.try_get("reward_claimed").map_err(db_error)?,
        reward_amount: row.try_get("reward_amount").map_err(db_error)?,
        claim_transaction_hash: row.try_get("claim_transaction_hash").map_err(db_error)?,
        claimed_at: row.try_get("claimed_at").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
        indexed_at: row.try_get("indexed_at").map_err(db_error)?,
    })
}

fn event_from_row(row: &PgRow) -> Result<EventRecord> {
    Ok(EventRecord {
        transaction_hash: row.try_get("transaction_hash").map_err(db_error)?,
        message_index: row.try_get::<i32, _>("message_index").map_err(db_error)? as u32,
        lt: to_u64(row.try_get("lt").map_err(db_error)?, "lt")?,
        timestamp: row.try_get("event_time").map_err(db_error)?,
        message_type: row.try_get("message_type").map_err(db_error)?,
        raw_data: row.try_get("raw_data").map_err(db_error)?,
        created_at: row.try_get("created_at").map_err(db_error)?,
    })
}

impl PostgresStore {
    pub async fn new(config: StoreConfig) -> Result<Self> {
        let url = config
            .database_url
            .clone()
            .ok_or_else(|| Error::Config("database_url is not configured".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&url)
            .await
            .map_err(db_error)?;

        let store = Self { config, pool };

        if store.config.create_tables {
            store.initialize_schema().await?;
        }

        info!("Connected to PostgreSQL vote store");
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        }
        debug!("Vote store schema ready");
        Ok(())
    }

    async fn fetch_votes(&self, query: PgQuery<'_>) -> Result<Vec<VoteRecord>> {
        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
        rows.iter().map(vote_from_row).collect()
    }
}

#[async_trait]
impl VoteStore for PostgresStore {
    async fn record_vote(&self, vote: VoteRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO votes (
                poll_id, voter_address, option_index, voted_at, transaction_hash, lt,
                reward_claimed, reward_amount, created_at, indexed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (poll_id, voter_address)
            DO UPDATE SET
                option_index = EXCLUDED.option_index,
                voted_at = EXCLUDED.voted_at,
                transaction_hash = EXCLUDED.transaction_hash,
                lt = EXCLUDED.lt
            WHERE votes.lt <= EXCLUDED.lt
            "#,
        )
        .bind(Decimal::from(vote.poll_id))
        .bind(&vote.voter_address)
        .bind(Decimal::from(vote.option_index))
        .bind(vote.timestamp)
        .bind(&vote.transaction_hash)
        .bind(Decimal::from(vote.lt))
        .bind(vote.reward_claimed)
        .bind(vote.reward_amount)
        .bind(vote.created_at)
        .bind(vote.indexed_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // A concurrent writer already inserted the same key
            Err(e) if is_unique_violation(&e) => {
                debug!("Vote {}/{} already stored", vote.poll_id, vote.voter_address);
                Ok(())
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn votes_for_poll(&self, poll_id: u64, page: Pagination) -> Result<Vec<VoteRecord>> {
        let (offset, limit) = match page.window() {
            Some((offset, limit)) => (offset as i64, Some(limit as i64)),
            None => (0, None),
        };
        let sql = format!(
            "SELECT {} FROM votes WHERE poll_id = $1 ORDER BY lt ASC LIMIT $2 OFFSET $3",
            VOTE_COLUMNS
        );
        self.fetch_votes(
            sqlx::query(&sql)
                .bind(Decimal::from(poll_id))
                .bind(limit)
                .bind(offset),
        )
        .await
    }

    async fn votes_for_voter(&self, voter_address: &str) -> Result<Vec<VoteRecord>> {
        let sql = format!(
            "SELECT {} FROM votes WHERE voter_address = $1 ORDER BY voted_at DESC, lt DESC",
            VOTE_COLUMNS
        );
        self.fetch_votes(sqlx::query(&sql).bind(voter_address)).await
    }

    async fn unclaimed_rewards(&self, voter_address: &str) -> Result<Vec<VoteRecord>> {
        let sql = format!(
            "SELECT {} FROM votes \
             WHERE voter_address = $1 AND reward_claimed = FALSE AND reward_amount > 0 \
             ORDER BY voted_at DESC, lt DESC",
            VOTE_COLUMNS
        );
        self.fetch_votes(sqlx::query(&sql).bind(voter_address)).await
    }

    async fn mark_reward_claimed(
        &self,
        poll_id: u64,
        voter_address: &str,
        claim_transaction_hash: &str,
    ) -> Result<ClaimOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let claimed: Option<bool> = sqlx::query_scalar(
            "SELECT reward_claimed FROM votes WHERE poll_id = $1 AND voter_address = $2 FOR UPDATE",
        )
        .bind(Decimal::from(poll_id))
        .bind(voter_address)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let outcome = match claimed {
            None => ClaimOutcome::NotFound,
            Some(true) => ClaimOutcome::AlreadyClaimed,
            Some(false) => {
                sqlx::query(
                    r#"
                    UPDATE votes
                    SET reward_claimed = TRUE,
                        claim_transaction_hash = $3,
                        claimed_at = CURRENT_TIMESTAMP
                    WHERE poll_id = $1 AND voter_address = $2
                    "#,
                )
                .bind(Decimal::from(poll_id))
                .bind(voter_address)
                .bind(claim_transaction_hash)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
                ClaimOutcome::Claimed
            }
        };

        tx.commit().await.map_err(db_error)?;
        Ok(outcome)
    }

    async fn set_reward_amount(&self, poll_id: u64, voter_address: &str, amount: Decimal) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE votes SET reward_amount = $3 WHERE poll_id = $1 AND voter_address = $2",
        )
        .bind(Decimal::from(poll_id))
        .bind(voter_address)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn poll_stats(&self, poll_id: u64) -> Result<PollStats> {
        let rows = sqlx::query(
            r#"
            SELECT option_index, COUNT(*) AS votes
            FROM votes
            WHERE poll_id = $1
            GROUP BY option_index
            "#,
        )
        .bind(Decimal::from(poll_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut stats = PollStats::from_options(poll_id, std::iter::empty());
        for row in rows {
            let option = to_u64(row.try_get("option_index").map_err(db_error)?, "option_index")?;
            let votes = row.try_get::<i64, _>("votes").map_err(db_error)? as u64;
            stats.vote_breakdown.insert(option, votes);
            stats.total_votes += votes;
        }
        Ok(stats)
    }

    async fn recent_votes(&self, limit: usize) -> Result<Vec<VoteRecord>> {
        let sql = format!("SELECT {} FROM votes ORDER BY lt DESC LIMIT $1", VOTE_COLUMNS);
        self.fetch_votes(sqlx::query(&sql).bind(limit as i64)).await
    }

    async fn record_event(&self, event: EventRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (
                transaction_hash, message_index, lt, event_time, message_type, raw_data, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (transaction_hash, message_index) DO NOTHING
            "#,
        )
        .bind(&event.transaction_hash)
        .bind(event.message_index as i32)
        .bind(Decimal::from(event.lt))
        .bind(event.timestamp)
        .bind(&event.message_type)
        .bind(&event.raw_data)
        .bind(event.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT transaction_hash, message_index, lt, event_time, message_type, raw_data, created_at
            FROM events
            ORDER BY lt DESC, message_index ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.iter().map(event_from_row).collect()
    }

    async fn last_processed_lt(&self) -> Result<Option<u64>> {
        let value: Option<Decimal> = sqlx::query_scalar("SELECT value FROM indexer_meta WHERE id = $1")
            .bind(WATERMARK_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        value.map(|lt| to_u64(lt, "watermark")).transpose()
    }

    async fn advance_watermark(&self, lt: u64) -> Result<u64> {
        let value: Decimal = sqlx::query_scalar(
            r#"
            INSERT INTO indexer_meta (id, value, updated_at)
            VALUES ($1, $2, CURRENT_TIMESTAMP)
            ON CONFLICT (id)
            DO UPDATE SET
                value = GREATEST(indexer_meta.value, EXCLUDED.value),
                updated_at = CURRENT_TIMESTAMP
            RETURNING value
            "#,
        )
        .bind(WATERMARK_KEY)
        .bind(Decimal::from(lt))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        to_u64(value, "watermark")
    }

    async fn reset_watermark(&self, lt: u64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO indexer_meta (id, value, updated_at)
            VALUES ($1, $2, CURRENT_TIMESTAMP)
            ON CONFLICT (id)
            DO UPDATE SET value = EXCLUDED.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(WATERMARK_KEY)
        .bind(Decimal::from(lt))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        info!("Watermark reset to {}", lt);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
