use {
    lazy_static::lazy_static,
    prometheus::{
        register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter,
        IntGauge,
    },
};

lazy_static! {
    pub static ref TRANSACTIONS_PROCESSED: IntCounter = register_int_counter!(
        "vindexer_transactions_processed",
        "Number of contract transactions processed"
    )
    .expect("register vindexer_transactions_processed");

    pub static ref VOTES_INDEXED: IntCounter =
        register_int_counter!("vindexer_votes_indexed", "Number of votes written to the store")
            .expect("register vindexer_votes_indexed");

    pub static ref DECODE_SKIPS: IntCounter = register_int_counter!(
        "vindexer_decode_skips",
        "Inbound messages skipped because their body did not decode"
    )
    .expect("register vindexer_decode_skips");

    pub static ref EVENTS_RECORDED: IntCounter =
        register_int_counter!("vindexer_events_recorded", "Number of outbound messages recorded")
            .expect("register vindexer_events_recorded");

    pub static ref CYCLE_ERRORS: IntCounter =
        register_int_counter!("vindexer_cycle_errors", "Poll cycles that ended in an error")
            .expect("register vindexer_cycle_errors");

    pub static ref LAST_PROCESSED_LT: IntGauge =
        register_int_gauge!("vindexer_last_processed_lt", "Current resume watermark")
            .expect("register vindexer_last_processed_lt");

    pub static ref CYCLE_DURATION: Histogram = register_histogram!(
        "vindexer_cycle_duration_seconds",
        "Wall time of one poll cycle"
    )
    .expect("register vindexer_cycle_duration_seconds");
}

pub fn record_cycle(transactions: u64, votes: u64, skipped: u64) {
    TRANSACTIONS_PROCESSED.inc_by(transactions);
    VOTES_INDEXED.inc_by(votes);
    DECODE_SKIPS.inc_by(skipped);
}

pub fn set_watermark(lt: u64) {
    LAST_PROCESSED_LT.set(i64::try_from(lt).unwrap_or(i64::MAX));
}
