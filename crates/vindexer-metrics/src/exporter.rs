use {
    prometheus::{Encoder, TextEncoder},
    vindexer_common::{Error, Result},
};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Renders every registered metric in the Prometheus text format.
pub fn gather_text() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Other(format!("metrics encoding failed: {}", e)))?;
    String::from_utf8(buffer).map_err(|e| Error::Other(format!("metrics are not utf-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use {super::*, crate::metrics};

    #[test]
    fn test_gather_includes_indexer_metrics() {
        metrics::record_cycle(3, 2, 1);
        metrics::set_watermark(42);
        metrics::CYCLE_ERRORS.inc();

        let text = gather_text().unwrap();
        assert!(text.contains("vindexer_transactions_processed"));
        assert!(text.contains("vindexer_votes_indexed"));
        assert!(text.contains("vindexer_decode_skips"));
        assert!(text.contains("vindexer_cycle_errors"));
        assert!(text.contains("vindexer_last_processed_lt 42"));
    }
}
