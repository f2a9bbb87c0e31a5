use {
    crate::types::{HealthCheckResult, HealthResponse, HealthStatus},
    std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Instant},
    tokio::sync::RwLock,
    vindexer_ledger::LedgerClient,
    vindexer_store::VoteStore,
};

pub type HealthCheckFuture = Pin<Box<dyn Future<Output = HealthCheckResult> + Send>>;
pub type HealthCheckFn = Arc<dyn Fn() -> HealthCheckFuture + Send + Sync>;

/// Named async health checks, run on every `/health` request.
pub struct HealthService {
    checks: RwLock<HashMap<String, HealthCheckFn>>,
    start_time: Instant,
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            checks: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub async fn register(&self, name: &str, check: HealthCheckFn) {
        let mut checks = self.checks.write().await;
        checks.insert(name.to_string(), check);
    }

    pub async fn unregister(&self, name: &str) {
        self.checks.write().await.remove(name);
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn check_all(&self) -> HealthResponse {
        let checks: Vec<(String, HealthCheckFn)> = {
            let checks = self.checks.read().await;
            checks.iter().map(|(name, check)| (name.clone(), check.clone())).collect()
        };

        let mut results = HashMap::new();
        let mut all_healthy = true;
        let mut any_healthy = false;

        for (name, check) in checks {
            let result = check().await;
            match result.status {
                HealthStatus::Healthy => any_healthy = true,
                HealthStatus::Degraded => {
                    all_healthy = false;
                    any_healthy = true;
                }
                HealthStatus::Unhealthy => all_healthy = false,
            }
            results.insert(name, result);
        }

        let status = if all_healthy {
            HealthStatus::Healthy
        } else if any_healthy {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        HealthResponse {
            status,
            checks: results,
            uptime: self.uptime(),
        }
    }

    /// Registers the two dependencies the indexer cannot work without.
    pub async fn register_defaults(
        &self,
        store: Arc<dyn VoteStore>,
        ledger: Arc<dyn LedgerClient>,
        contract_address: String,
    ) {
        self.register(
            "store",
            Arc::new(move || {
                let store = store.clone();
                Box::pin(async move {
                    match store.ping().await {
                        Ok(()) => HealthCheckResult::healthy("Store reachable"),
                        Err(e) => HealthCheckResult::unhealthy(e.to_string()),
                    }
                }) as HealthCheckFuture
            }),
        )
        .await;

        self.register(
            "ledger",
            Arc::new(move || {
                let ledger = ledger.clone();
                let address = contract_address.clone();
                Box::pin(async move {
                    match ledger.get_contract_state(&address).await {
                        Ok(state) => HealthCheckResult::healthy(format!(
                            "Contract {} at lt {}",
                            state.state,
                            state.last_transaction_lt.unwrap_or(0)
                        )),
                        Err(e) => HealthCheckResult::unhealthy(e.to_string()),
                    }
                }) as HealthCheckFuture
            }),
        )
        .await;
    }
}
