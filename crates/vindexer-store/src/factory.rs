use {
    crate::{memory_store::MemoryStore, postgres_store::PostgresStore, traits::VoteStore},
    std::sync::Arc,
    tracing::info,
    vindexer_common::{Result, StoreBackend, StoreConfig},
};

/// Builds the configured `VoteStore` backend
pub struct StoreFactory {
    config: StoreConfig,
}

impl StoreFactory {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub async fn create_store(&self) -> Result<Arc<dyn VoteStore>> {
        self.config.validate()?;

        match self.config.backend {
            StoreBackend::Memory => {
                info!("Using in-memory vote store; data is lost on restart");
                Ok(Arc::new(MemoryStore::new()))
            }
            StoreBackend::Postgres => {
                let store = PostgresStore::new(self.config.clone()).await?;
                Ok(Arc::new(store))
            }
        }
    }
}
