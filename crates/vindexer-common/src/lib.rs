pub mod config;
pub mod errors;
pub mod types;
pub mod utils;

pub use config::{IndexerConfig, LedgerConfig, PollConfig, StoreBackend, StoreConfig, WireSchema};
pub use errors::{Error, Result};
pub use types::*;
