//! This is the vindexer-store crate - persistence for indexed votes

pub mod factory;
pub mod memory_store;
pub mod postgres_store;
pub mod traits;

pub use factory::StoreFactory;
pub use memory_store::MemoryStore;
pub use postgres_store::PostgresStore;
pub use traits::{ClaimOutcome, VoteStore};

#[cfg(test)]
pub(crate) mod conformance;
