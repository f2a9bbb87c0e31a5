//! vindexer-ledger - read access to the chain for the vote indexer
//!
//! The indexer only ever talks to the chain through [`LedgerClient`]; the
//! toncenter implementation is the one used in production.

mod history;
pub mod toncenter;

pub use toncenter::TonCenterClient;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    vindexer_common::{ContractState, MethodResult, Result, StackEntry, Transaction},
};

/// Window of account history to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionQuery {
    /// Transactions per upstream request
    pub limit: usize,
    /// Only transactions with a strictly greater logical time are wanted
    pub from_lt: u64,
}

impl TransactionQuery {
    pub fn new(limit: usize, from_lt: u64) -> Self {
        Self { limit, from_lt }
    }
}

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
    /// Account status, balance and latest transaction id.
    async fn get_contract_state(&self, address: &str) -> Result<ContractState>;

    /// Account history newer than `query.from_lt`. Implementations may
    /// return it newest-first; callers must not rely on any order.
    async fn get_transactions(&self, address: &str, query: TransactionQuery) -> Result<Vec<Transaction>>;

    /// Runs a getter. A non-zero exit code is reported as `Error::Contract`.
    async fn call_readonly_method(
        &self,
        address: &str,
        method: &str,
        args: Vec<StackEntry>,
    ) -> Result<MethodResult>;
}
