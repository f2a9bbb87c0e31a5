use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractState {
    /// `active`, `uninitialized` or `frozen`
    pub state: String,
    pub balance: u64,
    pub last_transaction_lt: Option<u64>,
    pub last_transaction_hash: Option<String>,
}

/// A getter argument or return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StackEntry {
    Int(i128),
    Cell(String),
    Slice(String),
    Other(serde_json::Value),
}

impl StackEntry {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            StackEntry::Int(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodResult {
    pub exit_code: i32,
    pub stack: Vec<StackEntry>,
}

impl MethodResult {
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 || self.exit_code == 1
    }
}
