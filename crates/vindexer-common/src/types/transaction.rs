use serde::{Deserialize, Serialize};

/// A message body as a bit string. Only whole bytes are stored; `bit_len`
/// says how many leading bits of `data` are meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub data: Vec<u8>,
    pub bit_len: usize,
}

impl MessageBody {
    pub fn new(data: Vec<u8>, bit_len: usize) -> Self {
        let bit_len = bit_len.min(data.len() * 8);
        Self { data, bit_len }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        let bit_len = data.len() * 8;
        Self { data, bit_len }
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Canonical sender address; absent for external inbound messages
    pub source: Option<String>,
    pub destination: Option<String>,
    /// Attached value in nano units
    pub value: u64,
    pub body: Option<MessageBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Logical time, monotonic within the account
    pub lt: u64,
    /// Lowercase hex transaction hash
    pub hash: String,
    /// Block timestamp in unix seconds
    pub now: i64,
    pub in_message: Option<Message>,
    #[serde(default)]
    pub out_messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_len_is_clamped_to_data() {
        let body = MessageBody::new(vec![0xff, 0x00], 40);
        assert_eq!(body.bit_len, 16);
        assert_eq!(body.to_hex(), "ff00");
        assert!(!body.is_empty());
        assert!(MessageBody::from_bytes(Vec::new()).is_empty());
    }
}
