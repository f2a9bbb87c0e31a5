// crates/vindexer-ledger/src/toncenter.rs

use {
    crate::{
        history::{HistoryTrail, Plan, TxCursor},
        LedgerClient, TransactionQuery,
    },
    async_trait::async_trait,
    reqwest::Client,
    serde::{de::DeserializeOwned, Deserialize},
    serde_json::{json, Value},
    std::{
        collections::HashMap,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tonlib_core::cell::BagOfCells,
    tracing::{debug, info},
    vindexer_common::{
        ContractState, Error, LedgerConfig, Message, MessageBody, MethodResult, Result,
        StackEntry, Transaction,
    },
};

/// Largest page the upstream serves per `getTransactions` call.
pub const MAX_PAGE_SIZE: usize = 100;

/// toncenter v2 JSON-RPC client
#[derive(Debug, Clone)]
pub struct TonCenterClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
    max_pages: usize,
    trails: Arc<Mutex<HashMap<String, HistoryTrail>>>,
}

/// One page of history with its boundaries.
struct Page {
    start: TxCursor,
    next: Option<TxCursor>,
    transactions: Vec<Transaction>,
}

impl Page {
    fn above(self, from_lt: u64) -> Vec<Transaction> {
        self.transactions
            .into_iter()
            .filter(|tx| tx.lt > from_lt)
            .collect()
    }
}

/// toncenter response envelope
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
    code: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawTransactionId {
    lt: String,
    hash: String,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    #[serde(default)]
    utime: i64,
    transaction_id: RawTransactionId,
    in_msg: Option<RawMessage>,
    #[serde(default)]
    out_msgs: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    source: String,
    #[serde(default)]
    destination: String,
    #[serde(default)]
    value: String,
    msg_data: Option<RawMessageData>,
}

#[derive(Debug, Deserialize)]
struct RawMessageData {
    #[serde(rename = "@type")]
    kind: String,
    body: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAddressInformation {
    balance: Value,
    state: String,
    last_transaction_id: Option<RawTransactionId>,
}

#[derive(Debug, Deserialize)]
struct RawGetMethodResult {
    exit_code: i32,
    #[serde(default)]
    stack: Vec<Value>,
}

impl TonCenterClient {
    pub fn new(config: &LedgerConfig) -> Self {
        info!("Initializing ledger client for {}", config.endpoint);

        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout_duration(),
            max_pages: config.max_pages.max(1),
            trails: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&json!({
                "id": 1,
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
            }));
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} request failed: {}", method, e)))?;
        let status = response.status();

        let body: RpcResponse<T> = response.json().await.map_err(|e| {
            Error::Rpc(format!("{} returned an unreadable response ({}): {}", method, status, e))
        })?;

        if !body.ok {
            return Err(Error::Rpc(format!(
                "{} failed (code {}): {}",
                method,
                body.code.unwrap_or_else(|| i64::from(status.as_u16())),
                body.error.unwrap_or_else(|| status.to_string())
            )));
        }

        body.result
            .ok_or_else(|| Error::Rpc(format!("{} returned no result", method)))
    }

    async fn walk_history(
        &self,
        address: &str,
        trail: &mut HistoryTrail,
        from_lt: u64,
        limit: usize,
    ) -> Result<Vec<Transaction>> {
        let mut cursor = match trail.plan(from_lt, limit) {
            Plan::Replay(start) => {
                let page = self.fetch_page(address, Some(&start), limit).await?;
                return Ok(page.map(|page| page.above(from_lt)).unwrap_or_default());
            }
            Plan::Resume(next) => Some(next),
            Plan::Restart => {
                *trail = HistoryTrail::new(limit);
                None
            }
        };

        for _ in 0..self.max_pages {
            let Some(page) = self.fetch_page(address, cursor.as_ref(), limit).await? else {
                *trail = HistoryTrail::new(limit);
                return Ok(Vec::new());
            };
            trail.push_page(page.start.clone(), page.next.clone());
            if trail.covers(from_lt) {
                return Ok(page.above(from_lt));
            }
            cursor = page.next;
        }

        info!(
            "History walk for {} paused at lt {}, continuing next poll",
            address,
            cursor.map_or(0, |next| next.lt)
        );
        Ok(Vec::new())
    }

    /// `limit` transactions starting at `start` (inclusive) or at the newest
    /// one. One extra is requested to learn where the following page starts.
    async fn fetch_page(&self, address: &str, start: Option<&TxCursor>, limit: usize) -> Result<Option<Page>> {
        let mut params = json!({
            "address": address,
            "limit": limit + 1,
            "archival": true,
        });
        if let Some(cursor) = start {
            params["lt"] = json!(cursor.lt.to_string());
            params["hash"] = json!(cursor.hash);
        }

        let raw: Vec<RawTransaction> = self.rpc("getTransactions", params).await?;
        let mut entries = Vec::with_capacity(raw.len());
        for tx in raw {
            let cursor = TxCursor {
                lt: parse_u64(&tx.transaction_id.lt, "lt")?,
                hash: tx.transaction_id.hash.clone(),
            };
            entries.push((cursor, tx));
        }

        let next = entries.get(limit).map(|(cursor, _)| cursor.clone());
        entries.truncate(limit);
        let Some(start) = entries.first().map(|(cursor, _)| cursor.clone()) else {
            return Ok(None);
        };

        let transactions = entries
            .into_iter()
            .map(|(cursor, tx)| convert_transaction(tx, cursor.lt))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Page {
            start,
            next,
            transactions,
        }))
    }
}

#[async_trait]
impl LedgerClient for TonCenterClient {
    async fn get_contract_state(&self, address: &str) -> Result<ContractState> {
        let info: RawAddressInformation = self
            .rpc("getAddressInformation", json!({ "address": address }))
            .await?;

        // uninitialized accounts report a zero transaction id
        let (last_transaction_lt, last_transaction_hash) = match info.last_transaction_id {
            Some(id) => {
                let lt = parse_u64(&id.lt, "lt")?;
                if lt > 0 {
                    (Some(lt), Some(base64_to_hex(&id.hash)?))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        Ok(ContractState {
            state: info.state,
            balance: value_to_u64(&info.balance),
            last_transaction_lt,
            last_transaction_hash,
        })
    }

    /// Oldest page of history above `query.from_lt`, newest first. Each call
    /// makes at most `max_pages` upstream requests; a walk that needs more
    /// returns nothing and carries on at the next call.
    async fn get_transactions(&self, address: &str, query: TransactionQuery) -> Result<Vec<Transaction>> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE - 1);
        let mut trail = self
            .trails
            .lock()
            .ok()
            .and_then(|mut trails| trails.remove(address))
            .unwrap_or_else(|| HistoryTrail::new(limit));

        let result = self.walk_history(address, &mut trail, query.from_lt, limit).await;

        if let Ok(mut trails) = self.trails.lock() {
            trails.insert(address.to_string(), trail);
        }
        let transactions = result?;
        debug!(
            "Fetched {} transactions newer than lt {} for {}",
            transactions.len(),
            query.from_lt,
            address
        );
        Ok(transactions)
    }

    async fn call_readonly_method(
        &self,
        address: &str,
        method: &str,
        args: Vec<StackEntry>,
    ) -> Result<MethodResult> {
        let stack: Vec<Value> = args.iter().map(stack_entry_to_json).collect();
        let raw: RawGetMethodResult = self
            .rpc(
                "runGetMethod",
                json!({ "address": address, "method": method, "stack": stack }),
            )
            .await?;

        let result = MethodResult {
            exit_code: raw.exit_code,
            stack: raw.stack.into_iter().map(stack_entry_from_json).collect(),
        };
        if !result.is_success() {
            return Err(Error::Contract {
                method: method.to_string(),
                exit_code: result.exit_code,
            });
        }
        Ok(result)
    }
}

fn convert_transaction(raw: RawTransaction, lt: u64) -> Result<Transaction> {
    Ok(Transaction {
        lt,
        hash: base64_to_hex(&raw.transaction_id.hash)?,
        now: raw.utime,
        in_message: raw.in_msg.map(convert_message),
        out_messages: raw.out_msgs.into_iter().map(convert_message).collect(),
    })
}

fn convert_message(raw: RawMessage) -> Message {
    let body = raw.msg_data.and_then(|data| match data.kind.as_str() {
        "msg.dataRaw" => data.body.as_deref().and_then(|encoded| {
            body_from_boc(encoded)
                .map_err(|e| debug!("Skipping unreadable message body: {}", e))
                .ok()
        }),
        // text comments are a zero opcode followed by the text
        "msg.dataText" => data.text.as_deref().and_then(|encoded| {
            let text = base64::decode(encoded).ok()?;
            let mut bytes = vec![0u8; 4];
            bytes.extend_from_slice(&text);
            Some(MessageBody::from_bytes(bytes))
        }),
        _ => None,
    });

    Message {
        source: non_empty(raw.source),
        destination: non_empty(raw.destination),
        value: raw.value.parse().unwrap_or(0),
        body,
    }
}

/// Data bits of the root cell of a serialized bag of cells. References are
/// not followed.
fn body_from_boc(encoded: &str) -> Result<MessageBody> {
    let boc = BagOfCells::parse_base64(encoded)
        .map_err(|e| Error::Decode(format!("invalid bag of cells: {}", e)))?;
    let root = boc
        .single_root()
        .map_err(|e| Error::Decode(format!("no single root cell: {}", e)))?;
    Ok(MessageBody::new(root.data().to_vec(), root.bit_len()))
}

fn non_empty(address: String) -> Option<String> {
    (!address.is_empty()).then_some(address)
}

fn parse_u64(value: &str, field: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| Error::Rpc(format!("invalid {} value: {:?}", field, value)))
}

fn value_to_u64(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

fn base64_to_hex(encoded: &str) -> Result<String> {
    base64::decode(encoded)
        .map(hex::encode)
        .map_err(|e| Error::Rpc(format!("invalid transaction hash {:?}: {}", encoded, e)))
}

fn stack_entry_to_json(entry: &StackEntry) -> Value {
    match entry {
        StackEntry::Int(value) => json!(["num", value.to_string()]),
        StackEntry::Cell(boc) => json!(["tvm.Cell", boc]),
        StackEntry::Slice(boc) => json!(["tvm.Slice", boc]),
        StackEntry::Other(value) => value.clone(),
    }
}

fn stack_entry_from_json(value: Value) -> StackEntry {
    let parsed = value.as_array().and_then(|pair| match (pair.first()?.as_str()?, pair.get(1)?) {
        ("num", Value::String(number)) => parse_tvm_int(number).map(StackEntry::Int),
        ("cell", cell) => cell["bytes"].as_str().map(|b| StackEntry::Cell(b.to_string())),
        ("slice", slice) => slice["bytes"].as_str().map(|b| StackEntry::Slice(b.to_string())),
        _ => None,
    });
    parsed.unwrap_or(StackEntry::Other(value))
}

/// Getter integers come back as `0x..` hex, possibly negated.
fn parse_tvm_int(number: &str) -> Option<i128> {
    let (negative, digits) = match number.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, number),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    Some(if negative { -value } else { value })
}
