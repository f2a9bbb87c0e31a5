//! Page cursors remembered between `get_transactions` calls.
//!
//! The upstream only pages backwards from the newest transaction. Walking a
//! long history to the watermark would cost one request per page on every
//! poll, so the walk is spread over calls (at most `max_pages` requests
//! each) and the page boundaries it finds are kept. Once the watermark is
//! covered, the oldest unseen page is fetched straight from its cursor.

/// Upstream transaction id. The hash stays in the upstream's base64 form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCursor {
    pub lt: u64,
    pub hash: String,
}

/// Next request to make for a given watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Start a new walk at the newest transaction.
    Restart,
    /// Continue a paused walk from this cursor.
    Resume(TxCursor),
    /// The page starting at this cursor holds the oldest transactions above
    /// the watermark.
    Replay(TxCursor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTrail {
    limit: usize,
    /// First transaction of every fetched page, newest page first
    pages: Vec<TxCursor>,
    /// First transaction not fetched yet; `None` once the account's first
    /// transaction has been seen
    next: Option<TxCursor>,
}

impl HistoryTrail {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            pages: Vec::new(),
            next: None,
        }
    }

    /// True when every transaction above `from_lt` lies in a fetched page.
    pub fn covers(&self, from_lt: u64) -> bool {
        self.next.as_ref().map_or(true, |next| next.lt <= from_lt)
    }

    pub fn plan(&self, from_lt: u64, limit: usize) -> Plan {
        let head_lt = match self.pages.first() {
            Some(head) if self.limit == limit => head.lt,
            _ => return Plan::Restart,
        };
        if head_lt <= from_lt {
            return Plan::Restart;
        }

        match &self.next {
            Some(next) if next.lt > from_lt => Plan::Resume(next.clone()),
            _ => self
                .pages
                .iter()
                .rev()
                .find(|page| page.lt > from_lt)
                .map_or(Plan::Restart, |page| Plan::Replay(page.clone())),
        }
    }

    /// Records a page reached by walking. `start` is its first transaction,
    /// `next` the one right after its last.
    pub fn push_page(&mut self, start: TxCursor, next: Option<TxCursor>) {
        self.pages.push(start);
        self.next = next;
    }
}
