//! `GET /live-feed`: a server-sent event stream with a snapshot of the most
//! recent votes on a fixed timer.

use {
    crate::rest::AppState,
    axum::{
        extract::State,
        response::sse::{Event, KeepAlive, Sse},
    },
    futures::{
        stream::{self, Stream},
        StreamExt,
    },
    serde_json::json,
    std::{sync::Arc, time::Duration},
    tokio::time::{interval_at, Instant},
    tokio_stream::wrappers::IntervalStream,
    tracing::{debug, warn},
    vindexer_store::VoteStore,
};

#[derive(Debug, Clone, Copy)]
pub struct LiveFeedSettings {
    pub interval: Duration,
    /// Votes per snapshot
    pub size: usize,
}

impl Default for LiveFeedSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            size: 5,
        }
    }
}

pub async fn live_feed_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    debug!("Live feed client connected");
    Sse::new(vote_feed(state.store.clone(), state.live_feed)).keep_alive(KeepAlive::default())
}

/// `connected`, then one `votes_update` per tick until the client goes away.
pub fn vote_feed(
    store: Arc<dyn VoteStore>,
    settings: LiveFeedSettings,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    let connected = stream::once(async {
        Event::default().json_data(json!({
            "type": "connected",
            "message": "Vote feed connected",
        }))
    });

    let ticks = IntervalStream::new(interval_at(
        Instant::now() + settings.interval,
        settings.interval,
    ));
    let updates = ticks.then(move |_| {
        let store = store.clone();
        async move { snapshot(store.as_ref(), settings.size).await }
    });

    connected.chain(updates)
}

async fn snapshot(store: &dyn VoteStore, size: usize) -> Result<Event, axum::Error> {
    let timestamp = chrono::Utc::now();
    match store.recent_votes(size).await {
        Ok(votes) => Event::default().json_data(json!({
            "type": "votes_update",
            "votes": votes,
            "timestamp": timestamp,
        })),
        Err(e) => {
            warn!("Live feed snapshot failed: {}", e);
            Event::default().json_data(json!({
                "type": "error",
                "message": e.to_string(),
                "timestamp": timestamp,
            }))
        }
    }
}
