use {
    crate::{
        health::HealthService,
        live_feed::{live_feed_handler, LiveFeedSettings},
        types::{ApiError, ApiResponse, ApiResult, HealthResponse, HealthStatus, ReindexRequest, ReindexResponse},
        vote_endpoints::create_vote_router,
    },
    axum::{
        extract::{rejection::JsonRejection, State},
        http::{header, Method, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    },
    std::{future::Future, net::SocketAddr, sync::Arc, time::Duration},
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    vindexer_common::config::ApiSettings,
    vindexer_indexer::{IndexerStatus, VoteIndexer},
    vindexer_store::VoteStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn VoteStore>,
    pub indexer: Arc<VoteIndexer>,
    pub health: Arc<HealthService>,
    pub live_feed: LiveFeedSettings,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub path_prefix: Option<String>,
    pub enable_metrics: bool,
    pub live_feed: LiveFeedSettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            path_prefix: Some("/api".to_string()),
            enable_metrics: true,
            live_feed: LiveFeedSettings::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_settings(settings: &ApiSettings, enable_metrics: bool) -> anyhow::Result<Self> {
        let bind_addr = settings
            .bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {}: {}", settings.bind_addr, e))?;
        Ok(Self {
            bind_addr,
            path_prefix: settings.path_prefix.clone().filter(|prefix| !prefix.is_empty() && prefix != "/"),
            enable_metrics,
            live_feed: LiveFeedSettings {
                interval: Duration::from_millis(settings.live_feed_interval_ms),
                size: settings.live_feed_size,
            },
        })
    }
}

/// API server
pub struct ApiServer {
    config: ApiConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn VoteStore>,
        indexer: Arc<VoteIndexer>,
        health: Arc<HealthService>,
    ) -> Self {
        let state = AppState {
            store,
            indexer,
            health,
            live_feed: config.live_feed,
        };
        Self { config, state }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serves until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.create_router();

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(
            "Listening on {}{}",
            self.config.bind_addr,
            self.config.path_prefix.as_deref().unwrap_or("")
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }

    pub fn create_router(&self) -> Router {
        create_router(self.state.clone(), &self.config)
    }
}

pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/reindex", post(reindex_handler))
        .route("/live-feed", get(live_feed_handler))
        .merge(create_vote_router());

    if config.enable_metrics {
        router = router.route("/metrics", get(metrics_handler));
    }

    if let Some(prefix) = &config.path_prefix {
        router = Router::new().nest(prefix, router);
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.health.check_all().await;
    let status = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(ApiResponse::<HealthResponse>::success(health)))
}

async fn status_handler(State(state): State<AppState>) -> ApiResult<IndexerStatus> {
    let status = state.indexer.status().await?;
    Ok(Json(ApiResponse::success(status)))
}

async fn reindex_handler(
    State(state): State<AppState>,
    payload: Result<Json<ReindexRequest>, JsonRejection>,
) -> ApiResult<ReindexResponse> {
    let Json(request) = payload?;
    let from_lt = request
        .from_lt
        .ok_or_else(|| ApiError::BadRequest("Missing required field: fromLt".to_string()))?;

    state.indexer.restart_from_lt(from_lt).await?;

    Ok(Json(ApiResponse::success(ReindexResponse {
        from_lt,
        message: format!("Reindexing from lt {}", from_lt),
    })))
}

async fn metrics_handler() -> Result<impl IntoResponse, ApiError> {
    let body = vindexer_metrics::gather_text().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, vindexer_metrics::exporter::CONTENT_TYPE)],
        body,
    ))
}
