//! HTTP surface: the advisory proxy endpoint and the score table.

use std::sync::Arc;
use std::time::Duration;

use advisory_client::AdvisoryClient;
use axum::extract::{Query, Request, State};
use axum::http::header::{HeaderName, CACHE_CONTROL, ORIGIN};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cache_proxy::{
    CachePolicy, CacheTelemetry, DistributedCache, FallbackCache, FanoutTelemetry,
    MemoryDistributedCache, OutcomeCounters, RedisCache, TieredCacheProxy, TracingTelemetry,
};
use common::{CountryScore, DeskConfig, Result};
use scoring::{signals_from_advisories, ScoringEngine, SignalInputs};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::demand::demand_table;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

pub type AdvisoryProxy = TieredCacheProxy<AdvisoryClient>;

/// Shared state handed to every handler and background loop.
#[derive(Clone)]
pub struct AppState {
    pub advisories: Arc<AdvisoryProxy>,
    pub engine: Arc<RwLock<ScoringEngine>>,
    pub counters: Arc<OutcomeCounters>,
    /// Browser origins allowed to call the API; empty allows any.
    pub allowed_origins: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(advisories: AdvisoryProxy, counters: Arc<OutcomeCounters>) -> Self {
        Self {
            advisories: Arc::new(advisories),
            engine: Arc::new(RwLock::new(ScoringEngine::new())),
            counters,
            allowed_origins: Arc::new(Vec::new()),
        }
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = Arc::new(origins);
        self
    }

    /// Requests without an `Origin` header are not browser cross-origin calls.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(origin) => {
                self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == origin)
            }
        }
    }

    /// Wire up the proxy, cache tiers, and telemetry from config.
    pub async fn from_config(cfg: &DeskConfig) -> Result<Self> {
        let client = AdvisoryClient::new(&cfg.upstream)?;
        let distributed = connect_distributed(cfg).await;
        let counters = Arc::new(OutcomeCounters::new());
        let telemetry: Arc<dyn CacheTelemetry> = Arc::new(FanoutTelemetry::new(vec![
            Arc::new(TracingTelemetry),
            counters.clone(),
        ]));

        let proxy = TieredCacheProxy::new(
            cfg.cache.topic_key.clone(),
            client,
            distributed,
            Arc::new(FallbackCache::new()),
            telemetry,
            CachePolicy::from_config(&cfg.cache),
        );
        Ok(Self::new(proxy, counters).with_allowed_origins(cfg.server.allowed_origins.clone()))
    }
}

/// Redis when configured and reachable, otherwise an in-process stand-in.
async fn connect_distributed(cfg: &DeskConfig) -> Arc<dyn DistributedCache> {
    let Some(url) = cfg.cache.redis_url.as_deref() else {
        info!("Redis not configured, using in-process distributed tier");
        return Arc::new(MemoryDistributedCache::new());
    };

    let timeout = Duration::from_secs(cfg.upstream.timeout_secs.min(5));
    let redis = match RedisCache::from_url(url, cfg.cache.redis_pool_size, timeout) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Falling back to in-process distributed tier");
            return Arc::new(MemoryDistributedCache::new());
        }
    };

    match redis.ping().await {
        Ok(()) => {
            info!("Connected to Redis");
            Arc::new(redis)
        }
        Err(e) => {
            warn!(error = %e, "Falling back to in-process distributed tier");
            Arc::new(MemoryDistributedCache::new())
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.allowed_origins);
    let guarded = get(travel_safety).route_layer(middleware::from_fn_with_state(
        state.clone(),
        origin_guard,
    ));

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/api/travel-safety", guarded)
        .route("/api/scores", get(get_scores))
        .route("/api/scores/demand", get(get_demand))
        .route("/api/scores/refresh", post(refresh_scores))
        .route("/api/focal-points", post(deliver_focal_points))
        .route("/api/cache/stats", get(cache_stats))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed: &[String]) -> CorsLayer {
    if allowed.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Rejects browser calls from origins outside the allow list.
async fn origin_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let origin = req.headers().get(ORIGIN).and_then(|v| v.to_str().ok());
    if state.origin_allowed(origin) {
        return next.run(req).await;
    }

    debug!(origin = ?origin, "Rejected request from disallowed origin");
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "Origin not allowed" })),
    )
        .into_response()
}

async fn travel_safety(State(state): State<AppState>) -> Response {
    match state.advisories.get_snapshot().await {
        Ok((snapshot, origin)) => {
            let cache_control = state.advisories.policy().cache_control(origin);
            (
                StatusCode::OK,
                [
                    (CACHE_CONTROL, cache_control),
                    (X_CACHE, origin.as_str().to_string()),
                ],
                Json(snapshot.as_ref()),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
struct ScoresQuery {
    #[serde(default)]
    with_data: bool,
}

async fn get_scores(
    State(state): State<AppState>,
    Query(query): Query<ScoresQuery>,
) -> Json<Vec<CountryScore>> {
    let engine = state.engine.read().await;
    if query.with_data {
        Json(engine.scores_with_data())
    } else {
        Json(engine.scores())
    }
}

async fn get_demand(State(state): State<AppState>) -> impl IntoResponse {
    let scores = state.engine.read().await.scores_with_data();
    Json(demand_table(&scores))
}

#[derive(Debug, Default, Deserialize)]
struct RefreshQuery {
    #[serde(default)]
    force_local: bool,
}

async fn refresh_scores(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> Json<Vec<CountryScore>> {
    Json(run_refresh(&state, query.force_local).await)
}

async fn deliver_focal_points(
    State(state): State<AppState>,
    Json(inputs): Json<SignalInputs>,
) -> Json<Vec<CountryScore>> {
    state.engine.write().await.deliver_focal_points(inputs);
    Json(run_refresh(&state, false).await)
}

async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.counters.snapshot())
}

/// Recompute scores, folding in the advisory snapshot when one is available.
///
/// Returns an empty list while focal points are not ready, unless forced.
pub async fn run_refresh(state: &AppState, force_local: bool) -> Vec<CountryScore> {
    if !force_local && !state.engine.read().await.is_ready() {
        return Vec::new();
    }

    let supplemental = match state.advisories.get_snapshot().await {
        Ok((snapshot, _)) => signals_from_advisories(&snapshot),
        Err(e) => {
            warn!(error = %e, "Scoring without advisory signals");
            SignalInputs::new()
        }
    };

    state
        .engine
        .write()
        .await
        .refresh_with(&supplemental, force_local)
}
