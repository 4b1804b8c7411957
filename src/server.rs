//! Scoreboard HTTP server
//!
//! Thin axum layer over the score cache:
//! - `POST /api/v1/scores` - submit a name/score pair (validated here)
//! - `GET  /api/v1/scores` - read the current top entries
//! - `GET  /api/v1/status` - entry counts and effective config
//! - `GET  /health`        - health check
//!
//! All validation lives in this layer; the cache assumes clean input.
//! Submissions are acknowledged as soon as they land in memory.

use crate::cache::ScoreCache;
use crate::config::ScoreboardConfig;
use crate::storage::ScoreStore;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Hard ceiling on leaderboard page size, regardless of the requested limit
const MAX_PAGE_SIZE: usize = 1000;

// ============================================================================
// SERVER STATE
// ============================================================================

pub struct ServerState<S: ScoreStore> {
    pub cache: Arc<ScoreCache<S>>,
}

// ============================================================================
// REQUEST VALIDATION
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("name exceeds maximum length of {max} characters")]
    NameTooLong { max: usize },
    #[error("name may only contain letters, digits, spaces, '_' and '-'")]
    InvalidNameChars,
    #[error("score exceeds maximum of {max}")]
    ScoreTooLarge { max: u64 },
}

/// Validate a submitted display name against the configured bounds
pub fn validate_name(name: &str, config: &ScoreboardConfig) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if trimmed.chars().count() > config.max_name_len {
        return Err(ValidationError::NameTooLong {
            max: config.max_name_len,
        });
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidNameChars);
    }
    Ok(())
}

/// Validate a submitted score against the configured bound
pub fn validate_score(score: u64, config: &ScoreboardConfig) -> Result<(), ValidationError> {
    if score > config.max_score {
        return Err(ValidationError::ScoreTooLarge {
            max: config.max_score,
        });
    }
    Ok(())
}

// ============================================================================
// SUBMISSION ENDPOINT
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmitScoreRequest {
    pub name: String,
    pub score: u64,
}

#[derive(Debug, Serialize)]
pub struct SubmitScoreResponse {
    pub success: bool,
    pub error: Option<String>,
}

/// POST /api/v1/scores - Submit a score
///
/// Validates name and score bounds, then hands the entry to the cache.
/// Always acknowledges immediately; durability is handled by the
/// checkpoint task off the request path.
pub async fn submit_score<S: ScoreStore>(
    State(state): State<Arc<ServerState<S>>>,
    Json(req): Json<SubmitScoreRequest>,
) -> Result<Json<SubmitScoreResponse>, (StatusCode, Json<SubmitScoreResponse>)> {
    let config = state.cache.config();

    if let Err(e) = validate_name(&req.name, config).and_then(|_| validate_score(req.score, config))
    {
        warn!("Rejected score submission: {e}");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(SubmitScoreResponse {
                success: false,
                error: Some(e.to_string()),
            }),
        ));
    }

    state.cache.submit(req.name.trim(), req.score);

    Ok(Json(SubmitScoreResponse {
        success: true,
        error: None,
    }))
}

// ============================================================================
// LEADERBOARD ENDPOINT
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntryResponse {
    pub name: String,
    pub score: u64,
    pub timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntryResponse>,
    pub total: usize,
}

/// GET /api/v1/scores - Get the current top entries
///
/// `limit` defaults to the configured page size and is clamped server-side.
pub async fn get_leaderboard<S: ScoreStore>(
    State(state): State<Arc<ServerState<S>>>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<LeaderboardResponse> {
    let limit = query
        .limit
        .unwrap_or(state.cache.config().default_page_size)
        .min(MAX_PAGE_SIZE);

    let entries: Vec<LeaderboardEntryResponse> = state
        .cache
        .top_n(limit)
        .into_iter()
        .map(|e| LeaderboardEntryResponse {
            name: e.name,
            score: e.score,
            timestamp: e.timestamp,
        })
        .collect();

    let total = entries.len();

    Json(LeaderboardResponse { entries, total })
}

// ============================================================================
// STATUS / HEALTH ENDPOINTS
// ============================================================================

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn get_status<S: ScoreStore>(
    State(state): State<Arc<ServerState<S>>>,
) -> Json<serde_json::Value> {
    let config = state.cache.config();
    Json(serde_json::json!({
        "entries": state.cache.len(),
        "pending": state.cache.pending_len(),
        "checkpoint_interval_secs": config.checkpoint_interval_secs,
        "max_entries": config.max_entries,
        "default_page_size": config.default_page_size,
    }))
}

// ============================================================================
// ROUTER / SERVER STARTUP
// ============================================================================

pub fn build_router<S: ScoreStore + 'static>(state: Arc<ServerState<S>>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/v1/scores",
            post(submit_score::<S>).get(get_leaderboard::<S>),
        )
        .route("/api/v1/status", get(get_status::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the server until ctrl-c, then flush the cache before returning.
///
/// The final flush is an explicit lifecycle step, not a process-exit hook:
/// callers get a fully drained cache once this returns.
pub async fn run_server<S: ScoreStore + 'static>(
    cache: Arc<ScoreCache<S>>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let state = Arc::new(ServerState {
        cache: Arc::clone(&cache),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Scoreboard server listening on {}", addr);
    info!("  POST /api/v1/scores - submit a score");
    info!("  GET  /api/v1/scores - read the leaderboard");
    info!("  GET  /api/v1/status - cache status");
    info!("  GET  /health        - health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    cache.shutdown();
    Ok(())
}
