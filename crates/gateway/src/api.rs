//! REST handlers for the advisor API.
//!
//! Four groups: chat (one advisory turn end to end), per-user profile
//! read/upsert, per-user history read/wipe, and the stateless dashboard
//! rollup that queries the upstream clients directly, without the agent
//! loop in between.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use macrosage_core::error::UpstreamError;
use macrosage_core::profile::{
    ConversationRecord, Goals, Preferences, RiskTolerance, UserProfile,
};
use macrosage_tools::fred::{SERIES_FED_FUNDS, SERIES_UNEMPLOYMENT};

use crate::SharedState;

const DEFAULT_HISTORY_LIMIT: u32 = 50;

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route(
            "/api/users/{user_id}/profile",
            get(get_profile_handler).post(upsert_profile_handler),
        )
        .route(
            "/api/users/{user_id}/history",
            get(history_handler).delete(clear_history_handler),
        )
        .route("/api/dashboard", get(dashboard_handler))
}

// ── Request / response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ChatRequest {
    user_id: String,
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    tools_used: Vec<String>,
    iterations: u32,
    timestamp: DateTime<Utc>,
}

/// Full-replace profile payload; omitted fields reset to their defaults.
#[derive(Deserialize)]
struct ProfileUpsertRequest {
    #[serde(default)]
    income_range: Option<String>,
    #[serde(default)]
    debt_level: Option<String>,
    #[serde(default)]
    dependents: u32,
    #[serde(default)]
    risk_tolerance: RiskTolerance,
    #[serde(default)]
    goals: Goals,
    #[serde(default)]
    preferences: Preferences,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
struct HistoryResponse {
    user_id: String,
    messages: Vec<ConversationRecord>,
    count: usize,
}

#[derive(Serialize)]
struct ClearedResponse {
    user_id: String,
    cleared: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn not_found(message: impl Into<String>) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal(e: impl std::fmt::Display) -> ApiError {
    error!(error = %e, "Request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if payload.user_id.trim().is_empty() {
        return Err(bad_request("user_id must not be empty"));
    }
    if payload.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    info!(user_id = %payload.user_id, "Chat request");

    let turn = state
        .chat
        .chat(&payload.user_id, &payload.message)
        .await
        .map_err(internal)?;

    Ok(Json(ChatResponse {
        response: turn.response,
        tools_used: turn.tools_used,
        iterations: turn.iterations,
        timestamp: turn.timestamp,
    }))
}

async fn get_profile_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    match state.chat.store().get_profile(&user_id).await {
        Ok(Some(profile)) => Ok(Json(profile)),
        Ok(None) => Err(not_found(format!("no profile for user '{user_id}'"))),
        Err(e) => Err(internal(e)),
    }
}

async fn upsert_profile_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Json(payload): Json<ProfileUpsertRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let mut profile = UserProfile::new(&user_id);
    profile.income_range = payload.income_range;
    profile.debt_level = payload.debt_level;
    profile.dependents = payload.dependents;
    profile.risk_tolerance = payload.risk_tolerance;
    profile.goals = payload.goals;
    profile.preferences = payload.preferences;

    let store = state.chat.store();
    store.upsert_profile(&profile).await.map_err(internal)?;

    // Read back so the response carries the preserved created_at.
    match store.get_profile(&user_id).await.map_err(internal)? {
        Some(stored) => Ok(Json(stored)),
        None => Err(internal("profile missing immediately after upsert")),
    }
}

async fn history_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let messages = state
        .chat
        .store()
        .recent_history(&user_id, limit)
        .await
        .map_err(internal)?;

    Ok(Json(HistoryResponse {
        count: messages.len(),
        user_id,
        messages,
    }))
}

async fn clear_history_handler(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Result<Json<ClearedResponse>, ApiError> {
    state
        .chat
        .store()
        .clear_history(&user_id)
        .await
        .map_err(internal)?;

    info!(user_id = %user_id, "Conversation history cleared");

    Ok(Json(ClearedResponse {
        user_id,
        cleared: true,
    }))
}

/// One snapshot of all upstream sources, fetched concurrently. A failing
/// source degrades its own section only; the endpoint itself stays 200.
async fn dashboard_handler(State(state): State<SharedState>) -> Json<Value> {
    let fred = &state.clients.fred;
    let (inflation, unemployment, fed_funds, gdp, news, rates) = tokio::join!(
        fred.inflation_yoy(),
        fred.latest(SERIES_UNEMPLOYMENT),
        fred.latest(SERIES_FED_FUNDS),
        fred.gdp_growth(),
        state.clients.news.economic_news(None),
        state.clients.exchange.latest("USD"),
    );

    Json(json!({
        "indicators": {
            "inflation": section(inflation),
            "unemployment": section(unemployment),
            "fed_funds": section(fed_funds),
            "gdp_growth": section(gdp),
        },
        "news": section(news),
        "exchange_rates": section(rates.map(|s| json!({
            "base": s.base,
            "date": s.date,
            "rates": s.rates,
        }))),
        "generated_at": Utc::now(),
    }))
}

fn section(result: Result<Value, UpstreamError>) -> Value {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Dashboard section degraded");
            json!({ "error": { "kind": e.kind(), "message": e.to_string() } })
        }
    }
}
