use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::db::audit::{Feedback, QueryAttempt, QueryStats};
use crate::db::schema::describe_schema;
use crate::prompt::query_examples;
use crate::query::{QueryRequest, QueryResponse};
use crate::web::state::AppState;

const MAX_QUERY_CHARS: usize = 500;
const HISTORY_SIZE: usize = 10;

/// Identity arrives from the upstream auth layer; absent or unreadable means
/// anonymous.
fn current_username(headers: &HeaderMap) -> String {
    headers
        .get("x-username")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| "anonymous".to_string())
}

fn rejected(query: &str, message: &str) -> (StatusCode, Json<QueryResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(QueryResponse {
            success: false,
            query: query.to_string(),
            sql: None,
            columns: Vec::new(),
            table_data: Vec::new(),
            chart_data: Vec::new(),
            result_count: 0,
            execution_time: 0,
            error_message: Some(message.to_string()),
        }),
    )
}

// Natural language query
pub async fn ai_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<QueryRequest>,
) -> impl IntoResponse {
    let username = current_username(&headers);
    info!("Received AI query request from '{}': {}", username, payload.query);

    // Request-shape checks happen before the attempt starts; no audit record
    if payload.query.trim().is_empty() {
        return rejected(&payload.query, "Query content cannot be empty");
    }
    if payload.query.chars().count() > MAX_QUERY_CHARS {
        return rejected(&payload.query, "Query content cannot exceed 500 characters");
    }

    let response = state.query_service.process(&username, &payload).await;

    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(response))
}

// Schema
pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let schema = describe_schema(&state.db_pool).await;
    Json(json!({ "schema": schema }))
}

// Example corpus
pub async fn get_examples() -> Json<serde_json::Value> {
    Json(json!({ "examples": query_examples() }))
}

// Query history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<QueryAttempt>>, (StatusCode, Json<serde_json::Value>)> {
    let username = current_username(&headers);

    let history = state
        .audit
        .recent_for_user(&username, HISTORY_SIZE)
        .await
        .map_err(|e| {
            error!("Failed to load query history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to load query history" })),
            )
        })?;

    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub struct FeedbackParams {
    pub feedback: String,
    pub comment: Option<String>,
}

// Feedback on a past attempt, owner-scoped
pub async fn provide_feedback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(params): Query<FeedbackParams>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let username = current_username(&headers);

    let feedback = Feedback::parse(&params.feedback).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Feedback must be one of CORRECT, INCORRECT, PARTIAL" })),
        )
    })?;

    state
        .audit
        .set_feedback(id, &username, feedback, params.comment)
        .await
        .map_err(|e| {
            let status = match e {
                crate::db::audit::AuditError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, Json(json!({ "error": e.to_string() })))
        })?;

    Ok(Json(json!({ "message": "Feedback saved successfully" })))
}

// Per-user attempt statistics
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<QueryStats>, (StatusCode, Json<serde_json::Value>)> {
    let username = current_username(&headers);

    let stats = state.audit.stats_for_user(&username).await.map_err(|e| {
        error!("Failed to compute statistics: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Failed to compute statistics" })),
        )
    })?;

    Ok(Json(stats))
}
