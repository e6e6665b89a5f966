use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::owner::authenticate;
use crate::services::assistant::chat;
use crate::state::AppState;

// POST /api/my/assistant/message
#[derive(Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<MessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    // Resolve owner and business before the LLM round-trip; the lock is not
    // held across the await.
    let (owner, business) = {
        let db = state.db.lock().unwrap();
        let owner = authenticate(&db, &headers)?;
        let business = queries::get_business_by_owner(&db, &owner.id)?.ok_or_else(|| {
            AppError::NotFound("no business registered for this account".to_string())
        })?;
        (owner, business)
    };

    let outcome = chat::process_owner_message(&state, &owner, &business, &body.message).await?;

    Ok(Json(serde_json::json!({
        "reply": outcome.reply,
        "proposal": outcome.proposal,
        "data": outcome.data,
    })))
}

// GET /api/my/assistant/proposals?limit=
#[derive(Deserialize)]
pub struct ProposalsQuery {
    pub limit: Option<i64>,
}

pub async fn list_proposals(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ProposalsQuery>,
) -> Result<Json<Vec<crate::models::Proposal>>, AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;

    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let proposals = queries::list_proposals(&db, &owner.id, limit)?;
    Ok(Json(proposals))
}

// POST /api/my/assistant/proposals/:id/confirm
pub async fn confirm_proposal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(proposal_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;
    let business = queries::get_business_by_owner(&db, &owner.id)?.ok_or_else(|| {
        AppError::NotFound("no business registered for this account".to_string())
    })?;

    let result = chat::confirm_proposal(&db, &owner, &business, &proposal_id)?;
    Ok(Json(serde_json::json!({"ok": true, "result": result})))
}

// POST /api/my/assistant/proposals/:id/reject
pub async fn reject_proposal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(proposal_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    let owner = authenticate(&db, &headers)?;

    chat::reject_proposal(&db, &owner, &proposal_id)?;
    Ok(Json(serde_json::json!({"ok": true})))
}
