//! Query handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use campuscandid_common::{
    errors::{AppError, Result},
    session::DEFAULT_SESSION_ID,
};

/// Query request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 2000))]
    pub query: Option<String>,

    #[validate(length(min = 1, max = 128))]
    pub session_id: Option<String>,
}

/// Query response
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub response: String,
}

/// Answer a question about colleges
pub async fn query(
    State(state): State<AppState>,
    payload: std::result::Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>> {
    let Json(request) = payload.map_err(|e| AppError::InvalidInput {
        message: e.body_text(),
    })?;

    request.validate().map_err(|e| AppError::InvalidInput {
        message: e.to_string(),
    })?;

    let query = request
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::InvalidInput {
            message: "Query is required".to_string(),
        })?;
    let session_id = request.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID);

    let outcome = state.pipeline.handle(query, session_id).await?;

    Ok(Json(QueryResponse {
        response: outcome.answer,
    }))
}
