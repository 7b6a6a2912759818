// SPDX-License-Identifier: Apache-2.0
//! `GET|PUT|DELETE /v1/sessions/{id}` (`spec.md` §4.4, §6.1): direct CRUD
//! over a session's stored model/temperature/max_tokens override, keyed by
//! the `X-Agent-Name` header the same way the pipeline reads it.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{Duration, Utc};
use conduit_storage::SessionOverride;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::headers::agent_name;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PutSessionRequest {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    /// Seconds until expiry; defaults to `session_overrides.default_ttl`.
    pub ttl_secs: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub agent_name: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub expires_at: chrono::DateTime<Utc>,
}

impl From<SessionOverride> for SessionResponse {
    fn from(ov: SessionOverride) -> Self {
        SessionResponse {
            session_id: ov.session_id,
            agent_name: ov.agent_name,
            model: ov.model,
            temperature: ov.temperature,
            max_tokens: ov.max_tokens,
            expires_at: ov.expires_at,
        }
    }
}

pub async fn get_session(State(state): State<AppState>, Path(session_id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    match state.store.session_get(&session_id).await.map_err(conduit_core::PipelineError::from)? {
        Some(ov) if ov.expires_at > Utc::now() => Ok(Json(SessionResponse::from(ov)).into_response()),
        _ => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

pub async fn put_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<PutSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let ttl = body.ttl_secs.unwrap_or(state.config.session_overrides.default_ttl);
    let ov = SessionOverride {
        session_id: session_id.clone(),
        agent_name: agent_name(&headers),
        model: body.model,
        temperature: body.temperature,
        max_tokens: body.max_tokens,
        created_at: now,
        expires_at: now + Duration::seconds(ttl.max(0)),
    };
    state.store.session_put(&ov).await.map_err(conduit_core::PipelineError::from)?;
    Ok(Json(SessionResponse::from(ov)))
}

pub async fn delete_session(State(state): State<AppState>, Path(session_id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    state.store.session_delete(&session_id).await.map_err(conduit_core::PipelineError::from)?;
    Ok(StatusCode::NO_CONTENT)
}
