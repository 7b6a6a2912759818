// SPDX-License-Identifier: Apache-2.0
//! `GET /health` (`spec.md` §6.1): a plain liveness probe, no auth, no
//! pipeline involvement.

use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}
