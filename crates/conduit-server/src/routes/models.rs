// SPDX-License-Identifier: Apache-2.0
//! `GET /v1/models` (`spec.md` §6.1): lists every model id the pricing
//! table knows about, in the OpenAI list-object shape agents already know
//! how to parse.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let data: Vec<_> = state
        .pricing
        .model_ids()
        .into_iter()
        .map(|id| json!({"id": id, "object": "model"}))
        .collect();
    Json(json!({"object": "list", "data": data}))
}
