// SPDX-License-Identifier: Apache-2.0
//! `POST /v1/webhooks/{name}` (`spec.md` §4.1, §6.1): an inbound async
//! trigger. The payload is turned into a chat-completion request via the
//! webhook definition's `model` / `prompt_template`, run through the same
//! pipeline every other request goes through under a synthetic
//! `webhook:{name}` agent identity, and recorded. Delivering the result to
//! `callback_url` is the out-of-scope "webhook execution" concern — this
//! handler only runs the request and records that it happened.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use conduit_core::{PipelineResponse, RequestContext};
use conduit_providers::ChatCompletionRequest;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    let Some(hex_sig) = header_value.strip_prefix("sha256=") else { return false };
    let Ok(given) = hex::decode(hex_sig) else { return false };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else { return false };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    expected.ct_eq(&given).into()
}

fn render_template(template: &str, payload: &Value) -> String {
    match payload {
        Value::Object(map) => {
            let mut out = template.to_string();
            for (k, v) in map {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                out = out.replace(&format!("{{{{{k}}}}}"), &rendered);
            }
            out
        }
        other => template.replace("{{payload}}", &other.to_string()),
    }
}

pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if !state.config.webhooks.enabled {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    let Some(def) = state.config.webhooks.definitions.get(&name) else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    let signature = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !verify_signature(&def.secret, &body, signature) {
        return Ok(StatusCode::UNAUTHORIZED.into_response());
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| conduit_core::PipelineError::MalformedInput(e.to_string()))?;

    let model = def.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
    let prompt = def
        .prompt_template
        .as_deref()
        .map(|t| render_template(t, &payload))
        .unwrap_or_else(|| payload.to_string());

    let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
    }))
    .map_err(|e| conduit_core::PipelineError::MalformedInput(e.to_string()))?;

    let agent_name = format!("webhook:{name}");
    let ctx = RequestContext::new(
        agent_name.clone(),
        None,
        None,
        state.config.clone(),
        state.store.clone(),
        state.tools.clone(),
        state.keys.clone(),
        state.audit.clone(),
        state.alerter.clone(),
    );

    let response = match state.pipeline.handle(&ctx, req).await? {
        PipelineResponse::Buffered { response, .. } => response,
        PipelineResponse::Streaming { .. } => {
            return Err(conduit_core::PipelineError::Internal("webhook dispatch must not stream".into()).into());
        }
    };

    state
        .store
        .insert_webhook_execution(&name, &agent_name, payload)
        .await
        .map_err(conduit_core::PipelineError::from)?;

    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}
