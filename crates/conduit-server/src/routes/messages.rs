// SPDX-License-Identifier: Apache-2.0
//! `POST /v1/messages` (`spec.md` §4.1, §6.1): optional Anthropic-native
//! passthrough. The body already speaks the Anthropic Messages schema, so
//! it is translated to the canonical OpenAI-shaped request the pipeline
//! runs on and the response translated back, rather than routing the
//! agent's exact bytes upstream — every stage (firewall, budgets, cache,
//! quality gate) still applies uniformly regardless of which surface the
//! request arrived on.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use conduit_core::{PipelineResponse, RequestContext};
use conduit_providers::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Role};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::headers::{agent_name, force_model, session_id};
use crate::state::AppState;

fn anthropic_to_openai_request(body: &Value) -> Result<ChatCompletionRequest, conduit_core::PipelineError> {
    let model = body
        .get("model")
        .and_then(Value::as_str)
        .ok_or_else(|| conduit_core::PipelineError::MalformedInput("missing model".into()))?
        .to_string();

    let mut messages = Vec::new();
    if let Some(system) = body.get("system").and_then(Value::as_str) {
        messages.push(ChatMessage { role: Role::System, content: json!(system), name: None, tool_call_id: None, tool_calls: None, extra: Default::default() });
    }
    for m in body.get("messages").and_then(Value::as_array).into_iter().flatten() {
        let role = match m.get("role").and_then(Value::as_str) {
            Some("assistant") => Role::Assistant,
            _ => Role::User,
        };
        let content = match m.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(blocks)) => blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        };
        messages.push(ChatMessage { role, content: json!(content), name: None, tool_call_id: None, tool_calls: None, extra: Default::default() });
    }

    let mut req: ChatCompletionRequest = serde_json::from_value(json!({
        "model": model,
        "messages": messages,
    }))
    .map_err(|e| conduit_core::PipelineError::MalformedInput(e.to_string()))?;

    req.max_tokens = body.get("max_tokens").and_then(Value::as_u64).map(|v| v as u32);
    req.temperature = body.get("temperature").and_then(Value::as_f64);
    req.stream = body.get("stream").and_then(Value::as_bool);
    Ok(req)
}

fn openai_to_anthropic_response(resp: &ChatCompletionResponse) -> Value {
    let text = resp.first_message().map(|m| m.text()).unwrap_or_default();
    let stop_reason = match resp.finish_reason() {
        Some("length") => "max_tokens",
        Some("tool_calls") => "tool_use",
        _ => "end_turn",
    };
    json!({
        "id": resp.id,
        "type": "message",
        "role": "assistant",
        "model": resp.model,
        "content": [{"type": "text", "text": text}],
        "stop_reason": stop_reason,
        "usage": {
            "input_tokens": resp.usage.prompt_tokens,
            "output_tokens": resp.usage.completion_tokens,
        },
    })
}

pub async fn messages(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Result<Response, ApiError> {
    let req = anthropic_to_openai_request(&body)?;

    let ctx = RequestContext::new(
        agent_name(&headers),
        session_id(&headers),
        force_model(&headers),
        state.config.clone(),
        state.store.clone(),
        state.tools.clone(),
        state.keys.clone(),
        state.audit.clone(),
        state.alerter.clone(),
    );

    match state.pipeline.handle(&ctx, req).await? {
        PipelineResponse::Buffered { response, .. } => Ok(Json(openai_to_anthropic_response(&response)).into_response()),
        PipelineResponse::Streaming { .. } => {
            // Anthropic-native streaming isn't offered on this route; the
            // caller should use /v1/chat/completions with stream=true.
            Err(conduit_core::PipelineError::MalformedInput("streaming is not supported on /v1/messages".into()).into())
        }
    }
}
