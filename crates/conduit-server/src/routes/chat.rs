// SPDX-License-Identifier: Apache-2.0
//! `POST /v1/chat/completions` (`spec.md` §4.1, §6.1): the main entry.
//! Builds a [`RequestContext`] from the `X-Agent-Name` / `X-Session-ID` /
//! `X-Force-Model` headers, drives the request through the pipeline, and
//! either returns a JSON body with accounting headers or flushes an SSE
//! stream.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use conduit_core::pipeline::ResponseMeta;
use conduit_core::stages::budget_guard::BudgetCheck;
use conduit_core::{PipelineResponse, RequestContext, UsageSummary};
use conduit_providers::ChatCompletionRequest;

use crate::error::ApiError;
use crate::headers::{agent_name, force_model, session_id};
use crate::state::AppState;

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
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
    let trace_id = ctx.trace_id().to_string();

    match state.pipeline.handle(&ctx, req).await {
        Ok(PipelineResponse::Buffered { response, usage, budget, meta }) => {
            let mut resp = Json(&response).into_response();
            insert_accounting_headers(resp.headers_mut(), &usage, &budget, &meta, &trace_id);
            Ok(resp)
        }
        Ok(PipelineResponse::Streaming { stream, model: _, provider: _ }) => {
            let body = Body::from_stream(stream);
            let mut resp = Response::new(body);
            let h = resp.headers_mut();
            h.insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
            h.insert("cache-control", HeaderValue::from_static("no-cache"));
            if let Ok(v) = HeaderValue::from_str(&trace_id) {
                h.insert("x-trace-id", v);
            }
            Ok(resp)
        }
        Err(e) => Err(ApiError(e)),
    }
}

fn insert_accounting_headers(h: &mut axum::http::HeaderMap, usage: &UsageSummary, budget: &BudgetCheck, meta: &ResponseMeta, trace_id: &str) {
    if let Ok(v) = HeaderValue::from_str(&format!("{:.6}", usage.total_cost_usd)) {
        h.insert("x-cost-usd", v);
    }
    h.insert("x-input-tokens", HeaderValue::from(usage.total_input_tokens));
    h.insert("x-output-tokens", HeaderValue::from(usage.total_output_tokens));
    if let Some(pct) = budget.daily_percent {
        if let Ok(v) = HeaderValue::from_str(&format!("{pct:.2}")) {
            h.insert("x-budget-daily-percent", v);
        }
    }
    if let Some(pct) = budget.monthly_percent {
        if let Ok(v) = HeaderValue::from_str(&format!("{pct:.2}")) {
            h.insert("x-budget-monthly-percent", v);
        }
    }
    h.insert("x-cache", HeaderValue::from_static(if meta.cache_hit { "HIT" } else { "MISS" }));
    for (rule, _category) in &meta.firewall_warnings {
        if let Ok(v) = HeaderValue::from_str(rule) {
            h.append("x-firewall-warning", v);
        }
    }
    if let Some(reason) = &meta.quality_warning {
        if let Ok(v) = HeaderValue::from_str(reason) {
            h.insert("x-quality-warning", v);
        }
    }
    if !meta.response_policy_applied.is_empty() {
        if let Ok(v) = HeaderValue::from_str(&meta.response_policy_applied.join(", ")) {
            h.insert("x-response-policy", v);
        }
    }
    if let Ok(v) = HeaderValue::from_str(trace_id) {
        h.insert("x-trace-id", v);
    }
}
