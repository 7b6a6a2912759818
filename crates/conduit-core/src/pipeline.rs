// SPDX-License-Identifier: Apache-2.0
//! The pipeline composer (`spec.md` §2): wires every stage together in the
//! mandated order and drives one request through it.

use std::sync::Arc;

use conduit_config::QualityAction;
use conduit_pricing::PricingTable;
use conduit_providers::embedding::EmbeddingClient;
use conduit_providers::{ByteStream, ChatCompletionRequest, ChatCompletionResponse, ModelProvider};
use conduit_storage::NewAuditEvent;
use conduit_trace::WebhookSink;

use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::fingerprint::{canonical_user_content, sha256_hex};
use crate::stages::{ab_experimenter, budget_guard, context_compressor, firewall, prompt_injector, quality, rate_limiter, semantic_cache, session_override, smart_router};
use crate::stages::budget_guard::BudgetCheck;
use crate::stages::rate_limiter::RateLimiter;
use crate::upstream::{self, UpstreamCall};
use crate::usage::{self, UsageSummary};

/// Metadata surfaced as response headers (`spec.md` §6.1) alongside a
/// buffered response: which firewall warn rules matched, whether the
/// quality gate let an issue through with a warning, which response-policy
/// rules were applied, and whether this was a cache hit.
#[derive(Default)]
pub struct ResponseMeta {
    pub firewall_warnings: Vec<(String, String)>,
    pub quality_warning: Option<String>,
    pub response_policy_applied: Vec<String>,
    pub cache_hit: bool,
}

pub enum PipelineResponse {
    Buffered { response: ChatCompletionResponse, usage: UsageSummary, budget: BudgetCheck, meta: ResponseMeta },
    Streaming { stream: ByteStream, model: String, provider: String },
}

/// Stateful collaborators shared across requests: the pricing table, the
/// in-memory rate limiter, the budget-alert sink, and the optional
/// semantic-cache embedder / context-compression summarizer (both `None`
/// when their features are unconfigured).
pub struct Pipeline {
    pricing: PricingTable,
    rate_limiter: RateLimiter,
    webhook_sink: Arc<dyn WebhookSink>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    summarizer: Option<Arc<dyn ModelProvider>>,
}

impl Pipeline {
    pub fn new(
        pricing: PricingTable,
        webhook_sink: Arc<dyn WebhookSink>,
        embedder: Option<Arc<dyn EmbeddingClient>>,
        summarizer: Option<Arc<dyn ModelProvider>>,
    ) -> Self {
        Pipeline { pricing, rate_limiter: RateLimiter::new(), webhook_sink, embedder, summarizer }
    }

    pub async fn handle(&self, ctx: &RequestContext, mut req: ChatCompletionRequest) -> Result<PipelineResponse, PipelineError> {
        let want_stream = req.is_streaming();

        rate_limiter_check(&self.rate_limiter, ctx)?;

        let budget = budget_guard::check_budget(
            &ctx.store,
            &ctx.alerter,
            self.webhook_sink.as_ref(),
            &ctx.agent_name,
            ctx.config.budgets.get(&ctx.agent_name),
        )
        .await?;

        req = session_override::apply(&ctx.store, ctx.session_id.as_deref(), req).await?;

        let firewall_warnings = run_firewall(ctx, &req).await?;

        req = prompt_injector::apply(&ctx.config.prompt_templates, &ctx.agent_name, req);

        let canonical_content = canonical_user_content(&req);
        let hash = sha256_hex(&canonical_content);

        let mut cache_query_embedding = None;
        if !want_stream {
            match semantic_cache::lookup(&ctx.store, &ctx.config.cache, self.embedder.as_ref(), &hash, &req.model, &canonical_content).await? {
                semantic_cache::CacheLookup::Hit(response) => {
                    let usage = usage::record(&ctx.store, &self.pricing, &ctx.agent_name, &[], elapsed_ms(ctx), 200).await?;
                    let meta = ResponseMeta { firewall_warnings, cache_hit: true, ..Default::default() };
                    return Ok(PipelineResponse::Buffered { response, usage, budget, meta });
                }
                semantic_cache::CacheLookup::Miss { embedding } => cache_query_embedding = embedding,
            }
        }

        if ctx.force_model.is_none() {
            if let Some(substitute) = smart_router::route(&ctx.config.routing, &req) {
                req.model = substitute;
            }
            if let Some(substitute) = ab_experimenter::maybe_substitute(&ctx.config.experiments, &ctx.agent_name, &req.model) {
                req.model = substitute;
            }
        }

        if let Some(summarizer) = &self.summarizer {
            req = context_compressor::maybe_compress(&ctx.config.compression, summarizer, req).await;
        }

        if want_stream {
            let (stream, model, provider) = upstream::stream_dispatch(ctx, req).await?;
            let stream = upstream::stream_usage::record_as_it_flows(
                stream,
                ctx.store.clone(),
                self.pricing.clone(),
                ctx.agent_name.clone(),
                model.clone(),
                provider.clone(),
                ctx.started_at,
            );
            return Ok(PipelineResponse::Streaming { stream, model, provider });
        }

        let (response, all_calls, quality_warning, response_policy_applied) = self.dispatch_with_quality_gate(ctx, req).await?;

        if ctx.config.cache.enabled {
            let _ = semantic_cache::store_response(&ctx.store, &hash, &response.model, &response, cache_query_embedding).await;
        }

        let usage = usage::record(&ctx.store, &self.pricing, &ctx.agent_name, &all_calls, elapsed_ms(ctx), 200).await?;
        let meta = ResponseMeta { firewall_warnings, quality_warning, response_policy_applied, cache_hit: false };
        Ok(PipelineResponse::Buffered { response, usage, budget, meta })
    }

    /// Drive the upstream dispatch, applying the response policy and
    /// quality gate after each attempt. The total number of upstream
    /// dispatch attempts is bounded by
    /// `(failover.max_retries + 1) * (quality_gate.max_retries + 1)`
    /// (`spec.md` §9): each quality-gate retry re-enters `dispatch`, which
    /// itself may walk the whole failover chain.
    async fn dispatch_with_quality_gate(
        &self,
        ctx: &RequestContext,
        req: ChatCompletionRequest,
    ) -> Result<(ChatCompletionResponse, Vec<UpstreamCall>, Option<String>, Vec<String>), PipelineError> {
        let quality_cfg = &ctx.config.quality_gate;
        let mut retries_left = if quality_cfg.enabled { quality_cfg.max_retries } else { 0 };
        let mut all_calls = Vec::new();

        loop {
            let mut outcome = upstream::dispatch(ctx, req.clone()).await?;
            all_calls.append(&mut outcome.calls);
            let (response, response_policy_applied) = quality::apply_response_policy(&ctx.config.response_policy, &ctx.agent_name, outcome.response);

            if !quality_cfg.enabled {
                return Ok((response, all_calls, None, response_policy_applied));
            }

            match quality::classify(&response) {
                None => return Ok((response, all_calls, None, response_policy_applied)),
                Some(issue) => match quality::action_for(quality_cfg, issue) {
                    QualityAction::Reject => return Err(quality::reject_error(issue)),
                    QualityAction::Warn => {
                        tracing::warn!(agent = %ctx.agent_name, issue = ?issue, "quality gate: issue detected, passing through");
                        return Ok((response, all_calls, Some(format!("{issue:?}")), response_policy_applied));
                    }
                    QualityAction::Retry => {
                        if retries_left == 0 {
                            tracing::warn!(agent = %ctx.agent_name, issue = ?issue, "quality gate: retries exhausted, passing through");
                            return Ok((response, all_calls, Some(format!("{issue:?}")), response_policy_applied));
                        }
                        retries_left -= 1;
                    }
                },
            }
        }
    }
}

fn rate_limiter_check(limiter: &RateLimiter, ctx: &RequestContext) -> Result<(), PipelineError> {
    limiter.check(&ctx.agent_name, ctx.config.rate_limits.get(&ctx.agent_name))
}

async fn run_firewall(ctx: &RequestContext, req: &ChatCompletionRequest) -> Result<Vec<(String, String)>, PipelineError> {
    if !ctx.config.firewall.enabled {
        return Ok(Vec::new());
    }
    let compiled = firewall::compile(&ctx.config.firewall);
    let content = canonical_user_content(req);
    let mut warnings = Vec::new();
    if let firewall::FirewallOutcome::Matched(matches) = firewall::scan(&compiled, &content)? {
        for m in matches {
            ctx.audit
                .log(NewAuditEvent {
                    event_type: m.event_type,
                    agent_name: ctx.agent_name.clone(),
                    details: serde_json::json!({"rule": m.rule, "category": m.category}),
                })
                .await;
            warnings.push((m.rule, m.category));
        }
    }
    Ok(warnings)
}

fn elapsed_ms(ctx: &RequestContext) -> i64 {
    ctx.started_at.elapsed().as_millis() as i64
}
