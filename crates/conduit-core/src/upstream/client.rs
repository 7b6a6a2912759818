// SPDX-License-Identifier: Apache-2.0
//! Provider routing, tool injection, and failover (`spec.md` §4.11.1,
//! §4.11.2, §4.11.4). Failover only ever re-selects a provider for a fresh
//! top-level dispatch attempt — once a tool loop is underway for a given
//! attempt it runs to completion or failure on that one provider, it is
//! never itself retried round-by-round.

use conduit_pricing::derive_provider;
use conduit_providers::{ChatCompletionResponse, ToolDefinition, Usage};
use serde_json::Value;
use tracing::warn;

use crate::context::RequestContext;
use crate::error::PipelineError;
use crate::upstream::tool_loop;
use conduit_providers::ChatCompletionRequest;

/// One upstream call made while servicing a request — may be more than one
/// when the tool loop runs several rounds, or failover substituted models.
pub struct UpstreamCall {
    pub model: String,
    pub provider: String,
    pub usage: Usage,
}

pub struct UpstreamOutcome {
    pub response: ChatCompletionResponse,
    pub calls: Vec<UpstreamCall>,
}

/// `[requested model, ...failover.chains[model]]`, truncated to
/// `max_retries + 1` total attempts.
fn candidate_models(ctx: &RequestContext, requested_model: &str) -> Vec<String> {
    let mut models = vec![requested_model.to_string()];
    if let Some(chain) = ctx.config.failover.chains.get(requested_model) {
        models.extend(chain.iter().cloned());
    }
    models.truncate((ctx.config.failover.max_retries as usize) + 1);
    models
}

fn inject_tools(ctx: &RequestContext, mut req: ChatCompletionRequest) -> ChatCompletionRequest {
    let Some(tools) = ctx.tools.as_ref() else { return req };
    if !tools.has_tools_for_agent(&ctx.agent_name) {
        return req;
    }
    let defs: Vec<ToolDefinition> = tools
        .tools_for_agent(&ctx.agent_name)
        .into_iter()
        .map(|d| ToolDefinition {
            name: d.name,
            description: d.description,
            parameters: d.input_schema.unwrap_or(Value::Object(Default::default())),
        })
        .collect();
    req.tools = Some(defs);
    // §4.11.2: the tool loop is never streamed — a tool call round needs
    // the full structured response to read `tool_calls` off of.
    req.stream = Some(false);
    req
}

/// Buffered dispatch: resolve a provider for each candidate model in turn,
/// running the tool loop when the agent has tools, until one succeeds or
/// the candidate list (failover chain) is exhausted.
pub async fn dispatch(ctx: &RequestContext, req: ChatCompletionRequest) -> Result<UpstreamOutcome, PipelineError> {
    let requested_model = req.model.clone();
    let candidates = candidate_models(ctx, &requested_model);
    let has_tools = ctx.tools.as_ref().map(|t| t.has_tools_for_agent(&ctx.agent_name)).unwrap_or(false);

    let mut last_err: Option<PipelineError> = None;

    for model in &candidates {
        let mut attempt_req = req.clone();
        attempt_req.model = model.clone();
        if has_tools {
            attempt_req = inject_tools(ctx, attempt_req);
        }

        let provider_kind = derive_provider(model);
        let Some(provider) = conduit_providers::driver_for(provider_kind, &ctx.keys) else {
            last_err = Some(PipelineError::Internal(format!("no API key configured for model {model}")));
            continue;
        };

        let result = if has_tools {
            tool_loop::run(ctx, ctx.tools.as_ref().expect("has_tools implies tools is Some"), &provider, attempt_req, ctx.config.tools.max_iterations).await
        } else {
            match provider.complete(&attempt_req).await {
                Ok(resp) => {
                    let usage = resp.usage;
                    Ok((resp, usage))
                }
                Err(e) => Err(PipelineError::from(e)),
            }
        };

        match result {
            Ok((response, usage)) => {
                return Ok(UpstreamOutcome {
                    response,
                    calls: vec![UpstreamCall { model: model.clone(), provider: provider.name().to_string(), usage }],
                });
            }
            Err(err) => {
                let failover_eligible = matches!(err, PipelineError::UpstreamTransient);
                if !failover_eligible {
                    return Err(err);
                }
                warn!(model = %model, "upstream dispatch failed, trying next failover candidate");
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or(PipelineError::UpstreamTransient))
}

/// Streaming dispatch (`spec.md` §4.11.5): only reachable when the caller
/// has already established the agent has no tools (streaming + tool loop
/// never combine). Failover is attempted only before the byte stream
/// starts — once bytes are flowing to the client, a mid-stream upstream
/// failure is forwarded as-is rather than silently retried.
pub async fn stream_dispatch(
    ctx: &RequestContext,
    req: ChatCompletionRequest,
) -> Result<(conduit_providers::ByteStream, String, String), PipelineError> {
    let requested_model = req.model.clone();
    let candidates = candidate_models(ctx, &requested_model);
    let mut last_err: Option<PipelineError> = None;

    for model in &candidates {
        let mut attempt_req = req.clone();
        attempt_req.model = model.clone();
        attempt_req.stream = Some(true);

        let provider_kind = derive_provider(model);
        let Some(provider) = conduit_providers::driver_for(provider_kind, &ctx.keys) else {
            last_err = Some(PipelineError::Internal(format!("no API key configured for model {model}")));
            continue;
        };

        match provider.stream(&attempt_req).await {
            Ok(stream) => return Ok((stream, model.clone(), provider.name().to_string())),
            Err(e) => {
                let err = PipelineError::from(e);
                if !matches!(err, PipelineError::UpstreamTransient) {
                    return Err(err);
                }
                warn!(model = %model, "streaming dispatch failed before first byte, trying next failover candidate");
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or(PipelineError::UpstreamTransient))
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_config::{Config, FailoverConfig};
    use conduit_providers::ProviderKeys;
    use conduit_storage::Store;
    use conduit_trace::{Alerter, AuditLogger};
    use std::collections::HashMap;
    use std::sync::Arc;

    async fn test_ctx(config: Config) -> RequestContext {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        RequestContext::new(
            "agent-a".to_string(),
            None,
            None,
            Arc::new(config),
            store.clone(),
            None,
            ProviderKeys::default(),
            Arc::new(AuditLogger::spawn(store)),
            Arc::new(Alerter::new()),
        )
    }

    fn sample_req(model: &str) -> ChatCompletionRequest {
        serde_json::from_value(serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": "hi"}],
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn no_key_configured_surfaces_internal_error() {
        let ctx = test_ctx(Config::default()).await;
        let err = dispatch(&ctx, sample_req("gpt-4o")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Internal(_)));
    }

    #[test]
    fn candidate_models_includes_chain_and_respects_max_retries() {
        let mut chains = HashMap::new();
        chains.insert("gpt-4o".to_string(), vec!["gpt-4o-mini".to_string(), "claude-sonnet-4".to_string()]);
        let config = Config { failover: FailoverConfig { max_retries: 1, chains }, ..Config::default() };
        let rt = tokio::runtime::Runtime::new().unwrap();
        let ctx = rt.block_on(test_ctx(config));
        let candidates = candidate_models(&ctx, "gpt-4o");
        assert_eq!(candidates, vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]);
    }
}
