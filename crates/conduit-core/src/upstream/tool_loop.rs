// SPDX-License-Identifier: Apache-2.0
//! The tool-call loop (`spec.md` §4.11.3): repeatedly complete, dispatch
//! any tool calls the model asked for, append their results, and complete
//! again, until the model stops calling tools or `max_iterations` is hit.
//! Tool calls within one round dispatch concurrently — the per-server
//! serialization lives inside `McpClient`'s stdin mutex, so two calls to
//! distinct servers never wait on each other here.

use std::sync::Arc;

use conduit_mcp::ToolManager;
use conduit_providers::{ChatMessage, ChatCompletionRequest, ChatCompletionResponse, ModelProvider, Role, Usage};
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::PipelineError;

pub async fn run(
    ctx: &RequestContext,
    tools: &Arc<ToolManager>,
    provider: &Arc<dyn ModelProvider>,
    mut req: ChatCompletionRequest,
    max_iterations: u32,
) -> Result<(ChatCompletionResponse, Usage), PipelineError> {
    let mut total_usage = Usage::default();
    let mut last_resp = None;

    for _round in 0..max_iterations.max(1) {
        let resp = provider.complete(&req).await?;
        total_usage.add(&resp.usage);

        let Some(message) = resp.first_message().cloned() else {
            return Ok((resp, total_usage));
        };
        let tool_calls = message.tool_calls.clone().unwrap_or_default();
        if tool_calls.is_empty() {
            return Ok((resp, total_usage));
        }

        req.messages.push(message);
        last_resp = Some(resp);

        let dispatches = tool_calls.iter().map(|call| {
            let tools = tools.clone();
            let agent_name = ctx.agent_name.clone();
            let call = call.clone();
            async move {
                let args: Value = serde_json::from_str(&call.function.arguments).unwrap_or(Value::Null);
                let outcome = tools.call_tool(&agent_name, &call.function.name, args).await;
                let text = match outcome {
                    Ok((text, _is_error)) => text,
                    Err(e) => format!("tool call failed: {e}"),
                };
                (call.id, text)
            }
        });
        let results = futures::future::join_all(dispatches).await;
        for (tool_call_id, text) in results {
            req.messages.push(ChatMessage {
                role: Role::Tool,
                content: Value::String(text),
                name: None,
                tool_call_id: Some(tool_call_id),
                tool_calls: None,
                extra: Default::default(),
            });
        }
    }

    // §4.11.3: once max_iterations is exhausted, finalize the last obtained
    // response as the answer rather than failing the request — `last_resp`
    // is always set here since every round stores its response before
    // looping back.
    Ok((last_resp.expect("at least one round always runs"), total_usage))
}
