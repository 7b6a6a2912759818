// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Anthropic Messages API driver (`spec.md` §4.11.1, §6.2): system messages
//! are lifted into a top-level `system` field, and tool-call/content-block
//! shapes are translated losslessly to and from the OpenAI schema the rest
//! of the pipeline speaks.
//!
//! Streaming design decision (recorded in `DESIGN.md`): rather than
//! re-implementing the pipeline's OpenAI-shaped SSE chunking for Anthropic's
//! distinct event stream, this driver buffers the Anthropic response
//! server-side and synthesizes a single OpenAI-shaped `data:`/`[DONE]` pair
//! so the client still sees valid SSE framing when a request fails over to
//! Anthropic mid-stream.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{ByteStream, ModelProvider};
use crate::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, Role, ToolCall,
    ToolCallFunction, Usage,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        AnthropicProvider {
            base_url: "https://api.anthropic.com/v1".to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.base_url.trim_end_matches('/'))
    }

    async fn error_for_status(&self, resp: reqwest::Response) -> ProviderError {
        let status = resp.status();
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = resp.text().await.unwrap_or_default();
        ProviderError::Upstream {
            status: status.as_u16(),
            body,
            retry_after,
        }
    }
}

/// Lift system messages into a top-level `system` string and translate the
/// remaining messages (including tool calls/results) into Anthropic's
/// content-block shape.
fn to_anthropic_body(req: &ChatCompletionRequest) -> Value {
    let mut system_parts = Vec::new();
    let mut messages = Vec::new();

    for msg in &req.messages {
        match msg.role {
            Role::System => system_parts.push(msg.text()),
            Role::User => messages.push(json!({"role": "user", "content": msg.text()})),
            Role::Tool => {
                let tool_use_id = msg.tool_call_id.clone().unwrap_or_default();
                messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": msg.text(),
                    }]
                }));
            }
            Role::Assistant => {
                let mut content = Vec::new();
                let text = msg.text();
                if !text.is_empty() {
                    content.push(json!({"type": "text", "text": text}));
                }
                for call in msg.tool_calls.iter().flatten() {
                    let input: Value =
                        serde_json::from_str(&call.function.arguments).unwrap_or(json!({}));
                    content.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.function.name,
                        "input": input,
                    }));
                }
                messages.push(json!({"role": "assistant", "content": content}));
            }
        }
    }

    let mut body = json!({
        "model": req.model,
        "messages": messages,
        "max_tokens": req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    });
    if !system_parts.is_empty() {
        body["system"] = json!(system_parts.join("\n\n"));
    }
    if let Some(temp) = req.temperature {
        body["temperature"] = json!(temp);
    }
    if let Some(tools) = &req.tools {
        body["tools"] = json!(tools
            .iter()
            .map(|t| json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.parameters,
            }))
            .collect::<Vec<_>>());
    }
    body
}

/// Translate an Anthropic Messages API response back into the proxy's
/// canonical OpenAI-shaped response.
fn from_anthropic_response(model: &str, v: &Value) -> ChatCompletionResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in v.get("content").and_then(Value::as_array).into_iter().flatten() {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(t) = block.get("text").and_then(Value::as_str) {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                let name = block.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                let arguments = block
                    .get("input")
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "{}".to_string());
                tool_calls.push(ToolCall {
                    id,
                    kind: "function".to_string(),
                    function: ToolCallFunction { name, arguments },
                });
            }
            _ => {}
        }
    }

    let finish_reason = match v.get("stop_reason").and_then(Value::as_str) {
        Some("end_turn") | Some("stop_sequence") => Some("stop".to_string()),
        Some("max_tokens") => Some("length".to_string()),
        Some("tool_use") => Some("tool_calls".to_string()),
        other => other.map(|s| s.to_string()),
    };

    let usage = Usage {
        prompt_tokens: v
            .get("usage")
            .and_then(|u| u.get("input_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
        completion_tokens: v
            .get("usage")
            .and_then(|u| u.get("output_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0),
    };

    ChatCompletionResponse {
        id: v.get("id").and_then(Value::as_str).map(String::from),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: Role::Assistant,
                content: json!(text),
                name: None,
                tool_call_id: None,
                tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                extra: Default::default(),
            },
            finish_reason,
        }],
        usage,
        extra: Default::default(),
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn complete(&self, req: &ChatCompletionRequest) -> ProviderResult<ChatCompletionResponse> {
        let body = to_anthropic_body(req);
        debug!(model = %req.model, "sending buffered Anthropic completion request");
        let resp = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(self.error_for_status(resp).await);
        }
        let v: Value = resp.json().await.map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(from_anthropic_response(&req.model, &v))
    }

    async fn stream(&self, req: &ChatCompletionRequest) -> ProviderResult<ByteStream> {
        let response = self.complete(req).await?;
        let chunk = json!({
            "id": response.id,
            "object": "chat.completion.chunk",
            "model": response.model,
            "choices": [{
                "index": 0,
                "delta": {"content": response.first_message().map(|m| m.text()).unwrap_or_default()},
                "finish_reason": response.finish_reason(),
            }],
            "usage": response.usage,
        });
        let body = format!("data: {chunk}\n\ndata: [DONE]\n\n");
        let stream = futures::stream::once(async move { Ok(Bytes::from(body)) });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatCompletionRequest;

    #[test]
    fn lifts_system_message_and_translates_user_turn() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "claude-3-5-sonnet-20241022",
            "messages": [
                {"role": "system", "content": "Be terse."},
                {"role": "user", "content": "hi"},
            ]
        }))
        .unwrap();
        let body = to_anthropic_body(&req);
        assert_eq!(body["system"], json!("Be terse."));
        assert_eq!(body["messages"][0]["role"], json!("user"));
        assert_eq!(body["messages"][0]["content"], json!("hi"));
    }

    #[test]
    fn translates_tool_use_block_into_tool_call() {
        let v = json!({
            "id": "msg_1",
            "stop_reason": "tool_use",
            "content": [{"type": "tool_use", "id": "call_1", "name": "read_file", "input": {"path": "/tmp/x"}}],
            "usage": {"input_tokens": 10, "output_tokens": 5},
        });
        let resp = from_anthropic_response("claude-3-5-sonnet-20241022", &v);
        let msg = resp.first_message().unwrap();
        let calls = msg.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "read_file");
        assert_eq!(resp.finish_reason(), Some("tool_calls"));
        assert_eq!(resp.usage.prompt_tokens, 10);
    }
}
