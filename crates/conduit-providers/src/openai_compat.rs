// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The OpenAI-compatible driver, shared by OpenAI and DeepSeek (`spec.md`
//! §4.11.1: "OpenAI and DeepSeek speak the OpenAI chat-completions wire
//! format"). The request/response shapes are already the proxy's canonical
//! [`ChatCompletionRequest`]/[`ChatCompletionResponse`], so this driver is a
//! thin HTTP wrapper plus the SSE line-buffering logic reused by the
//! streaming stage.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::Client;
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{ByteStream, ModelProvider};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse};

pub struct OpenAiCompatProvider {
    name: &'static str,
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(name: &'static str, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        OpenAiCompatProvider {
            name,
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
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

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, req: &ChatCompletionRequest) -> ProviderResult<ChatCompletionResponse> {
        let mut body = serde_json::to_value(req).map_err(|e| ProviderError::Decode(e.to_string()))?;
        body["stream"] = serde_json::json!(false);

        debug!(provider = self.name, model = %req.model, "sending buffered completion request");
        let resp = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(self.error_for_status(resp).await);
        }
        resp.json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn stream(&self, req: &ChatCompletionRequest) -> ProviderResult<ByteStream> {
        let mut body = serde_json::to_value(req).map_err(|e| ProviderError::Decode(e.to_string()))?;
        body["stream"] = serde_json::json!(true);
        body["stream_options"] = serde_json::json!({"include_usage": true});

        let resp = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(self.error_for_status(resp).await);
        }

        let stream = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(ProviderError::from));
        Ok(Box::pin(stream))
    }
}

/// Drain all complete `\n`-terminated lines from `buf`, returning them in
/// order and leaving any trailing partial line buffered for the next chunk
/// (`spec.md` §9 "line-buffered splitter"). Used by the streaming stage to
/// forward SSE lines to the client as soon as they're complete.
pub fn drain_complete_lines(buf: &mut String) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim_end_matches('\r').to_string();
        *buf = buf[pos + 1..].to_string();
        lines.push(line);
    }
    lines
}

/// Opportunistically pull a `usage` object out of an SSE `data:` line,
/// tolerating both OpenAI's `prompt_tokens`/`completion_tokens` and
/// Anthropic's `input_tokens`/`output_tokens` naming.
pub fn extract_usage_from_sse_line(line: &str) -> Option<crate::types::Usage> {
    let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    let v: serde_json::Value = serde_json::from_str(data).ok()?;
    let usage = v.get("usage")?;
    serde_json::from_value(usage.clone()).ok()
}

pub fn is_done_line(line: &str) -> bool {
    line.trim() == "data: [DONE]" || line.trim() == "data:[DONE]"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_only_complete_lines() {
        let mut buf = String::from("data: {\"a\":1}\ndata: {\"b\":2");
        let lines = drain_complete_lines(&mut buf);
        assert_eq!(lines, vec!["data: {\"a\":1}"]);
        assert_eq!(buf, "data: {\"b\":2");
    }

    #[test]
    fn extracts_openai_style_usage() {
        let line = "data: {\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":5}}";
        let usage = extract_usage_from_sse_line(line).unwrap();
        assert_eq!(usage.prompt_tokens, 10);
        assert_eq!(usage.completion_tokens, 5);
    }

    #[test]
    fn extracts_anthropic_style_usage() {
        let line = "data: {\"usage\":{\"input_tokens\":3,\"output_tokens\":7}}";
        let usage = extract_usage_from_sse_line(line).unwrap();
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 7);
    }

    #[test]
    fn recognizes_done_sentinel() {
        assert!(is_done_line("data: [DONE]"));
        assert!(!is_done_line("data: {\"a\":1}"));
    }

    #[test]
    fn buffer_survives_split_across_chunks() {
        let mut buf = String::new();
        buf.push_str("data: {\"usa");
        assert!(drain_complete_lines(&mut buf).is_empty());
        buf.push_str("ge\":{}}\n");
        let lines = drain_complete_lines(&mut buf);
        assert_eq!(lines, vec!["data: {\"usage\":{}}"]);
    }
}
