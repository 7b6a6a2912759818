// SPDX-License-Identifier: Apache-2.0
//! Context compression (`spec.md` §4.10): when the estimated token total
//! crosses `threshold_tokens`, summarize everything except the trailing
//! `keep_recent` messages and a leading system message (if any) into one
//! summary message, via an LLM call to `summary_model`. On summarizer
//! failure the original messages pass through unchanged — compression is
//! a cost optimization, never a correctness requirement.

use std::sync::Arc;

use conduit_config::CompressionConfig;
use conduit_providers::{ChatCompletionRequest, ChatMessage, ModelProvider, Role};
use serde_json::Value;

fn estimate_tokens(messages: &[ChatMessage]) -> u64 {
    let words: usize = messages.iter().map(|m| m.text().split_whitespace().count()).sum();
    ((words as f64) * 1.3).floor() as u64
}

const SUMMARIZER_INSTRUCTION: &str = "Summarize the following conversation history concisely, \
preserving facts, decisions, and open questions a continuation would need.";

/// Compress `req.messages` in place if the estimated total is at or above
/// `cfg.threshold_tokens`. `summarizer` is the provider driving
/// `cfg.summary_model` (or the request's own model, if unset).
pub async fn maybe_compress(
    cfg: &CompressionConfig,
    summarizer: &Arc<dyn ModelProvider>,
    mut req: ChatCompletionRequest,
) -> ChatCompletionRequest {
    if !cfg.enabled || estimate_tokens(&req.messages) < cfg.threshold_tokens {
        return req;
    }

    let leading_system = req.messages.first().filter(|m| matches!(m.role, Role::System)).cloned();
    let body_start = if leading_system.is_some() { 1 } else { 0 };
    if req.messages.len() <= body_start + cfg.keep_recent {
        return req;
    }

    let split_at = req.messages.len() - cfg.keep_recent;
    let to_summarize = &req.messages[body_start..split_at];
    let recent = req.messages[split_at..].to_vec();

    let transcript = to_summarize
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.text()))
        .collect::<Vec<_>>()
        .join("\n");

    let summary_model = cfg.summary_model.clone().unwrap_or_else(|| req.model.clone());
    let summarize_req = ChatCompletionRequest {
        model: summary_model,
        messages: vec![
            ChatMessage {
                role: Role::System,
                content: Value::String(SUMMARIZER_INSTRUCTION.to_string()),
                name: None,
                tool_call_id: None,
                tool_calls: None,
                extra: Default::default(),
            },
            ChatMessage {
                role: Role::User,
                content: Value::String(transcript),
                name: None,
                tool_call_id: None,
                tool_calls: None,
                extra: Default::default(),
            },
        ],
        stream: Some(false),
        temperature: None,
        max_tokens: None,
        tools: None,
        tool_choice: None,
        extra: Default::default(),
    };

    let summary_text = match summarizer.complete(&summarize_req).await {
        Ok(resp) => resp.first_message().map(|m| m.text()),
        Err(_) => None,
    };

    let Some(summary_text) = summary_text else { return req };

    let summary_message = ChatMessage {
        role: Role::System,
        content: Value::String(format!("[compressed context summary]\n{summary_text}")),
        name: None,
        tool_call_id: None,
        tool_calls: None,
        extra: Default::default(),
    };

    let mut new_messages = Vec::with_capacity(2 + recent.len());
    if let Some(sys) = leading_system {
        new_messages.push(sys);
    }
    new_messages.push(summary_message);
    new_messages.extend(recent);
    req.messages = new_messages;
    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_providers::mock::response_for;
    use conduit_providers::{ProviderResult, Usage};
    use async_trait::async_trait;

    struct StubSummarizer;

    #[async_trait]
    impl ModelProvider for StubSummarizer {
        fn name(&self) -> &'static str {
            "stub"
        }
        async fn complete(&self, _req: &ChatCompletionRequest) -> ProviderResult<conduit_providers::ChatCompletionResponse> {
            Ok(response_for("summarizer", "condensed summary", "stop", Usage { prompt_tokens: 5, completion_tokens: 5 }))
        }
        async fn stream(&self, _req: &ChatCompletionRequest) -> ProviderResult<conduit_providers::ByteStream> {
            unimplemented!()
        }
    }

    fn long_request(word_count: usize, keep_recent: usize) -> (ChatCompletionRequest, CompressionConfig) {
        let mut messages = vec![serde_json::json!({"role": "system", "content": "you are a bot"})];
        let filler = "word ".repeat(word_count);
        for i in 0..20 {
            messages.push(serde_json::json!({"role": "user", "content": format!("{filler} turn {i}")}));
        }
        let req = serde_json::from_value(serde_json::json!({"model": "gpt-4o", "messages": messages})).unwrap();
        let cfg = CompressionConfig { enabled: true, threshold_tokens: 100, keep_recent, summary_model: Some("gpt-4o-mini".into()) };
        (req, cfg)
    }

    #[tokio::test]
    async fn compresses_when_over_threshold_keeping_recent_tail() {
        let (req, cfg) = long_request(50, 3);
        let summarizer: Arc<dyn ModelProvider> = Arc::new(StubSummarizer);
        let total_before = req.messages.len();
        let compressed = maybe_compress(&cfg, &summarizer, req).await;
        assert!(compressed.messages.len() < total_before);
        assert!(compressed.messages.iter().any(|m| m.text().contains("condensed summary")));
        assert!(matches!(compressed.messages[0].role, Role::System));
    }

    #[tokio::test]
    async fn under_threshold_passes_through_untouched() {
        let (req, mut cfg) = long_request(1, 3);
        cfg.threshold_tokens = 1_000_000;
        let summarizer: Arc<dyn ModelProvider> = Arc::new(StubSummarizer);
        let before_len = req.messages.len();
        let after = maybe_compress(&cfg, &summarizer, req).await;
        assert_eq!(after.messages.len(), before_len);
    }

    #[tokio::test]
    async fn disabled_is_a_no_op() {
        let (req, mut cfg) = long_request(50, 3);
        cfg.enabled = false;
        let summarizer: Arc<dyn ModelProvider> = Arc::new(StubSummarizer);
        let before_len = req.messages.len();
        let after = maybe_compress(&cfg, &summarizer, req).await;
        assert_eq!(after.messages.len(), before_len);
    }
}
