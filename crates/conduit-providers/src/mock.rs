// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Deterministic and scripted mock providers for pipeline tests.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use crate::error::ProviderResult;
use crate::provider::{ByteStream, ModelProvider};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, Role, Usage};

pub fn response_for(model: &str, content: &str, finish_reason: &str, usage: Usage) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: Some("mock".to_string()),
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: Role::Assistant,
                content: json!(content),
                name: None,
                tool_call_id: None,
                tool_calls: None,
                extra: Default::default(),
            },
            finish_reason: Some(finish_reason.to_string()),
        }],
        usage,
        extra: Default::default(),
    }
}

/// Echoes the last user message back as `"MOCK: <text>"`. Reports a fixed
/// token count so cost-preservation tests have a known quantity.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, req: &ChatCompletionRequest) -> ProviderResult<ChatCompletionResponse> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.text())
            .unwrap_or_else(|| "[no input]".to_string());
        Ok(response_for(
            &req.model,
            &format!("MOCK: {reply}"),
            "stop",
            Usage { prompt_tokens: 10, completion_tokens: 10 },
        ))
    }

    async fn stream(&self, req: &ChatCompletionRequest) -> ProviderResult<ByteStream> {
        let resp = self.complete(req).await?;
        let chunk = json!({"choices": [{"delta": {"content": "MOCK"}}], "usage": resp.usage});
        let body = format!("data: {chunk}\n\ndata: [DONE]\n\n");
        Ok(Box::pin(futures::stream::once(async move { Ok(Bytes::from(body)) })))
    }
}

/// A queue of canned responses/errors consumed in order — for tests that
/// need to drive the tool loop or failover through specific sequences
/// (e.g. "first call 503s, second call succeeds").
pub struct ScriptedMockProvider {
    name: &'static str,
    script: Mutex<Vec<ProviderResult<ChatCompletionResponse>>>,
}

impl ScriptedMockProvider {
    pub fn new(name: &'static str, script: Vec<ProviderResult<ChatCompletionResponse>>) -> Self {
        ScriptedMockProvider {
            name,
            script: Mutex::new(script),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn complete(&self, _req: &ChatCompletionRequest) -> ProviderResult<ChatCompletionResponse> {
        let mut script = self.script.lock().expect("scripted provider mutex poisoned");
        if script.is_empty() {
            panic!("ScriptedMockProvider script exhausted");
        }
        script.remove(0)
    }

    async fn stream(&self, req: &ChatCompletionRequest) -> ProviderResult<ByteStream> {
        let resp = self.complete(req).await?;
        let chunk = json!({"choices": [{"delta": {"content": resp.first_message().map(|m| m.text()).unwrap_or_default()}}], "usage": resp.usage});
        let body = format!("data: {chunk}\n\ndata: [DONE]\n\n");
        Ok(Box::pin(futures::stream::once(async move { Ok(Bytes::from(body)) })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_last_user_message() {
        let provider = MockProvider;
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "mock-model",
            "messages": [{"role": "user", "content": "ping"}],
        }))
        .unwrap();
        let resp = provider.complete(&req).await.unwrap();
        assert_eq!(resp.first_message().unwrap().text(), "MOCK: ping");
    }

    #[tokio::test]
    async fn scripted_provider_consumes_in_order() {
        let provider = ScriptedMockProvider::new(
            "scripted",
            vec![Ok(response_for("m", "first", "stop", Usage::default()))],
        );
        let req: ChatCompletionRequest = serde_json::from_value(json!({"model": "m", "messages": []})).unwrap();
        let resp = provider.complete(&req).await.unwrap();
        assert_eq!(resp.first_message().unwrap().text(), "first");
    }
}
