// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Upstream LLM drivers (`spec.md` §4.11.1): OpenAI and DeepSeek share the
//! OpenAI chat-completions wire format; Anthropic speaks the Messages API
//! and is translated losslessly at the edge.

mod anthropic;
mod deepseek;
pub mod embedding;
mod error;
pub mod mock;
mod openai;
pub mod openai_compat;
mod provider;
mod types;

pub use anthropic::AnthropicProvider;
pub use error::{ProviderError, ProviderResult};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{ByteStream, ModelProvider};
pub use types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Choice, Role, ToolCall,
    ToolCallFunction, ToolDefinition, Usage,
};

use conduit_pricing::Provider;
use std::sync::Arc;

/// Per-provider API keys (`spec.md` §6.4 `keys.{openai,anthropic,deepseek}`).
#[derive(Debug, Clone, Default)]
pub struct ProviderKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub deepseek: Option<String>,
}

/// Build the driver for `provider`, returning `None` when no key is
/// configured for it. Provider derivation itself lives in
/// `conduit-pricing` and never depends on whether a key is present.
pub fn driver_for(provider: Provider, keys: &ProviderKeys) -> Option<Arc<dyn ModelProvider>> {
    match provider {
        Provider::OpenAi => keys.openai.clone().map(|k| Arc::new(openai::new(k)) as Arc<dyn ModelProvider>),
        Provider::Anthropic => keys
            .anthropic
            .clone()
            .map(|k| Arc::new(AnthropicProvider::new(k)) as Arc<dyn ModelProvider>),
        Provider::DeepSeek => keys.deepseek.clone().map(|k| Arc::new(deepseek::new(k)) as Arc<dyn ModelProvider>),
        Provider::Unknown => None,
    }
}
