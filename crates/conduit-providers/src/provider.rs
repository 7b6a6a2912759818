// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The provider abstraction the upstream client dispatches to (`spec.md`
//! §4.11.1): one trait, one implementation per wire dialect.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use crate::error::ProviderResult;
use crate::types::{ChatCompletionRequest, ChatCompletionResponse};

pub type ByteStream = Pin<Box<dyn Stream<Item = ProviderResult<Bytes>> + Send>>;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Lowercase provider name as recorded on `requests.provider`.
    fn name(&self) -> &'static str;

    /// Buffered (non-streaming) completion. `req.model` is already the
    /// concrete (possibly failed-over) model name.
    async fn complete(&self, req: &ChatCompletionRequest) -> ProviderResult<ChatCompletionResponse>;

    /// Raw SSE bytes, forwarded verbatim to the client by the streaming
    /// stage (§4.11.5 "inspect-and-forward"). Chunks are OpenAI-shaped
    /// `data: {...}\n\n` lines terminated by `data: [DONE]\n\n`.
    async fn stream(&self, req: &ChatCompletionRequest) -> ProviderResult<ByteStream>;
}
