// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! OpenAI driver — thin wrapper around the shared [`OpenAiCompatProvider`].

use crate::openai_compat::OpenAiCompatProvider;

pub fn new(api_key: impl Into<String>) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new("openai", "https://api.openai.com/v1", api_key)
}
