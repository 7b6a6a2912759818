// SPDX-License-Identifier: Apache-2.0
//! DeepSeek driver — OpenAI-compatible, just a different base URL
//! (`spec.md` §4.11.1 "DeepSeek... speak[s] the OpenAI chat-completions
//! wire format").

use crate::openai_compat::OpenAiCompatProvider;

pub fn new(api_key: impl Into<String>) -> OpenAiCompatProvider {
    OpenAiCompatProvider::new("deepseek", "https://api.deepseek.com", api_key)
}
