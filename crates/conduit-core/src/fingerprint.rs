// SPDX-License-Identifier: Apache-2.0
//! Request fingerprinting (`spec.md` §3): the exact-match cache key and the
//! embedding source for the semantic-cache fallback are both derived from
//! the same canonical string.

use conduit_providers::{ChatCompletionRequest, Role};
use sha2::{Digest, Sha256};

/// Newline-joined concatenation of the `content` of every `user`-role
/// message, in order. Invariant under reordering non-user messages and
/// under changing `model` (`spec.md` §8 property 2).
pub fn canonical_user_content(req: &ChatCompletionRequest) -> String {
    req.messages
        .iter()
        .filter(|m| matches!(m.role, Role::User))
        .map(|m| m.text())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(messages: serde_json::Value, model: &str) -> ChatCompletionRequest {
        serde_json::from_value(json!({"model": model, "messages": messages})).unwrap()
    }

    #[test]
    fn stable_under_model_change_and_non_user_reordering() {
        let a = req(
            json!([
                {"role": "system", "content": "sys1"},
                {"role": "user", "content": "hello"},
                {"role": "assistant", "content": "hi"},
            ]),
            "gpt-4o",
        );
        let b = req(
            json!([
                {"role": "assistant", "content": "hi"},
                {"role": "system", "content": "sys1"},
                {"role": "user", "content": "hello"},
            ]),
            "claude-3-5-sonnet-20241022",
        );
        assert_eq!(canonical_user_content(&a), canonical_user_content(&b));
        assert_eq!(sha256_hex(&canonical_user_content(&a)), sha256_hex(&canonical_user_content(&b)));
    }

    #[test]
    fn joins_multiple_user_messages_with_newline() {
        let r = req(
            json!([{"role": "user", "content": "a"}, {"role": "user", "content": "b"}]),
            "gpt-4o",
        );
        assert_eq!(canonical_user_content(&r), "a\nb");
    }
}
