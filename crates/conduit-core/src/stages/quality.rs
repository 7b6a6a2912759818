// SPDX-License-Identifier: Apache-2.0
//! Response policy and quality gate (`spec.md` §4.12): both non-streaming
//! only, applied after the upstream client returns a final response.
//!
//! Response policy rewrites the response (redaction, truncation, format
//! check) and never aborts the request. The quality gate classifies the
//! (possibly rewritten) response and decides whether to retry, warn, or
//! reject, per the configured action for the detected condition.

use conduit_config::{QualityAction, QualityGateConfig, RedactPattern, ResponsePolicyConfig};
use conduit_providers::ChatCompletionResponse;
use regex::Regex;
use serde_json::Value;

use crate::error::PipelineError;

/// Apply redaction, truncation, and format-validation to `resp`'s first
/// choice in place. Global patterns run before per-agent patterns; both
/// lists run in full (a message can match several rules). Returns the
/// names of the rules that actually changed something, for the
/// `X-Response-Policy` header (`spec.md` §6.1, e.g. `redact:api-keys,
/// truncate`).
pub fn apply_response_policy(cfg: &ResponsePolicyConfig, agent_name: &str, mut resp: ChatCompletionResponse) -> (ChatCompletionResponse, Vec<String>) {
    if !cfg.enabled {
        return (resp, Vec::new());
    }
    let agent_policy = cfg.agents.get(agent_name);
    let mut applied = Vec::new();

    let Some(choice) = resp.choices.first_mut() else { return (resp, applied) };
    let mut text = choice.message.text();

    for pattern in cfg.redact_patterns.iter().chain(agent_policy.map(|p| p.redact_patterns.iter()).into_iter().flatten()) {
        let redacted = redact(pattern, &text);
        if redacted != text {
            applied.push(format!("redact:{}", pattern.name));
        }
        text = redacted;
    }

    let max_chars = agent_policy.and_then(|p| p.max_output_chars).or(cfg.max_output_chars);
    if let Some(max) = max_chars {
        if text.chars().count() > max {
            text = text.chars().take(max).collect();
            applied.push("truncate".to_string());
        }
    }

    choice.message.content = Value::String(text.clone());

    let force_format = agent_policy.and_then(|p| p.force_format.as_deref()).or(cfg.force_format.as_deref());
    if force_format == Some("json") && serde_json::from_str::<Value>(&text).is_err() {
        resp.extra.insert("response_policy_warning".to_string(), Value::String("force_format=json did not parse".to_string()));
        applied.push("format:json-invalid".to_string());
    }

    (resp, applied)
}

fn redact(pattern: &RedactPattern, text: &str) -> String {
    match Regex::new(&pattern.pattern) {
        Ok(re) => re.replace_all(text, pattern.replacement.as_str()).to_string(),
        Err(e) => {
            tracing::warn!(pattern = %pattern.name, error = %e, "response policy: failed to compile redact pattern");
            text.to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityIssue {
    Empty,
    Truncated,
    Refusal,
}

const REFUSAL_PHRASES: &[&str] = &["i cannot assist", "i can't help with that", "i'm unable to help", "as an ai language model, i cannot"];

pub fn classify(resp: &ChatCompletionResponse) -> Option<QualityIssue> {
    let text = resp.first_message().map(|m| m.text()).unwrap_or_default();
    if text.trim().is_empty() {
        return Some(QualityIssue::Empty);
    }
    if resp.finish_reason() == Some("length") {
        return Some(QualityIssue::Truncated);
    }
    let lower = text.to_lowercase();
    if REFUSAL_PHRASES.iter().any(|p| lower.contains(p)) {
        return Some(QualityIssue::Refusal);
    }
    None
}

pub fn action_for(cfg: &QualityGateConfig, issue: QualityIssue) -> QualityAction {
    match issue {
        QualityIssue::Empty => cfg.on_empty,
        QualityIssue::Truncated => cfg.on_truncated,
        QualityIssue::Refusal => cfg.on_refusal,
    }
}

pub fn reject_error(issue: QualityIssue) -> PipelineError {
    let reason = match issue {
        QualityIssue::Empty => "empty response",
        QualityIssue::Truncated => "truncated response",
        QualityIssue::Refusal => "model refused",
    };
    PipelineError::QualityReject { reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_providers::{Choice, Role, Usage};
    use std::collections::HashMap;

    fn resp_with(content: &str, finish_reason: &str) -> ChatCompletionResponse {
        ChatCompletionResponse {
            id: Some("r".into()),
            model: "gpt-4o".into(),
            choices: vec![Choice {
                index: 0,
                message: conduit_providers::ChatMessage { role: Role::Assistant, content: Value::String(content.into()), name: None, tool_call_id: None, tool_calls: None, extra: Default::default() },
                finish_reason: Some(finish_reason.into()),
            }],
            usage: Usage::default(),
            extra: Default::default(),
        }
    }

    #[test]
    fn classifies_empty_response() {
        assert_eq!(classify(&resp_with("   ", "stop")), Some(QualityIssue::Empty));
    }

    #[test]
    fn classifies_truncated_response() {
        assert_eq!(classify(&resp_with("partial thought", "length")), Some(QualityIssue::Truncated));
    }

    #[test]
    fn classifies_refusal() {
        assert_eq!(classify(&resp_with("I cannot assist with that request.", "stop")), Some(QualityIssue::Refusal));
    }

    #[test]
    fn clean_response_has_no_issue() {
        assert_eq!(classify(&resp_with("here is your answer", "stop")), None);
    }

    #[test]
    fn defaults_match_configured_actions() {
        let cfg = QualityGateConfig { enabled: true, max_retries: 2, on_empty: QualityAction::Retry, on_truncated: QualityAction::Warn, on_refusal: QualityAction::Warn };
        assert_eq!(action_for(&cfg, QualityIssue::Empty), QualityAction::Retry);
        assert_eq!(action_for(&cfg, QualityIssue::Truncated), QualityAction::Warn);
        assert_eq!(action_for(&cfg, QualityIssue::Refusal), QualityAction::Warn);
    }

    #[test]
    fn redaction_replaces_matches() {
        let cfg = ResponsePolicyConfig {
            enabled: true,
            max_output_chars: None,
            force_format: None,
            redact_patterns: vec![RedactPattern { name: "email".into(), pattern: r"\S+@\S+\.\S+".into(), replacement: "[EMAIL]".into() }],
            agents: HashMap::new(),
        };
        let (resp, applied) = apply_response_policy(&cfg, "agent-a", resp_with("contact me at a@b.com please", "stop"));
        assert_eq!(resp.first_message().unwrap().text(), "contact me at [EMAIL] please");
        assert_eq!(applied, vec!["redact:email".to_string()]);
    }

    #[test]
    fn truncates_to_max_output_chars() {
        let cfg = ResponsePolicyConfig { enabled: true, max_output_chars: Some(5), force_format: None, redact_patterns: vec![], agents: HashMap::new() };
        let (resp, applied) = apply_response_policy(&cfg, "agent-a", resp_with("0123456789", "stop"));
        assert_eq!(resp.first_message().unwrap().text(), "01234");
        assert_eq!(applied, vec!["truncate".to_string()]);
    }
}
