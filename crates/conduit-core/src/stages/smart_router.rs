// SPDX-License-Identifier: Apache-2.0
//! Complexity-tiered routing (`spec.md` §4.8): classify the request into
//! the cheapest tier whose limits it fits, then substitute the model
//! configured for that tier (if any).
//!
//! Tiers are evaluated in sorted-by-name order (not map-iteration order,
//! which HashMap does not guarantee) so that with multiple tiers matching,
//! routing is deterministic run to run — the resolution recorded for the
//! "tier evaluation order" open question.

use conduit_providers::{ChatCompletionRequest, Role};

use conduit_config::RoutingConfig;

/// Rough token estimate: word count × 1.3, matching the spec's
/// "approximate, not a tokenizer" guidance. System messages are excluded
/// from the message count but their words still count toward the token
/// estimate and the keyword scan, since system prompts can carry
/// complexity signals (e.g. "respond step by step").
fn estimate_tokens(req: &ChatCompletionRequest) -> u64 {
    let words: usize = req.messages.iter().map(|m| m.text().split_whitespace().count()).sum();
    ((words as f64) * 1.3).floor() as u64
}

fn non_system_message_count(req: &ChatCompletionRequest) -> u64 {
    req.messages.iter().filter(|m| !matches!(m.role, Role::System)).count() as u64
}

fn contains_any_keyword(req: &ChatCompletionRequest, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let haystack: String = req.messages.iter().map(|m| m.text()).collect::<Vec<_>>().join(" ").to_lowercase();
    keywords.iter().any(|k| haystack.contains(&k.to_lowercase()))
}

/// Pick the substitute model for `req`, if routing is enabled and a tier
/// matches. Tiers are tried in sorted-name order; the first tier whose
/// `max_message_tokens`/`max_messages` both hold and whose `keywords_absent`
/// list doesn't appear in the content wins.
pub fn route(cfg: &RoutingConfig, req: &ChatCompletionRequest) -> Option<String> {
    if !cfg.enabled {
        return None;
    }
    let Some(model_map) = cfg.model_map.get(&req.model) else { return None };

    let tokens = estimate_tokens(req);
    let messages = non_system_message_count(req);

    let mut tier_names: Vec<&String> = cfg.tiers.keys().collect();
    tier_names.sort();

    for tier_name in tier_names {
        let tier = &cfg.tiers[tier_name];
        if tokens > tier.max_message_tokens || messages > tier.max_messages {
            continue;
        }
        if contains_any_keyword(req, &tier.keywords_absent) {
            continue;
        }
        if let Some(substitute) = model_map.get(tier_name) {
            return Some(substitute.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_config::TierConfig;
    use std::collections::HashMap;

    fn req(text: &str) -> ChatCompletionRequest {
        serde_json::from_value(serde_json::json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": text}],
        }))
        .unwrap()
    }

    fn routing_cfg() -> RoutingConfig {
        let mut tiers = HashMap::new();
        tiers.insert("simple".to_string(), TierConfig { max_message_tokens: 50, max_messages: 5, keywords_absent: vec!["code".into()] });
        tiers.insert("complex".to_string(), TierConfig { max_message_tokens: 100_000, max_messages: 1000, keywords_absent: vec![] });
        let mut model_map = HashMap::new();
        let mut sub = HashMap::new();
        sub.insert("simple".to_string(), "gpt-4o-mini".to_string());
        sub.insert("complex".to_string(), "gpt-4o".to_string());
        model_map.insert("gpt-4o".to_string(), sub);
        RoutingConfig { enabled: true, tiers, model_map }
    }

    #[test]
    fn short_request_routes_to_simple_tier() {
        let cfg = routing_cfg();
        let got = route(&cfg, &req("hello there"));
        assert_eq!(got, Some("gpt-4o-mini".to_string()));
    }

    #[test]
    fn keyword_presence_skips_tier() {
        let cfg = routing_cfg();
        let got = route(&cfg, &req("please write some code for me"));
        assert_eq!(got, Some("gpt-4o".to_string()));
    }

    #[test]
    fn disabled_routing_is_a_no_op() {
        let mut cfg = routing_cfg();
        cfg.enabled = false;
        assert_eq!(route(&cfg, &req("hello")), None);
    }

    #[test]
    fn unmapped_model_is_a_no_op() {
        let cfg = routing_cfg();
        let mut r = req("hello");
        r.model = "claude-3-5-sonnet-20241022".into();
        assert_eq!(route(&cfg, &r), None);
    }
}
