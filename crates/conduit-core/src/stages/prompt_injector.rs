// SPDX-License-Identifier: Apache-2.0
//! Prompt injection (`spec.md` §4.6): merge a global template with a
//! per-agent template, then insert the result into the system message at
//! position 0 — creating one if the request has none.

use conduit_config::{PromptPosition, PromptTemplatesConfig};
use conduit_providers::{ChatMessage, Role};
use serde_json::Value;

use conduit_providers::ChatCompletionRequest;

/// The effective template text for `agent_name`: global and per-agent
/// templates are joined with a blank line when both are set.
fn effective_template(cfg: &PromptTemplatesConfig, agent_name: &str) -> Option<String> {
    let agent = cfg.agents.get(agent_name).cloned();
    match (&cfg.global, &agent) {
        (Some(g), Some(a)) => Some(format!("{g}\n\n{a}")),
        (Some(g), None) => Some(g.clone()),
        (None, Some(a)) => Some(a.clone()),
        (None, None) => None,
    }
}

pub fn apply(cfg: &PromptTemplatesConfig, agent_name: &str, mut req: ChatCompletionRequest) -> ChatCompletionRequest {
    if !cfg.enabled {
        return req;
    }
    let Some(template) = effective_template(cfg, agent_name) else { return req };

    match req.messages.iter_mut().find(|m| matches!(m.role, Role::System)) {
        Some(system) => {
            let existing = system.text();
            let merged = match cfg.position {
                PromptPosition::Prepend => format!("{template}\n\n{existing}"),
                PromptPosition::Append => format!("{existing}\n\n{template}"),
            };
            system.content = Value::String(merged);
        }
        None => {
            req.messages.insert(
                0,
                ChatMessage {
                    role: Role::System,
                    content: Value::String(template),
                    name: None,
                    tool_call_id: None,
                    tool_calls: None,
                    extra: Default::default(),
                },
            );
        }
    }
    req
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn req_with_system(system: Option<&str>) -> ChatCompletionRequest {
        let mut messages = Vec::new();
        if let Some(s) = system {
            messages.push(json!({"role": "system", "content": s}));
        }
        messages.push(json!({"role": "user", "content": "hi"}));
        serde_json::from_value(json!({"model": "gpt-4o", "messages": messages})).unwrap()
    }

    #[test]
    fn inserts_new_system_message_when_absent() {
        let cfg = PromptTemplatesConfig {
            enabled: true,
            global: Some("be nice".into()),
            agents: HashMap::new(),
            position: PromptPosition::Prepend,
        };
        let req = apply(&cfg, "agent-a", req_with_system(None));
        assert!(matches!(req.messages[0].role, Role::System));
        assert_eq!(req.messages[0].text(), "be nice");
    }

    #[test]
    fn prepends_into_existing_system_message() {
        let cfg = PromptTemplatesConfig {
            enabled: true,
            global: Some("be nice".into()),
            agents: HashMap::new(),
            position: PromptPosition::Prepend,
        };
        let req = apply(&cfg, "agent-a", req_with_system(Some("you are a bot")));
        assert_eq!(req.messages[0].text(), "be nice\n\nyou are a bot");
    }

    #[test]
    fn per_agent_template_merges_with_global() {
        let mut agents = HashMap::new();
        agents.insert("agent-a".to_string(), "be extra careful".to_string());
        let cfg = PromptTemplatesConfig { enabled: true, global: Some("be nice".into()), agents, position: PromptPosition::Append };
        let req = apply(&cfg, "agent-a", req_with_system(Some("you are a bot")));
        assert_eq!(req.messages[0].text(), "you are a bot\n\nbe nice\n\nbe extra careful");
    }

    #[test]
    fn disabled_is_a_no_op() {
        let cfg = PromptTemplatesConfig { enabled: false, global: Some("be nice".into()), agents: HashMap::new(), position: PromptPosition::Prepend };
        let req = apply(&cfg, "agent-a", req_with_system(None));
        assert_eq!(req.messages.len(), 1);
    }
}
