// SPDX-License-Identifier: Apache-2.0
//! Request header extraction (`spec.md` §6.1): `X-Agent-Name`,
//! `X-Session-ID`, `X-Force-Model`. An empty or absent `X-Agent-Name` is
//! treated as "no agent" and falls back to `"default"` — every per-agent
//! stage (budgets, rate limits, routing, tool access) keys off this value.

use axum::http::HeaderMap;

const DEFAULT_AGENT: &str = "default";

pub fn agent_name(headers: &HeaderMap) -> String {
    headers
        .get("x-agent-name")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_AGENT)
        .to_string()
}

pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-session-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Presence of a non-empty value bypasses the smart router and A/B
/// experimenter (§4.1).
pub fn force_model(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-force-model")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut m = HeaderMap::new();
        for (k, v) in pairs {
            m.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                axum::http::HeaderValue::from_str(v).unwrap(),
            );
        }
        m
    }

    #[test]
    fn blank_agent_name_falls_back_to_default() {
        let h = headers_with(&[("x-agent-name", "   ")]);
        assert_eq!(agent_name(&h), "default");
    }

    #[test]
    fn missing_agent_name_falls_back_to_default() {
        assert_eq!(agent_name(&HeaderMap::new()), "default");
    }

    #[test]
    fn agent_name_is_trimmed() {
        let h = headers_with(&[("x-agent-name", " a1 ")]);
        assert_eq!(agent_name(&h), "a1");
    }

    #[test]
    fn force_model_absent_by_default() {
        assert!(force_model(&HeaderMap::new()).is_none());
    }
}
