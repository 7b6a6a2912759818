// SPDX-License-Identifier: Apache-2.0
//! Pipeline error taxonomy (`spec.md` §7). Every stage that can abort a
//! request early returns one of these instead of reaching for a raw HTTP
//! status, so the entrypoint is the only place that knows about status
//! codes.

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed request body: {0}")]
    MalformedInput(String),

    #[error("blocked by firewall rule {rule} ({category})")]
    PolicyBlock { rule: String, category: String },

    #[error("rejected by quality gate: {reason}")]
    QualityReject { reason: String },

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("budget exceeded")]
    BudgetExceeded { limit_kind: &'static str },

    #[error("upstream request failed")]
    UpstreamTransient,

    #[error("upstream rejected the request")]
    UpstreamPermanent { status: u16, body: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::MalformedInput(_) => 400,
            PipelineError::PolicyBlock { .. } => 403,
            PipelineError::QualityReject { .. } => 422,
            PipelineError::RateLimited { .. } => 429,
            PipelineError::BudgetExceeded { .. } => 429,
            PipelineError::UpstreamTransient => 502,
            PipelineError::UpstreamPermanent { status, .. } => *status,
            PipelineError::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::MalformedInput(_) => "malformed_input",
            PipelineError::PolicyBlock { .. } => "policy_block",
            PipelineError::QualityReject { .. } => "quality_reject",
            PipelineError::RateLimited { .. } => "rate_limited",
            PipelineError::BudgetExceeded { .. } => "budget_exceeded",
            PipelineError::UpstreamTransient => "upstream_transient",
            PipelineError::UpstreamPermanent { .. } => "upstream_permanent",
            PipelineError::Internal(_) => "internal",
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            PipelineError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }

    pub fn to_json_body(&self) -> Value {
        json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

impl From<conduit_providers::ProviderError> for PipelineError {
    /// §4.11.4: a 429 is never failover-eligible but also isn't a hard
    /// failure — it passes through as a rate limit with `Retry-After`
    /// preserved. 5xx and transport errors are failover-eligible
    /// (`UpstreamTransient`); any other 4xx surfaces immediately.
    fn from(e: conduit_providers::ProviderError) -> Self {
        match e {
            conduit_providers::ProviderError::Transport(_) => PipelineError::UpstreamTransient,
            conduit_providers::ProviderError::Upstream { status: 429, retry_after, .. } => {
                PipelineError::RateLimited { retry_after_secs: retry_after.unwrap_or(1) }
            }
            conduit_providers::ProviderError::Upstream { status, .. } if status >= 500 => {
                PipelineError::UpstreamTransient
            }
            conduit_providers::ProviderError::Upstream { status, body, .. } => {
                PipelineError::UpstreamPermanent { status, body }
            }
            conduit_providers::ProviderError::MissingKey(m) => {
                PipelineError::Internal(format!("no API key configured for model {m}"))
            }
            conduit_providers::ProviderError::Decode(_) => PipelineError::UpstreamTransient,
        }
    }
}

impl From<conduit_storage::StoreError> for PipelineError {
    fn from(e: conduit_storage::StoreError) -> Self {
        PipelineError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(PipelineError::MalformedInput("x".into()).status_code(), 400);
        assert_eq!(PipelineError::PolicyBlock { rule: "r".into(), category: "c".into() }.status_code(), 403);
        assert_eq!(PipelineError::RateLimited { retry_after_secs: 5 }.status_code(), 429);
        assert_eq!(PipelineError::BudgetExceeded { limit_kind: "daily" }.status_code(), 429);
        assert_eq!(PipelineError::QualityReject { reason: "r".into() }.status_code(), 422);
    }

    #[test]
    fn json_body_has_error_envelope() {
        let e = PipelineError::PolicyBlock { rule: "ssn".into(), category: "pii".into() };
        let v = e.to_json_body();
        assert_eq!(v["error"]["code"], "policy_block");
    }
}
