// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transport error contacting upstream: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String, retry_after: Option<u64> },
    #[error("no API key configured for provider '{0}'")]
    MissingKey(String),
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// §4.11.4: "HTTP status >= 500 (or transport error)" is the failover
    /// trigger; everything else (incl. 429, surfaced with `Retry-After`
    /// preserved) is not retried by the failover chain.
    pub fn is_failover_eligible(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Upstream { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ProviderError::Upstream { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
