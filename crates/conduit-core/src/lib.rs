// SPDX-License-Identifier: Apache-2.0
//! The request pipeline (`spec.md` §2): rate limiting, budgets, session
//! overrides, the firewall, prompt injection, the semantic cache, smart
//! routing, A/B experiments, context compression, the tool loop and
//! upstream client, the response policy and quality gate, and usage
//! recording, composed in that order by [`pipeline::Pipeline`].

mod context;
mod error;
mod fingerprint;
pub mod pipeline;
pub mod stages;
mod upstream;
mod usage;

pub use context::RequestContext;
pub use error::PipelineError;
pub use fingerprint::{canonical_user_content, sha256_hex};
pub use pipeline::{Pipeline, PipelineResponse};
pub use upstream::{UpstreamCall, UpstreamOutcome};
pub use usage::UsageSummary;
