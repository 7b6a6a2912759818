// SPDX-License-Identifier: Apache-2.0
//! Dual-dialect persistence for `requests`, `cache_entries`,
//! `session_overrides`, `audit_events`, and `webhook_executions`
//! (`spec.md` §6.3).

mod dialect;
mod error;
mod models;
mod schema;
mod store;
mod sweeper;

pub use dialect::Dialect;
pub use error::{StoreError, StoreResult};
pub use models::{
    AuditEvent, AuditEventType, CacheEntry, NewAuditEvent, SessionOverride, UsageRecord,
    WebhookExecution,
};
pub use store::Store;
pub use sweeper::{spawn_cache_sweeper, spawn_session_sweeper, SweeperHandle};
