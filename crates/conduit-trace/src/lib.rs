// SPDX-License-Identifier: Apache-2.0
//! Span recording, audit logging, and budget alerting (`spec.md` §5).

mod alert;
mod audit;
mod span;

pub use alert::{Alerter, BudgetAlertPayload, BudgetLimitKind, NullSink, WebhookSink};
pub use audit::AuditLogger;
pub use span::{SpanRecord, TraceSpan};
