// SPDX-License-Identifier: Apache-2.0
//! Per-request trace spans (`spec.md` §5: "Trace span list: one mutex per
//! trace, locking only during `Spans()` and span append").

use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One completed pipeline-stage timing, recorded into a [`TraceSpan`].
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    pub stage: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub detail: Option<serde_json::Value>,
}

/// Accumulates spans for a single top-level request. Cheap to clone an
/// `Arc<TraceSpan>` across stages; the inner mutex is only held for the
/// length of an append or a `spans()` snapshot.
pub struct TraceSpan {
    id: String,
    spans: Mutex<Vec<SpanRecord>>,
}

impl TraceSpan {
    /// A 24-hex-char id, matching the `X-Trace-ID` response header format
    /// (`spec.md` §6.1).
    pub fn new() -> Self {
        let id = Uuid::new_v4().simple().to_string()[..24].to_string();
        TraceSpan {
            id,
            spans: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn record(&self, stage: &str, started_at: Instant, detail: Option<serde_json::Value>) {
        let duration_ms = started_at.elapsed().as_millis() as u64;
        let record = SpanRecord {
            stage: stage.to_string(),
            started_at: Utc::now(),
            duration_ms,
            detail,
        };
        self.spans.lock().expect("trace span mutex poisoned").push(record);
    }

    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().expect("trace span mutex poisoned").clone()
    }
}

impl Default for TraceSpan {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_24_hex_chars() {
        let span = TraceSpan::new();
        assert_eq!(span.id().len(), 24);
        assert!(span.id().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn record_and_spans_round_trip() {
        let span = TraceSpan::new();
        let start = Instant::now();
        span.record("rate_limiter", start, None);
        span.record("firewall", start, Some(serde_json::json!({"matched": "none"})));
        let recorded = span.spans();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].stage, "rate_limiter");
        assert_eq!(recorded[1].stage, "firewall");
    }
}
