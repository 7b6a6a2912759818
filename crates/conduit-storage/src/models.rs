// SPDX-License-Identifier: Apache-2.0
//! Row types for the five tables in `spec.md` §6.3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completed top-level request (`spec.md` §3 "Usage record").
///
/// Never mutated once written — every pipeline run inserts exactly one row,
/// even when the tool loop made several upstream calls (tokens and cost are
/// the sum over all rounds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub agent_name: String,
    pub model: String,
    pub provider: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: f64,
    pub duration_ms: i64,
    pub status_code: i32,
}

/// A cached response, keyed by `(sha256_hash, model)` (§3 "Cache entry").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub sha256_hash: String,
    pub model: String,
    pub response_body: Vec<u8>,
    /// Little-endian float32 embedding blob, present only when an embedder
    /// was configured at write time.
    pub embedding: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
}

/// Per-session model/temperature/max_tokens override (§3 "Session override").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionOverride {
    pub session_id: String,
    pub agent_name: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Append-only audit trail entry (§3 "Audit event").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    ToolCall,
    FirewallBlock,
    FirewallWarn,
    ContentLog,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::ToolCall => "tool_call",
            AuditEventType::FirewallBlock => "firewall_block",
            AuditEventType::FirewallWarn => "firewall_warn",
            AuditEventType::ContentLog => "content_log",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tool_call" => Some(Self::ToolCall),
            "firewall_block" => Some(Self::FirewallBlock),
            "firewall_warn" => Some(Self::FirewallWarn),
            "content_log" => Some(Self::ContentLog),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    pub agent_name: String,
    /// Opaque JSON payload — shape depends on `event_type`.
    pub details: serde_json::Value,
}

/// A new audit event to be written; `id`/`timestamp` are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEvent {
    pub event_type: AuditEventType,
    pub agent_name: String,
    pub details: serde_json::Value,
}

/// Record of a webhook delivery attempt, kept for dedup/debugging. Delivery
/// itself is the out-of-scope webhook-execution collaborator; this table
/// only records that a payload was (or should have been) sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookExecution {
    pub id: i64,
    pub name: String,
    pub agent_name: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
