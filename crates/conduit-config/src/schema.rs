// SPDX-License-Identifier: Apache-2.0
//! Configuration schema (`spec.md` §6.4).
//!
//! Every option is optional except that at least one provider key must be
//! set for the gateway to do anything useful — that constraint is enforced
//! by the binary at startup, not by this schema (a `Config` with no keys at
//! all still deserializes and is useful in tests).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub keys: ProviderKeys,
    /// SQLite path (plain filesystem path) or `postgres://…` connection
    /// string. Dialect is inferred from this string by `conduit-storage`.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub budgets: HashMap<String, BudgetConfig>,
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimitConfig>,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub firewall: FirewallConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub quality_gate: QualityGateConfig,
    #[serde(default)]
    pub prompt_templates: PromptTemplatesConfig,
    #[serde(default)]
    pub experiments: Vec<ExperimentConfig>,
    #[serde(default)]
    pub tracing: TracingConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub session_overrides: SessionOverridesConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
    #[serde(default)]
    pub response_policy: ResponsePolicyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub deepseek: Option<String>,
}

// ── Budget / rate limit ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub daily_limit_usd: Option<f64>,
    pub monthly_limit_usd: Option<f64>,
    /// Percent of either limit at which an alert webhook fires (e.g. `80.0`).
    pub alert_at_percent: Option<f64>,
    /// Name of the `webhooks.definitions.<name>` entry to notify.
    pub alert_webhook: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: Option<u32>,
    pub requests_per_hour: Option<u32>,
}

// ── Tools / MCP ───────────────────────────────────────────────────────────────

fn default_max_iterations() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Maximum tool-call rounds in a single top-level request (§4.11.3).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default)]
    pub servers: HashMap<String, McpServerConfig>,
    #[serde(default)]
    pub agents: HashMap<String, AgentToolAccess>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { max_iterations: default_max_iterations(), servers: HashMap::new(), agents: HashMap::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Per-agent tool visibility. `allow` takes precedence over `deny` when both
/// are set (§4.14). An agent absent from this map sees every tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentToolAccess {
    pub allow: Option<Vec<String>>,
    pub deny: Option<Vec<String>>,
}

// ── Failover ──────────────────────────────────────────────────────────────────

fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// model → ordered substitution chain, tried in order on 5xx/transport error.
    #[serde(default)]
    pub chains: HashMap<String, Vec<String>>,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self { max_retries: default_max_retries(), chains: HashMap::new() }
    }
}

// ── Smart router ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub tiers: HashMap<String, TierConfig>,
    /// model → (tier name → substitute model).
    #[serde(default)]
    pub model_map: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierConfig {
    pub max_message_tokens: u64,
    pub max_messages: u64,
    #[serde(default)]
    pub keywords_absent: Vec<String>,
}

// ── Firewall ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirewallConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallAction {
    Block,
    Warn,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallRule {
    pub name: String,
    pub category: String,
    pub pattern: String,
    pub action: FirewallAction,
}

// ── Semantic cache ────────────────────────────────────────────────────────────

fn default_similarity_threshold() -> f64 {
    0.95
}
fn default_ttl_minutes() -> i64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: false, similarity_threshold: default_similarity_threshold(), ttl_minutes: default_ttl_minutes() }
    }
}

// ── Context compression ───────────────────────────────────────────────────────

fn default_threshold_tokens() -> u64 {
    50_000
}
fn default_keep_recent() -> usize {
    6
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_threshold_tokens")]
    pub threshold_tokens: u64,
    #[serde(default = "default_keep_recent")]
    pub keep_recent: usize,
    pub summary_model: Option<String>,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold_tokens: default_threshold_tokens(),
            keep_recent: default_keep_recent(),
            summary_model: None,
        }
    }
}

// ── Quality gate ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityAction {
    Retry,
    Warn,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_on_empty")]
    pub on_empty: QualityAction,
    #[serde(default = "default_on_truncated")]
    pub on_truncated: QualityAction,
    #[serde(default = "default_on_refusal")]
    pub on_refusal: QualityAction,
}

fn default_on_empty() -> QualityAction {
    QualityAction::Retry
}
fn default_on_truncated() -> QualityAction {
    QualityAction::Warn
}
fn default_on_refusal() -> QualityAction {
    QualityAction::Warn
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: default_max_retries(),
            on_empty: default_on_empty(),
            on_truncated: default_on_truncated(),
            on_refusal: default_on_refusal(),
        }
    }
}

// ── Prompt templates ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PromptPosition {
    #[default]
    Prepend,
    Append,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptTemplatesConfig {
    #[serde(default)]
    pub enabled: bool,
    pub global: Option<String>,
    #[serde(default)]
    pub agents: HashMap<String, String>,
    #[serde(default)]
    pub position: PromptPosition,
}

// ── A/B experiments ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    pub control_model: String,
    pub variant_model: String,
    /// 0–100. Traffic share routed to `variant_model`.
    pub traffic_pct: u8,
}

// ── Tracing ───────────────────────────────────────────────────────────────────

fn default_sample_rate() -> f64 {
    0.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self { enabled: false, sample_rate: default_sample_rate() }
    }
}

// ── Audit ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Log full user message content on every request (`content_log` event type).
    #[serde(default)]
    pub content_log: bool,
    /// Tool names that always get an audit entry regardless of `content_log`.
    #[serde(default)]
    pub dangerous_tools: Vec<String>,
}

// ── Session overrides ──────────────────────────────────────────────────────────

fn default_session_ttl_secs() -> i64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOverridesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_session_ttl_secs")]
    pub default_ttl: i64,
}

impl Default for SessionOverridesConfig {
    fn default() -> Self {
        Self { enabled: true, default_ttl: default_session_ttl_secs() }
    }
}

// ── Webhooks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhooksConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub definitions: HashMap<String, WebhookDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDefinition {
    /// Shared secret for `X-Webhook-Signature: sha256=<hex hmac>` verification.
    pub secret: String,
    pub model: Option<String>,
    pub prompt_template: Option<String>,
    pub callback_url: Option<String>,
}

// ── Response policy ────────────────────────────────────────────────────────────

fn default_redact_replacement() -> String {
    "[REDACTED]".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePolicyConfig {
    #[serde(default)]
    pub enabled: bool,
    pub max_output_chars: Option<usize>,
    /// `"json"` requires the assistant content to parse as JSON (a warning
    /// header is attached on failure, the request is never rejected).
    pub force_format: Option<String>,
    #[serde(default)]
    pub redact_patterns: Vec<RedactPattern>,
    #[serde(default)]
    pub agents: HashMap<String, AgentResponsePolicy>,
}

impl Default for ResponsePolicyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_output_chars: None,
            force_format: None,
            redact_patterns: Vec::new(),
            agents: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactPattern {
    pub name: String,
    pub pattern: String,
    #[serde(default = "default_redact_replacement")]
    pub replacement: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResponsePolicy {
    #[serde(default)]
    pub redact_patterns: Vec<RedactPattern>,
    pub max_output_chars: Option<usize>,
    pub force_format: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_deserializes_from_empty_yaml() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.firewall.enabled);
        assert!(!cfg.cache.enabled);
    }

    #[test]
    fn quality_gate_defaults_match_spec() {
        let cfg = QualityGateConfig::default();
        assert_eq!(cfg.on_empty, QualityAction::Retry);
        assert_eq!(cfg.on_truncated, QualityAction::Warn);
        assert_eq!(cfg.on_refusal, QualityAction::Warn);
    }
}
