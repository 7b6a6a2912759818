// SPDX-License-Identifier: Apache-2.0
//! Budget alerting (`spec.md` §5 "Alerter dedup map: single mutex around
//! `(agent -> last_sent_at)` map", §6.4 `budgets.<agent>.alert_at_percent`).
//!
//! This module only builds the payload and decides *whether* to send — the
//! actual webhook POST is the out-of-scope webhook-execution collaborator,
//! represented here by the [`WebhookSink`] trait so a caller can plug in
//! real delivery without `conduit-trace` depending on an HTTP client.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetLimitKind {
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetAlertPayload {
    pub agent_name: String,
    pub percent: f64,
    pub limit_kind: BudgetLimitKind,
    pub limit_usd: f64,
    pub spent_usd: f64,
}

#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn send_budget_alert(&self, payload: &BudgetAlertPayload);
}

/// A sink that does nothing — the default when no `alert_webhook` is
/// configured for an agent.
pub struct NullSink;

#[async_trait]
impl WebhookSink for NullSink {
    async fn send_budget_alert(&self, _payload: &BudgetAlertPayload) {}
}

const DEFAULT_COOLDOWN_MINUTES: i64 = 5;

/// De-duplicates repeated budget-threshold crossings per agent so a single
/// agent hammering past its limit doesn't fire a webhook on every request.
pub struct Alerter {
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
    cooldown: Duration,
}

impl Alerter {
    pub fn new() -> Self {
        Alerter {
            last_sent: Mutex::new(HashMap::new()),
            cooldown: Duration::minutes(DEFAULT_COOLDOWN_MINUTES),
        }
    }

    pub fn with_cooldown(cooldown: Duration) -> Self {
        Alerter {
            last_sent: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    /// Returns `true` if an alert for `agent_name` should fire now (and
    /// records that it did), `false` if still within the cooldown window.
    fn should_fire(&self, agent_name: &str) -> bool {
        let now = Utc::now();
        let mut map = self.last_sent.lock().expect("alerter mutex poisoned");
        match map.get(agent_name) {
            Some(last) if now - *last < self.cooldown => false,
            _ => {
                map.insert(agent_name.to_string(), now);
                true
            }
        }
    }

    /// Fire a budget alert through `sink` if `percent` has crossed
    /// `alert_at_percent` and the cooldown has elapsed.
    pub async fn maybe_alert(
        &self,
        sink: &dyn WebhookSink,
        agent_name: &str,
        percent: f64,
        alert_at_percent: f64,
        limit_kind: BudgetLimitKind,
        limit_usd: f64,
        spent_usd: f64,
    ) {
        if percent < alert_at_percent {
            return;
        }
        if !self.should_fire(agent_name) {
            return;
        }
        let payload = BudgetAlertPayload {
            agent_name: agent_name.to_string(),
            percent,
            limit_kind,
            limit_usd,
            spent_usd,
        };
        sink.send_budget_alert(&payload).await;
    }
}

impl Default for Alerter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl WebhookSink for CountingSink {
        async fn send_budget_alert(&self, _payload: &BudgetAlertPayload) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn fires_once_then_cools_down() {
        let alerter = Alerter::new();
        let sink = CountingSink(AtomicUsize::new(0));
        alerter
            .maybe_alert(&sink, "agent-a", 90.0, 80.0, BudgetLimitKind::Daily, 10.0, 9.0)
            .await;
        alerter
            .maybe_alert(&sink, "agent-a", 95.0, 80.0, BudgetLimitKind::Daily, 10.0, 9.5)
            .await;
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_fire_below_threshold() {
        let alerter = Alerter::new();
        let sink = CountingSink(AtomicUsize::new(0));
        alerter
            .maybe_alert(&sink, "agent-a", 50.0, 80.0, BudgetLimitKind::Daily, 10.0, 5.0)
            .await;
        assert_eq!(sink.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn different_agents_do_not_share_cooldown() {
        let alerter = Alerter::new();
        let sink = CountingSink(AtomicUsize::new(0));
        alerter
            .maybe_alert(&sink, "agent-a", 90.0, 80.0, BudgetLimitKind::Daily, 10.0, 9.0)
            .await;
        alerter
            .maybe_alert(&sink, "agent-b", 90.0, 80.0, BudgetLimitKind::Daily, 10.0, 9.0)
            .await;
        assert_eq!(sink.0.load(Ordering::SeqCst), 2);
    }
}
