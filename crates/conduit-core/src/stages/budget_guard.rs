// SPDX-License-Identifier: Apache-2.0
//! Budget enforcement (`spec.md` §4.3): daily/monthly spend caps per agent,
//! checked against `requests.cost_usd` sums. Fails open on a DB error —
//! a persistence outage must not become an outright outage for agents that
//! would otherwise pass.

use chrono::{Datelike, Utc};
use conduit_config::BudgetConfig;
use conduit_storage::Store;
use conduit_trace::{Alerter, BudgetLimitKind, WebhookSink};
use tracing::warn;

use crate::error::PipelineError;

pub struct BudgetCheck {
    pub daily_percent: Option<f64>,
    pub monthly_percent: Option<f64>,
}

/// Sum spend since midnight UTC and since the start of the current month,
/// compare against `cfg`'s limits, and fire an alert webhook once per
/// cooldown window when a limit's `alert_at_percent` is crossed.
pub async fn check_budget(
    store: &Store,
    alerter: &Alerter,
    sink: &dyn WebhookSink,
    agent_name: &str,
    cfg: Option<&BudgetConfig>,
) -> Result<BudgetCheck, PipelineError> {
    let Some(cfg) = cfg else {
        return Ok(BudgetCheck { daily_percent: None, monthly_percent: None });
    };

    let now = Utc::now();
    let day_start = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let month_start = now.date_naive().with_day(1).unwrap().and_hms_opt(0, 0, 0).unwrap().and_utc();

    let daily_spent = match store.spend_since(agent_name, day_start).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "budget guard: spend_since(daily) failed, failing open");
            return Ok(BudgetCheck { daily_percent: None, monthly_percent: None });
        }
    };
    let monthly_spent = match store.spend_since(agent_name, month_start).await {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "budget guard: spend_since(monthly) failed, failing open");
            return Ok(BudgetCheck { daily_percent: None, monthly_percent: None });
        }
    };

    let daily_percent = cfg.daily_limit_usd.filter(|l| *l > 0.0).map(|l| daily_spent / l * 100.0);
    let monthly_percent = cfg.monthly_limit_usd.filter(|l| *l > 0.0).map(|l| monthly_spent / l * 100.0);

    if let (Some(limit), Some(pct)) = (cfg.daily_limit_usd, daily_percent) {
        if pct >= 100.0 {
            return Err(PipelineError::BudgetExceeded { limit_kind: "daily" });
        }
        maybe_alert(alerter, sink, agent_name, pct, cfg, BudgetLimitKind::Daily, limit, daily_spent).await;
    }
    if let (Some(limit), Some(pct)) = (cfg.monthly_limit_usd, monthly_percent) {
        if pct >= 100.0 {
            return Err(PipelineError::BudgetExceeded { limit_kind: "monthly" });
        }
        maybe_alert(alerter, sink, agent_name, pct, cfg, BudgetLimitKind::Monthly, limit, monthly_spent).await;
    }

    Ok(BudgetCheck { daily_percent, monthly_percent })
}

async fn maybe_alert(
    alerter: &Alerter,
    sink: &dyn WebhookSink,
    agent_name: &str,
    percent: f64,
    cfg: &BudgetConfig,
    kind: BudgetLimitKind,
    limit_usd: f64,
    spent_usd: f64,
) {
    let Some(alert_at) = cfg.alert_at_percent else { return };
    alerter.maybe_alert(sink, agent_name, percent, alert_at, kind, limit_usd, spent_usd).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_trace::NullSink;

    #[tokio::test]
    async fn no_config_always_passes() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let alerter = Alerter::new();
        let sink = NullSink;
        let check = check_budget(&store, &alerter, &sink, "agent-a", None).await.unwrap();
        assert!(check.daily_percent.is_none());
    }

    #[tokio::test]
    async fn exceeding_daily_limit_is_rejected() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let record = conduit_storage::UsageRecord {
            timestamp: Utc::now(),
            agent_name: "agent-a".into(),
            model: "gpt-4o".into(),
            provider: "openai".into(),
            input_tokens: 1000,
            output_tokens: 1000,
            cost_usd: 50.0,
            duration_ms: 100,
            status_code: 200,
        };
        store.insert_usage(&record).await.unwrap();
        let cfg = BudgetConfig { daily_limit_usd: Some(10.0), monthly_limit_usd: None, alert_at_percent: None, alert_webhook: None };
        let alerter = Alerter::new();
        let sink = NullSink;
        let err = check_budget(&store, &alerter, &sink, "agent-a", Some(&cfg)).await.unwrap_err();
        assert!(matches!(err, PipelineError::BudgetExceeded { limit_kind: "daily" }));
    }
}
