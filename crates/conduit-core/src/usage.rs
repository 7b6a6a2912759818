// SPDX-License-Identifier: Apache-2.0
//! Usage recording (`spec.md` §4.13): price every upstream call made while
//! servicing the request, insert one `requests` row, and attach the
//! response headers agents use to track spend (`X-Cost-USD`,
//! `X-Input-Tokens`, `X-Output-Tokens`, `X-Budget-*-Percent`,
//! `X-Trace-ID`).
//!
//! A stored usage record is never mutated (`spec.md` §3 invariants): even
//! a multi-round tool loop produces exactly one row, summing tokens and
//! cost over every round.

use chrono::Utc;
use conduit_pricing::PricingTable;
use conduit_storage::{Store, UsageRecord};

use crate::error::PipelineError;
use crate::upstream::UpstreamCall;

pub struct UsageSummary {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost_usd: f64,
}

/// Price and sum every call in `calls`, insert one `requests` row for
/// `agent_name`, and return the totals for the response headers. An
/// unpriced model contributes zero cost but its tokens still count
/// (`spec.md` §3: "unknown model = zero cost").
pub async fn record(
    store: &Store,
    pricing: &PricingTable,
    agent_name: &str,
    calls: &[UpstreamCall],
    duration_ms: i64,
    status_code: i32,
) -> Result<UsageSummary, PipelineError> {
    let mut total_input_tokens = 0u64;
    let mut total_output_tokens = 0u64;
    let mut total_cost_usd = 0.0;
    let mut last_model = String::new();
    let mut last_provider = String::new();

    for call in calls {
        total_input_tokens += call.usage.prompt_tokens;
        total_output_tokens += call.usage.completion_tokens;
        total_cost_usd += pricing.cost(&call.model, call.usage.prompt_tokens, call.usage.completion_tokens);
        last_model = call.model.clone();
        last_provider = call.provider.clone();
    }

    let record = UsageRecord {
        timestamp: Utc::now(),
        agent_name: agent_name.to_string(),
        model: last_model,
        provider: last_provider,
        input_tokens: total_input_tokens as i64,
        output_tokens: total_output_tokens as i64,
        cost_usd: total_cost_usd,
        duration_ms,
        status_code,
    };
    store.insert_usage(&record).await?;

    Ok(UsageSummary { total_input_tokens, total_output_tokens, total_cost_usd })
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_providers::Usage;

    #[tokio::test]
    async fn sums_tokens_and_cost_across_calls() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let pricing = PricingTable::with_defaults();
        let calls = vec![
            UpstreamCall { model: "gpt-4o".into(), provider: "openai".into(), usage: Usage { prompt_tokens: 100, completion_tokens: 50 } },
            UpstreamCall { model: "gpt-4o".into(), provider: "openai".into(), usage: Usage { prompt_tokens: 20, completion_tokens: 10 } },
        ];
        let summary = record(&store, &pricing, "agent-a", &calls, 120, 200).await.unwrap();
        assert_eq!(summary.total_input_tokens, 120);
        assert_eq!(summary.total_output_tokens, 60);
        assert!(summary.total_cost_usd > 0.0);
        let spend = store.spend_since("agent-a", Utc::now() - chrono::Duration::hours(1)).await.unwrap();
        assert!((spend - summary.total_cost_usd).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unpriced_model_costs_zero_but_still_records_tokens() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let pricing = PricingTable::with_defaults();
        let calls = vec![UpstreamCall { model: "totally-unknown-model".into(), provider: "unknown".into(), usage: Usage { prompt_tokens: 5, completion_tokens: 5 } }];
        let summary = record(&store, &pricing, "agent-a", &calls, 10, 200).await.unwrap();
        assert_eq!(summary.total_cost_usd, 0.0);
        assert_eq!(summary.total_input_tokens, 5);
    }
}
