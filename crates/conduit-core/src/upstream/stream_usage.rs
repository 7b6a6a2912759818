// SPDX-License-Identifier: Apache-2.0
//! Usage accounting for streamed responses (`spec.md` §4.11.5, §4.13):
//! every byte the upstream sends is forwarded to the client untouched, but
//! the same line-buffered SSE scan the client itself would do is run on
//! the side so one `requests` row is still inserted, exactly as it would
//! be for a buffered response.

use std::time::Instant;

use conduit_pricing::PricingTable;
use conduit_providers::openai_compat::{drain_complete_lines, extract_usage_from_sse_line, is_done_line};
use conduit_providers::{ByteStream, Usage};
use conduit_storage::Store;
use futures::StreamExt;
use tracing::warn;

use crate::upstream::UpstreamCall;
use crate::usage;

struct StreamState {
    inner: ByteStream,
    buf: String,
    usage: Usage,
    recorded: bool,
    store: Store,
    pricing: PricingTable,
    agent_name: String,
    model: String,
    provider: String,
    started_at: Instant,
}

/// Wrap `inner` so the raw bytes still pass straight through to the HTTP
/// response, while `usage::record` fires exactly once, on the `[DONE]`
/// sentinel or on EOF if the upstream never sends one.
pub fn record_as_it_flows(
    inner: ByteStream,
    store: Store,
    pricing: PricingTable,
    agent_name: String,
    model: String,
    provider: String,
    started_at: Instant,
) -> ByteStream {
    let state = StreamState {
        inner,
        buf: String::new(),
        usage: Usage::default(),
        recorded: false,
        store,
        pricing,
        agent_name,
        model,
        provider,
        started_at,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        if state.recorded {
            return None;
        }

        match state.inner.next().await {
            Some(Ok(chunk)) => {
                if let Ok(text) = std::str::from_utf8(&chunk) {
                    state.buf.push_str(text);
                }
                let mut saw_done = false;
                for line in drain_complete_lines(&mut state.buf) {
                    if let Some(u) = extract_usage_from_sse_line(&line) {
                        state.usage = u;
                    }
                    if is_done_line(&line) {
                        saw_done = true;
                    }
                }
                if saw_done {
                    finalize(&state).await;
                    state.recorded = true;
                }
                Some((Ok(chunk), state))
            }
            Some(Err(e)) => {
                finalize(&state).await;
                state.recorded = true;
                Some((Err(e), state))
            }
            None => {
                finalize(&state).await;
                None
            }
        }
    }))
}

async fn finalize(state: &StreamState) {
    let call = UpstreamCall { model: state.model.clone(), provider: state.provider.clone(), usage: state.usage };
    let elapsed = state.started_at.elapsed().as_millis() as i64;
    if let Err(e) = usage::record(&state.store, &state.pricing, &state.agent_name, &[call], elapsed, 200).await {
        warn!(agent = %state.agent_name, error = %e, "failed to record usage for a streamed request");
    }
}
