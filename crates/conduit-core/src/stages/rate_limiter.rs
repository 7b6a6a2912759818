// SPDX-License-Identifier: Apache-2.0
//! Sliding-window rate limiting (`spec.md` §4.2): two independent windows
//! per agent, 1-minute and 1-hour, held in memory (not persisted — a
//! restart resets counters, which the spec accepts as a tradeoff for
//! avoiding a DB round trip on every request).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use conduit_config::RateLimitConfig;

use crate::error::PipelineError;

struct Window {
    limit: u32,
    period: Duration,
    timestamps: Vec<Instant>,
}

impl Window {
    fn new(limit: u32, period: Duration) -> Self {
        Window { limit, period, timestamps: Vec::new() }
    }

    /// Evict entries outside the window, then check capacity. Returns the
    /// retry-after duration on rejection.
    fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        self.timestamps.retain(|t| now.duration_since(*t) < self.period);
        if (self.timestamps.len() as u32) >= self.limit {
            let oldest = self.timestamps[0];
            let retry_after = self.period.saturating_sub(now.duration_since(oldest));
            return Err(retry_after.max(Duration::from_secs(1)));
        }
        self.timestamps.push(now);
        Ok(())
    }
}

struct AgentCounters {
    minute: Option<Window>,
    hour: Option<Window>,
}

/// Per-agent sliding-window counters, guarded by one mutex. Contention is
/// fine: acquisition is a short vec scan, never I/O.
pub struct RateLimiter {
    agents: Mutex<HashMap<String, AgentCounters>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter { agents: Mutex::new(HashMap::new()) }
    }

    /// Check and record one request for `agent_name` against `cfg`. A
    /// `cfg` with both limits `None` always permits.
    pub fn check(&self, agent_name: &str, cfg: Option<&RateLimitConfig>) -> Result<(), PipelineError> {
        let Some(cfg) = cfg else { return Ok(()) };
        let now = Instant::now();
        let mut agents = self.agents.lock().expect("rate limiter mutex poisoned");
        let counters = agents.entry(agent_name.to_string()).or_insert_with(|| AgentCounters {
            minute: cfg.requests_per_minute.map(|n| Window::new(n, Duration::from_secs(60))),
            hour: cfg.requests_per_hour.map(|n| Window::new(n, Duration::from_secs(3600))),
        });

        if let Some(w) = counters.minute.as_mut() {
            if let Err(retry_after) = w.try_acquire(now) {
                return Err(PipelineError::RateLimited { retry_after_secs: retry_after.as_secs() });
            }
        }
        if let Some(w) = counters.hour.as_mut() {
            if let Err(retry_after) = w.try_acquire(now) {
                return Err(PipelineError::RateLimited { retry_after_secs: retry_after.as_secs() });
            }
        }
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
