// SPDX-License-Identifier: Apache-2.0
//! Background janitors (`spec.md` §5): the session sweeper evicts expired
//! `session_overrides` rows every 5 minutes, the cache sweeper evicts
//! `cache_entries` older than the configured TTL roughly once a minute.
//! Both stop cleanly when their `tokio::sync::oneshot` done-channel fires or
//! is dropped.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::store::Store;

pub struct SweeperHandle {
    stop: Option<oneshot::Sender<()>>,
}

impl SweeperHandle {
    pub fn stop(mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
    }
}

/// Spawn the session sweeper: deletes `session_overrides` rows whose
/// `expires_at` has passed, every `interval`.
pub fn spawn_session_sweeper(store: Store, interval: Duration) -> SweeperHandle {
    let (tx, mut rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match store.sweep_expired_sessions(Utc::now()).await {
                        Ok(n) if n > 0 => debug!(evicted = n, "session sweeper: evicted expired overrides"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "session sweeper: sweep failed"),
                    }
                }
                _ = &mut rx => break,
            }
        }
    });
    SweeperHandle { stop: Some(tx) }
}

/// Spawn the cache sweeper: deletes `cache_entries` rows older than `ttl`,
/// every `interval`.
pub fn spawn_cache_sweeper(store: Store, interval: Duration, ttl: Duration) -> SweeperHandle {
    let (tx, mut rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cutoff = Utc::now() - ttl;
                    match store.sweep_expired_cache(cutoff).await {
                        Ok(n) if n > 0 => debug!(evicted = n, "cache sweeper: evicted stale entries"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "cache sweeper: sweep failed"),
                    }
                }
                _ = &mut rx => break,
            }
        }
    });
    SweeperHandle { stop: Some(tx) }
}
