// SPDX-License-Identifier: Apache-2.0
//! The store façade: one connection pool, dispatched over [`Dialect`].
//!
//! Timestamps are stored as RFC 3339 text on both backends so the same
//! decode path (`String` -> `DateTime<Utc>`) works regardless of dialect;
//! JSON payload columns are stored as `TEXT` for the same reason.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, sqlite::SqlitePoolOptions, PgPool, Row, SqlitePool};

use crate::dialect::Dialect;
use crate::error::{StoreError, StoreResult};
use crate::models::{
    AuditEvent, AuditEventType, CacheEntry, NewAuditEvent, SessionOverride, UsageRecord,
    WebhookExecution,
};
use crate::schema::create_statements;

#[derive(Clone)]
pub enum Store {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl Store {
    /// Open a pool for `database` (a plain path for SQLite, a `postgres://`
    /// URL for PostgreSQL) and run the idempotent `CREATE TABLE IF NOT
    /// EXISTS` statements.
    pub async fn connect(database: &str) -> StoreResult<Self> {
        let dialect = Dialect::infer(database);
        let store = match dialect {
            Dialect::Sqlite => {
                let url = if database.starts_with("sqlite:") {
                    database.to_string()
                } else {
                    format!("sqlite://{database}?mode=rwc")
                };
                let pool = SqlitePoolOptions::new()
                    .max_connections(8)
                    .connect(&url)
                    .await?;
                Store::Sqlite(pool)
            }
            Dialect::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(16)
                    .connect(database)
                    .await?;
                Store::Postgres(pool)
            }
        };
        store.migrate().await?;
        Ok(store)
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Store::Sqlite(_) => Dialect::Sqlite,
            Store::Postgres(_) => Dialect::Postgres,
        }
    }

    async fn migrate(&self) -> StoreResult<()> {
        for stmt in create_statements(self.dialect()) {
            match self {
                Store::Sqlite(pool) => {
                    sqlx::query(&stmt).execute(pool).await?;
                }
                Store::Postgres(pool) => {
                    sqlx::query(&stmt).execute(pool).await?;
                }
            }
        }
        Ok(())
    }

    // -- requests / usage -------------------------------------------------

    pub async fn insert_usage(&self, rec: &UsageRecord) -> StoreResult<()> {
        let template = "INSERT INTO requests
            (timestamp, agent_name, model, provider, input_tokens, output_tokens, cost_usd, duration_ms, status_code)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";
        match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(rec.timestamp.to_rfc3339())
                    .bind(&rec.agent_name)
                    .bind(&rec.model)
                    .bind(&rec.provider)
                    .bind(rec.input_tokens)
                    .bind(rec.output_tokens)
                    .bind(rec.cost_usd)
                    .bind(rec.duration_ms)
                    .bind(rec.status_code)
                    .execute(pool)
                    .await?;
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(rec.timestamp.to_rfc3339())
                    .bind(&rec.agent_name)
                    .bind(&rec.model)
                    .bind(&rec.provider)
                    .bind(rec.input_tokens)
                    .bind(rec.output_tokens)
                    .bind(rec.cost_usd)
                    .bind(rec.duration_ms)
                    .bind(rec.status_code)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Sum of `cost_usd` for `agent_name` at or after `since` — used by the
    /// budget guard for both the daily and monthly windows (§4.3).
    pub async fn spend_since(&self, agent_name: &str, since: DateTime<Utc>) -> StoreResult<f64> {
        let template =
            "SELECT COALESCE(SUM(cost_usd), 0.0) AS total FROM requests WHERE agent_name = ? AND timestamp >= ?";
        let row = match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(agent_name)
                    .bind(since.to_rfc3339())
                    .fetch_one(pool)
                    .await?
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(agent_name)
                    .bind(since.to_rfc3339())
                    .fetch_one(pool)
                    .await?
            }
        };
        Ok(row.try_get::<f64, _>("total").unwrap_or(0.0))
    }

    // -- cache --------------------------------------------------------------

    pub async fn cache_lookup(&self, hash: &str, model: &str) -> StoreResult<Option<CacheEntry>> {
        let template =
            "SELECT sha256_hash, model, response_body, embedding, created_at FROM cache_entries WHERE sha256_hash = ? AND model = ?";
        let row = match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(hash)
                    .bind(model)
                    .fetch_optional(pool)
                    .await?
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(hash)
                    .bind(model)
                    .fetch_optional(pool)
                    .await?
            }
        };
        Ok(row.map(|r| CacheEntry {
            sha256_hash: r.get("sha256_hash"),
            model: r.get("model"),
            response_body: r.get("response_body"),
            embedding: r.try_get("embedding").ok(),
            created_at: parse_dt(&r.get::<String, _>("created_at")),
        }))
    }

    /// Lazily evict one entry on an expired lookup (§4.7 step 1), ahead of
    /// the next periodic sweep.
    pub async fn cache_delete(&self, hash: &str, model: &str) -> StoreResult<()> {
        let template = "DELETE FROM cache_entries WHERE sha256_hash = ? AND model = ?";
        match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(template)).bind(hash).bind(model).execute(pool).await?;
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(template)).bind(hash).bind(model).execute(pool).await?;
            }
        }
        Ok(())
    }

    /// All entries for `model` newer than `cutoff`, for the semantic cache's
    /// cosine-similarity fallback scan (§4.6).
    pub async fn cache_candidates(
        &self,
        model: &str,
        cutoff: DateTime<Utc>,
    ) -> StoreResult<Vec<CacheEntry>> {
        let template = "SELECT sha256_hash, model, response_body, embedding, created_at FROM cache_entries
            WHERE model = ? AND created_at >= ? AND embedding IS NOT NULL";
        let rows = match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(model)
                    .bind(cutoff.to_rfc3339())
                    .fetch_all(pool)
                    .await?
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(model)
                    .bind(cutoff.to_rfc3339())
                    .fetch_all(pool)
                    .await?
            }
        };
        Ok(rows
            .into_iter()
            .map(|r| CacheEntry {
                sha256_hash: r.get("sha256_hash"),
                model: r.get("model"),
                response_body: r.get("response_body"),
                embedding: r.try_get("embedding").ok(),
                created_at: parse_dt(&r.get::<String, _>("created_at")),
            })
            .collect())
    }

    pub async fn cache_upsert(&self, entry: &CacheEntry) -> StoreResult<()> {
        // Portable upsert: delete then insert, inside the same connection
        // pool call — cache entries are content-addressed so a lost race
        // just means a duplicate write of identical bytes, not corruption.
        let del = "DELETE FROM cache_entries WHERE sha256_hash = ? AND model = ?";
        let ins = "INSERT INTO cache_entries (sha256_hash, model, response_body, embedding, created_at) VALUES (?, ?, ?, ?, ?)";
        match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(del))
                    .bind(&entry.sha256_hash)
                    .bind(&entry.model)
                    .execute(pool)
                    .await?;
                sqlx::query(&self.dialect().rebind(ins))
                    .bind(&entry.sha256_hash)
                    .bind(&entry.model)
                    .bind(&entry.response_body)
                    .bind(&entry.embedding)
                    .bind(entry.created_at.to_rfc3339())
                    .execute(pool)
                    .await?;
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(del))
                    .bind(&entry.sha256_hash)
                    .bind(&entry.model)
                    .execute(pool)
                    .await?;
                sqlx::query(&self.dialect().rebind(ins))
                    .bind(&entry.sha256_hash)
                    .bind(&entry.model)
                    .bind(&entry.response_body)
                    .bind(&entry.embedding)
                    .bind(entry.created_at.to_rfc3339())
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn sweep_expired_cache(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let template = "DELETE FROM cache_entries WHERE created_at < ?";
        let affected = match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(cutoff.to_rfc3339())
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(cutoff.to_rfc3339())
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
        };
        Ok(affected)
    }

    // -- session overrides ----------------------------------------------

    pub async fn session_get(&self, session_id: &str) -> StoreResult<Option<SessionOverride>> {
        let template = "SELECT session_id, agent_name, model, temperature, max_tokens, created_at, expires_at
            FROM session_overrides WHERE session_id = ?";
        let row = match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(session_id)
                    .fetch_optional(pool)
                    .await?
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(session_id)
                    .fetch_optional(pool)
                    .await?
            }
        };
        Ok(row.map(|r| SessionOverride {
            session_id: r.get("session_id"),
            agent_name: r.get("agent_name"),
            model: r.try_get("model").ok(),
            temperature: r.try_get("temperature").ok(),
            max_tokens: r.try_get("max_tokens").ok(),
            created_at: parse_dt(&r.get::<String, _>("created_at")),
            expires_at: parse_dt(&r.get::<String, _>("expires_at")),
        }))
    }

    pub async fn session_put(&self, ov: &SessionOverride) -> StoreResult<()> {
        let del = "DELETE FROM session_overrides WHERE session_id = ?";
        let ins = "INSERT INTO session_overrides
            (session_id, agent_name, model, temperature, max_tokens, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)";
        match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(del))
                    .bind(&ov.session_id)
                    .execute(pool)
                    .await?;
                sqlx::query(&self.dialect().rebind(ins))
                    .bind(&ov.session_id)
                    .bind(&ov.agent_name)
                    .bind(&ov.model)
                    .bind(ov.temperature)
                    .bind(ov.max_tokens)
                    .bind(ov.created_at.to_rfc3339())
                    .bind(ov.expires_at.to_rfc3339())
                    .execute(pool)
                    .await?;
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(del))
                    .bind(&ov.session_id)
                    .execute(pool)
                    .await?;
                sqlx::query(&self.dialect().rebind(ins))
                    .bind(&ov.session_id)
                    .bind(&ov.agent_name)
                    .bind(&ov.model)
                    .bind(ov.temperature)
                    .bind(ov.max_tokens)
                    .bind(ov.created_at.to_rfc3339())
                    .bind(ov.expires_at.to_rfc3339())
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn session_delete(&self, session_id: &str) -> StoreResult<()> {
        let template = "DELETE FROM session_overrides WHERE session_id = ?";
        match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(session_id)
                    .execute(pool)
                    .await?;
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(session_id)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn sweep_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let template = "DELETE FROM session_overrides WHERE expires_at < ?";
        let affected = match self {
            Store::Sqlite(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(now.to_rfc3339())
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
            Store::Postgres(pool) => {
                sqlx::query(&self.dialect().rebind(template))
                    .bind(now.to_rfc3339())
                    .execute(pool)
                    .await?
                    .rows_affected()
            }
        };
        Ok(affected)
    }

    // -- audit ------------------------------------------------------------

    pub async fn insert_audit(&self, ev: NewAuditEvent) -> StoreResult<AuditEvent> {
        let now = Utc::now();
        let details = serde_json::to_string(&ev.details)
            .map_err(|e| StoreError::Migration(format!("audit details not serializable: {e}")))?;
        let template = "INSERT INTO audit_events (timestamp, event_type, agent_name, details) VALUES (?, ?, ?, ?)";
        let id = match self {
            Store::Sqlite(pool) => {
                let res = sqlx::query(&self.dialect().rebind(template))
                    .bind(now.to_rfc3339())
                    .bind(ev.event_type.as_str())
                    .bind(&ev.agent_name)
                    .bind(&details)
                    .execute(pool)
                    .await?;
                res.last_insert_rowid()
            }
            Store::Postgres(pool) => {
                let row = sqlx::query("INSERT INTO audit_events (timestamp, event_type, agent_name, details) VALUES ($1, $2, $3, $4) RETURNING id")
                    .bind(now.to_rfc3339())
                    .bind(ev.event_type.as_str())
                    .bind(&ev.agent_name)
                    .bind(&details)
                    .fetch_one(pool)
                    .await?;
                row.get::<i64, _>("id")
            }
        };
        Ok(AuditEvent {
            id,
            timestamp: now,
            event_type: ev.event_type,
            agent_name: ev.agent_name,
            details: ev.details,
        })
    }

    // -- webhook executions -------------------------------------------------

    pub async fn insert_webhook_execution(
        &self,
        name: &str,
        agent_name: &str,
        payload: serde_json::Value,
    ) -> StoreResult<WebhookExecution> {
        let now = Utc::now();
        let payload_text = serde_json::to_string(&payload)
            .map_err(|e| StoreError::Migration(format!("webhook payload not serializable: {e}")))?;
        let id = match self {
            Store::Sqlite(pool) => {
                let res = sqlx::query(
                    "INSERT INTO webhook_executions (name, agent_name, payload, created_at) VALUES (?, ?, ?, ?)",
                )
                .bind(name)
                .bind(agent_name)
                .bind(&payload_text)
                .bind(now.to_rfc3339())
                .execute(pool)
                .await?;
                res.last_insert_rowid()
            }
            Store::Postgres(pool) => {
                let row = sqlx::query(
                    "INSERT INTO webhook_executions (name, agent_name, payload, created_at) VALUES ($1, $2, $3, $4) RETURNING id",
                )
                .bind(name)
                .bind(agent_name)
                .bind(&payload_text)
                .bind(now.to_rfc3339())
                .fetch_one(pool)
                .await?;
                row.get::<i64, _>("id")
            }
        };
        Ok(WebhookExecution {
            id,
            name: name.to_string(),
            agent_name: agent_name.to_string(),
            payload,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuditEventType;

    async fn memory_store() -> Store {
        Store::connect("sqlite::memory:").await.expect("connect")
    }

    #[tokio::test]
    async fn usage_insert_and_spend_since() {
        let store = memory_store().await;
        let rec = UsageRecord {
            timestamp: Utc::now(),
            agent_name: "agent-a".into(),
            model: "gpt-4o".into(),
            provider: "openai".into(),
            input_tokens: 100,
            output_tokens: 50,
            cost_usd: 0.01,
            duration_ms: 120,
            status_code: 200,
        };
        store.insert_usage(&rec).await.unwrap();
        let since = Utc::now() - chrono::Duration::hours(1);
        let total = store.spend_since("agent-a", since).await.unwrap();
        assert!((total - 0.01).abs() < 1e-9);
        let total_other = store.spend_since("agent-b", since).await.unwrap();
        assert_eq!(total_other, 0.0);
    }

    #[tokio::test]
    async fn cache_roundtrip() {
        let store = memory_store().await;
        let entry = CacheEntry {
            sha256_hash: "abc123".into(),
            model: "gpt-4o".into(),
            response_body: b"{\"ok\":true}".to_vec(),
            embedding: None,
            created_at: Utc::now(),
        };
        store.cache_upsert(&entry).await.unwrap();
        let found = store.cache_lookup("abc123", "gpt-4o").await.unwrap();
        assert_eq!(found.unwrap().response_body, entry.response_body);
        assert!(store.cache_lookup("abc123", "other-model").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_override_roundtrip_and_sweep() {
        let store = memory_store().await;
        let ov = SessionOverride {
            session_id: "sess-1".into(),
            agent_name: "agent-a".into(),
            model: Some("gpt-4o-mini".into()),
            temperature: Some(0.2),
            max_tokens: None,
            created_at: Utc::now(),
            expires_at: Utc::now() - chrono::Duration::minutes(1),
        };
        store.session_put(&ov).await.unwrap();
        assert!(store.session_get("sess-1").await.unwrap().is_some());
        let swept = store.sweep_expired_sessions(Utc::now()).await.unwrap();
        assert_eq!(swept, 1);
        assert!(store.session_get("sess-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn audit_event_round_trip() {
        let store = memory_store().await;
        let ev = store
            .insert_audit(NewAuditEvent {
                event_type: AuditEventType::FirewallBlock,
                agent_name: "agent-a".into(),
                details: serde_json::json!({"rule": "prompt-injection"}),
            })
            .await
            .unwrap();
        assert!(ev.id > 0);
        assert_eq!(ev.event_type.as_str(), "firewall_block");
    }
}
