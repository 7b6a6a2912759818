// SPDX-License-Identifier: Apache-2.0
//! DDL for the five tables in `spec.md` §6.3, one `CREATE TABLE` variant per
//! [`Dialect`]. JSON payload columns (`details`, `payload`) are stored as
//! `TEXT` rather than a dialect-specific JSON type so the same
//! `serde_json::to_string`/`from_str` round-trip works on both backends.

use crate::dialect::Dialect;

pub fn create_statements(dialect: Dialect) -> Vec<String> {
    let blob = dialect.blob_type();
    let (pk_requests, pk_audit, pk_webhooks) = match dialect {
        Dialect::Sqlite => (
            "id INTEGER PRIMARY KEY AUTOINCREMENT",
            "id INTEGER PRIMARY KEY AUTOINCREMENT",
            "id INTEGER PRIMARY KEY AUTOINCREMENT",
        ),
        Dialect::Postgres => (
            "id BIGSERIAL PRIMARY KEY",
            "id BIGSERIAL PRIMARY KEY",
            "id BIGSERIAL PRIMARY KEY",
        ),
    };

    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS requests (
                {pk_requests},
                timestamp TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                model TEXT NOT NULL,
                provider TEXT NOT NULL,
                input_tokens BIGINT NOT NULL,
                output_tokens BIGINT NOT NULL,
                cost_usd DOUBLE PRECISION NOT NULL,
                duration_ms BIGINT NOT NULL,
                status_code INTEGER NOT NULL
            )"
        ),
        "CREATE INDEX IF NOT EXISTS idx_requests_agent_ts ON requests (agent_name, timestamp)"
            .to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                sha256_hash TEXT NOT NULL,
                model TEXT NOT NULL,
                response_body {blob} NOT NULL,
                embedding {blob},
                created_at TEXT NOT NULL,
                PRIMARY KEY (sha256_hash, model)
            )"
        ),
        "CREATE INDEX IF NOT EXISTS idx_cache_model_created ON cache_entries (model, created_at)"
            .to_string(),
        "CREATE TABLE IF NOT EXISTS session_overrides (
                session_id TEXT PRIMARY KEY,
                agent_name TEXT NOT NULL,
                model TEXT,
                temperature DOUBLE PRECISION,
                max_tokens BIGINT,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )"
        .to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS audit_events (
                {pk_audit},
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                details TEXT NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS webhook_executions (
                {pk_webhooks},
                name TEXT NOT NULL,
                agent_name TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            )"
        ),
    ]
}
