// SPDX-License-Identifier: Apache-2.0
//! The "minimal abstraction" the spec calls for instead of a full ORM
//! (`spec.md` §6.3, §9): a placeholder-rebinding helper, a `now()`
//! expression, and per-dialect DDL strings.

/// Which SQL engine a [`crate::Store`] is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Infer the dialect from a `database` config value: a `postgres://…`
    /// or `postgresql://…` URL is Postgres, anything else (a plain path) is
    /// SQLite.
    pub fn infer(database: &str) -> Self {
        if database.starts_with("postgres://") || database.starts_with("postgresql://") {
            Dialect::Postgres
        } else {
            Dialect::Sqlite
        }
    }

    /// The SQL expression for "now" in this dialect.
    pub fn now_expr(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "datetime('now')",
            Dialect::Postgres => "NOW()",
        }
    }

    /// The blob column type name in this dialect's DDL.
    pub fn blob_type(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "BLOB",
            Dialect::Postgres => "BYTEA",
        }
    }

    /// Rewrite a canonical `?`-placeholder template into this dialect's
    /// native placeholder style. SQLite keeps `?`; Postgres numbers them
    /// `$1`, `$2`, … in order of appearance.
    pub fn rebind(&self, template: &str) -> String {
        match self {
            Dialect::Sqlite => template.to_string(),
            Dialect::Postgres => {
                let mut out = String::with_capacity(template.len() + 8);
                let mut n = 0u32;
                for ch in template.chars() {
                    if ch == '?' {
                        n += 1;
                        out.push('$');
                        out.push_str(&n.to_string());
                    } else {
                        out.push(ch);
                    }
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_postgres_from_url() {
        assert_eq!(Dialect::infer("postgres://localhost/db"), Dialect::Postgres);
        assert_eq!(Dialect::infer("postgresql://localhost/db"), Dialect::Postgres);
    }

    #[test]
    fn infers_sqlite_from_plain_path() {
        assert_eq!(Dialect::infer("/var/lib/conduit/data.db"), Dialect::Sqlite);
        assert_eq!(Dialect::infer("data.db"), Dialect::Sqlite);
    }

    #[test]
    fn rebind_numbers_postgres_placeholders_in_order() {
        let d = Dialect::Postgres;
        assert_eq!(
            d.rebind("SELECT * FROM t WHERE a = ? AND b = ?"),
            "SELECT * FROM t WHERE a = $1 AND b = $2"
        );
    }

    #[test]
    fn rebind_is_identity_for_sqlite() {
        let d = Dialect::Sqlite;
        let q = "SELECT * FROM t WHERE a = ?";
        assert_eq!(d.rebind(q), q);
    }
}
