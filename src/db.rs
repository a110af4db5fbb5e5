use std::time::Duration;

use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const CURRENT_SCHEMA_VERSION: i64 = 1;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: [Migration; 1] = [Migration {
    version: 1,
    name: "baseline_kv_store_v1",
    sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    revision INTEGER NOT NULL,
    writer TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_kv_store_revision ON kv_store(revision);
"#,
}];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, now_utc_rfc3339()],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

pub fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::UNIX_EPOCH.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvChange {
    pub key: String,
    pub revision: i64,
    pub writer: String,
}

pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

/// Writes `value` under `key` with the next global revision and returns it.
pub fn put_value(conn: &Connection, key: &str, value: &str, writer: &str) -> Result<i64> {
    conn.query_row(
        r#"
INSERT INTO kv_store (key, value, revision, writer, updated_at)
VALUES (?1, ?2, (SELECT COALESCE(MAX(revision), 0) + 1 FROM kv_store), ?3, ?4)
ON CONFLICT(key) DO UPDATE SET
    value = excluded.value,
    revision = excluded.revision,
    writer = excluded.writer,
    updated_at = excluded.updated_at
RETURNING revision
"#,
        params![key, value, writer, now_utc_rfc3339()],
        |row| row.get(0),
    )
}

pub fn max_revision(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(revision), 0) FROM kv_store",
        [],
        |row| row.get(0),
    )
}

pub fn changes_since(conn: &Connection, revision: i64) -> Result<Vec<KvChange>> {
    let mut stmt = conn.prepare(
        "SELECT key, revision, writer FROM kv_store WHERE revision > ?1 ORDER BY revision ASC",
    )?;
    let rows = stmt.query_map(params![revision], |row| {
        Ok(KvChange {
            key: row.get(0)?,
            revision: row.get(1)?,
            writer: row.get(2)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests;
