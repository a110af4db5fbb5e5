use super::{
    changes_since, get_value, max_revision, open_connection, put_value, CURRENT_SCHEMA_VERSION,
};
use rusqlite::params;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_db_path() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before UNIX_EPOCH")
        .as_nanos();
    std::env::temp_dir()
        .join(format!(
            "agenda-notify-db-{}-{}.sqlite",
            nanos,
            uuid::Uuid::now_v7()
        ))
        .display()
        .to_string()
}

fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let candidate = format!("{path}{suffix}");
        let _ = std::fs::remove_file(candidate);
    }
}

fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table_name],
            |row| row.get(0),
        )
        .expect("table existence query should be readable");
    exists == 1
}

#[test]
fn configures_connection_pragmas() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn initializes_required_tables_and_schema_version() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    for table in ["schema_migrations", "meta", "kv_store"] {
        assert!(
            table_exists(&conn, table),
            "expected table '{}' to exist",
            table
        );
    }

    let schema_version: String = conn
        .query_row(
            "SELECT value FROM meta WHERE key='schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("schema version should be stored in meta table");
    assert_eq!(schema_version, CURRENT_SCHEMA_VERSION.to_string());

    cleanup_db_files(&path);
}

#[test]
fn reapplies_migrations_idempotently() {
    let path = unique_db_path();
    let conn_first = open_connection(&path).expect("first open should initialize schema");
    drop(conn_first);

    let conn_second = open_connection(&path).expect("second open should be idempotent");
    let applied_count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .expect("schema_migrations count should be queryable");
    assert_eq!(applied_count, CURRENT_SCHEMA_VERSION);

    cleanup_db_files(&path);
}

#[test]
fn put_value_assigns_increasing_revisions_across_keys() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    assert_eq!(max_revision(&conn).expect("max revision"), 0);
    let first = put_value(&conn, "a", "1", "ctx-a").expect("first put");
    let second = put_value(&conn, "b", "2", "ctx-b").expect("second put");
    let third = put_value(&conn, "a", "3", "ctx-b").expect("overwrite put");
    assert!(first < second && second < third);

    assert_eq!(get_value(&conn, "a").expect("get a"), Some("3".to_string()));
    assert_eq!(get_value(&conn, "missing").expect("get missing"), None);

    let changes = changes_since(&conn, first).expect("changes should load");
    let keys = changes
        .iter()
        .map(|change| (change.key.as_str(), change.writer.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(keys, vec![("b", "ctx-b"), ("a", "ctx-b")]);

    cleanup_db_files(&path);
}
