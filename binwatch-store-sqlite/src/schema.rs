//! Table definitions and the one-off audit table probe.

use binwatch_core::model::AuditSchema;
use rusqlite::Connection;

/// Tables every deployment has.
pub const CORE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS janitors (
    janitor_id INTEGER PRIMARY KEY,
    first_name TEXT,
    last_name  TEXT,
    email      TEXT,
    phone      TEXT
);
CREATE TABLE IF NOT EXISTS bins (
    bin_id      INTEGER PRIMARY KEY,
    bin_code    TEXT,
    location    TEXT,
    bin_type    TEXT,
    status      TEXT NOT NULL DEFAULT 'empty',
    capacity    INTEGER,
    assigned_to INTEGER,
    created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at  TEXT
);
CREATE INDEX IF NOT EXISTS idx_bins_assigned_to ON bins (assigned_to);
CREATE TABLE IF NOT EXISTS notifications (
    notification_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    admin_id          INTEGER,
    janitor_id        INTEGER,
    bin_id            INTEGER,
    notification_type TEXT NOT NULL,
    title             TEXT NOT NULL,
    message           TEXT NOT NULL,
    created_at        TEXT NOT NULL
);
";

/// Audit table keyed by janitor, with a free-text action type.
pub const BIN_HISTORY_TABLE: &str = "
CREATE TABLE IF NOT EXISTS bin_history (
    history_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    bin_id      INTEGER NOT NULL,
    janitor_id  INTEGER NOT NULL,
    status      TEXT NOT NULL,
    action_type TEXT,
    created_at  TEXT NOT NULL
);
";

/// Older audit table with a mandatory action column.
pub const BIN_LOGS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS bin_logs (
    log_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    bin_id       INTEGER NOT NULL,
    performed_by INTEGER NOT NULL,
    action       TEXT NOT NULL,
    status       TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
";

/// Create the core tables plus the audit table `schema` names.
pub(crate) fn bootstrap(conn: &Connection, schema: AuditSchema) -> rusqlite::Result<()> {
    conn.execute_batch(CORE_TABLES)?;
    match schema {
        AuditSchema::None => Ok(()),
        AuditSchema::BinHistory => conn.execute_batch(BIN_HISTORY_TABLE),
        AuditSchema::BinLogs => conn.execute_batch(BIN_LOGS_TABLE),
    }
}

/// Find which audit table exists; `bin_history` wins when both do.
pub(crate) fn detect(conn: &Connection) -> rusqlite::Result<AuditSchema> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name IN ('bin_history', 'bin_logs')",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let has = |table: &str| names.iter().any(|name| name == table);
    Ok(if has("bin_history") {
        AuditSchema::BinHistory
    } else if has("bin_logs") {
        AuditSchema::BinLogs
    } else {
        AuditSchema::None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_only_the_requested_audit_table() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        bootstrap(&conn, AuditSchema::BinLogs).expect("bootstrap");
        assert_eq!(detect(&conn).expect("probe"), AuditSchema::BinLogs);

        // Idempotent.
        bootstrap(&conn, AuditSchema::BinLogs).expect("second bootstrap");
    }

    #[test]
    fn detect_prefers_history_over_logs() {
        let conn = Connection::open_in_memory().expect("in-memory db");
        bootstrap(&conn, AuditSchema::None).expect("bootstrap");
        assert_eq!(detect(&conn).expect("probe"), AuditSchema::None);

        conn.execute_batch(BIN_LOGS_TABLE).expect("logs table");
        conn.execute_batch(BIN_HISTORY_TABLE).expect("history table");
        assert_eq!(detect(&conn).expect("probe"), AuditSchema::BinHistory);
    }
}
