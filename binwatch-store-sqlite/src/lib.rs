//! SQLite implementation of the binwatch datastore port.
//!
//! Every statement runs on the single background thread owned by
//! `tokio-rusqlite`, so calls from concurrent requests are serialized.

/// Table definitions and the audit table probe.
pub mod schema;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::Connection;
use tracing::debug;

use binwatch_core::{
    model::{
        AuditEntry, AuditSchema, Bin, BinId, BinStatus, COMPLETED_ACTIONS, Janitor, JanitorId,
        NewNotification, Notification, NotificationCategory,
    },
    ports::{BinStore, PortError},
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const BIN_COLUMNS: &str =
    "bin_id, bin_code, location, bin_type, status, capacity, assigned_to, created_at, updated_at";

/// Bin row as stored, before the status text is checked.
struct BinRow {
    id: i64,
    code: Option<String>,
    location: Option<String>,
    bin_type: Option<String>,
    status: String,
    capacity: Option<i64>,
    assigned_to: Option<i64>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl BinRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            code: row.get(1)?,
            location: row.get(2)?,
            bin_type: row.get(3)?,
            status: row.get(4)?,
            capacity: row.get(5)?,
            assigned_to: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_bin(self) -> Result<Bin, PortError> {
        let status = self
            .status
            .parse::<BinStatus>()
            .map_err(|err| PortError::Corrupt(format!("bin {}: {err}", self.id)))?;
        Ok(Bin {
            id: BinId(self.id),
            code: self.code,
            location: self.location,
            bin_type: self.bin_type,
            status,
            capacity: self
                .capacity
                .and_then(|raw| u8::try_from(raw.clamp(0, i64::from(u8::MAX))).ok()),
            assigned_to: self.assigned_to.map(JanitorId),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Notification row as stored.
struct NotificationRow {
    id: i64,
    admin_id: Option<i64>,
    janitor_id: Option<i64>,
    bin_id: Option<i64>,
    category: String,
    title: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            body: NewNotification {
                admin_id: row.admin_id,
                janitor_id: JanitorId(row.janitor_id.unwrap_or_default()),
                bin_id: BinId(row.bin_id.unwrap_or_default()),
                category: NotificationCategory::from_tag(&row.category),
                title: row.title,
                message: row.message,
                created_at: row.created_at,
            },
        }
    }
}

/// Convert a tokio-rusqlite error into a port error.
fn map_tr_err(err: tokio_rusqlite::Error<rusqlite::Error>) -> PortError {
    PortError::Statement(err.to_string())
}

/// `BinStore` over a SQLite database file.
pub struct SqliteBinStore {
    conn: Connection,
}

impl SqliteBinStore {
    /// Open (or create) the database at `path` in WAL mode.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the file cannot be opened.
    pub async fn open(path: &str) -> Result<Self, PortError> {
        let conn = Connection::open(path)
            .await
            .map_err(|err| PortError::Statement(err.to_string()))?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        debug!(path, "sqlite store opened");
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when SQLite cannot allocate the database.
    pub async fn open_in_memory() -> Result<Self, PortError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| PortError::Statement(err.to_string()))?;
        Ok(Self { conn })
    }

    /// Underlying connection handle.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create the core tables and the audit table `audit` names, if missing.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when a `CREATE` statement fails.
    pub async fn bootstrap(&self, audit: AuditSchema) -> Result<(), PortError> {
        self.conn
            .call(move |conn| schema::bootstrap(conn, audit))
            .await
            .map_err(map_tr_err)?;
        debug!(?audit, "sqlite schema bootstrapped");
        Ok(())
    }

    /// Find out once which audit table this database has.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the catalog cannot be read.
    pub async fn detect_audit_schema(&self) -> Result<AuditSchema, PortError> {
        self.conn
            .call(|conn| schema::detect(conn))
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl BinStore for SqliteBinStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn update_bin_status(
        &self,
        bin_id: BinId,
        status: BinStatus,
        capacity: Option<u8>,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, PortError> {
        let affected = self
            .conn
            .call(move |conn| match capacity {
                Some(capacity) => conn.execute(
                    "UPDATE bins SET status = ?1, capacity = ?2, updated_at = ?3 WHERE bin_id = ?4",
                    params![status.as_str(), capacity, updated_at, bin_id.0],
                ),
                None => conn.execute(
                    "UPDATE bins SET status = ?1, updated_at = ?2 WHERE bin_id = ?3",
                    params![status.as_str(), updated_at, bin_id.0],
                ),
            })
            .await
            .map_err(map_tr_err)?;
        Ok(affected as u64)
    }

    async fn janitor(&self, janitor_id: JanitorId) -> Result<Option<Janitor>, PortError> {
        self.conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT janitor_id, first_name, last_name, email, phone
                     FROM janitors WHERE janitor_id = ?1 LIMIT 1",
                    params![janitor_id.0],
                    |row| {
                        Ok(Janitor {
                            id: JanitorId(row.get(0)?),
                            first_name: row.get(1)?,
                            last_name: row.get(2)?,
                            email: row.get(3)?,
                            phone: row.get(4)?,
                        })
                    },
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)
    }

    async fn bin_code(&self, bin_id: BinId) -> Result<Option<String>, PortError> {
        let code = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    "SELECT bin_code FROM bins WHERE bin_id = ?1 LIMIT 1",
                    params![bin_id.0],
                    |row| row.get::<_, Option<String>>(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;
        Ok(code.flatten())
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<(), PortError> {
        let notification = notification.clone();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO notifications
                         (admin_id, janitor_id, bin_id, notification_type, title, message, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        notification.admin_id,
                        notification.janitor_id.0,
                        notification.bin_id.0,
                        notification.category.as_str(),
                        notification.title,
                        notification.message,
                        notification.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn insert_bin_history(&self, entry: &AuditEntry) -> Result<(), PortError> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO bin_history (bin_id, janitor_id, status, action_type, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        entry.bin_id.0,
                        entry.janitor_id.0,
                        entry.status.as_str(),
                        entry.action_type,
                        entry.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn insert_bin_log(&self, entry: &AuditEntry) -> Result<(), PortError> {
        let action = entry.action_label().to_owned();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                conn.execute(
                    "INSERT INTO bin_logs (bin_id, performed_by, action, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        entry.bin_id.0,
                        entry.janitor_id.0,
                        action,
                        entry.status.as_str(),
                        entry.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn assigned_bins(&self, janitor_id: JanitorId) -> Result<Vec<Bin>, PortError> {
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<BinRow>, rusqlite::Error> {
                let mut stmt =
                    conn.prepare(&format!("SELECT {BIN_COLUMNS} FROM bins WHERE assigned_to = ?1"))?;
                let rows = stmt.query_map(params![janitor_id.0], BinRow::from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await
            .map_err(map_tr_err)?;
        rows.into_iter().map(BinRow::into_bin).collect()
    }

    async fn count_completed_actions(
        &self,
        schema: AuditSchema,
        janitor_id: JanitorId,
        day: NaiveDate,
    ) -> Result<u64, PortError> {
        let sql = match schema {
            AuditSchema::None => return Ok(0),
            AuditSchema::BinHistory => {
                "SELECT COUNT(*) FROM bin_history
                 WHERE janitor_id = ?1 AND action_type IN (?2, ?3) AND date(created_at) = ?4"
            }
            AuditSchema::BinLogs => {
                "SELECT COUNT(*) FROM bin_logs
                 WHERE performed_by = ?1 AND action IN (?2, ?3) AND date(created_at) = ?4"
            }
        };
        let [emptied, completed] = COMPLETED_ACTIONS;
        let count = self
            .conn
            .call(move |conn| {
                conn.query_row(
                    sql,
                    params![janitor_id.0, emptied, completed, day],
                    |row| row.get::<_, i64>(0),
                )
            })
            .await
            .map_err(map_tr_err)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn recent_notifications(&self, limit: usize) -> Result<Vec<Notification>, PortError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<NotificationRow>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT notification_id, admin_id, janitor_id, bin_id, notification_type,
                            title, message, created_at
                     FROM notifications
                     ORDER BY created_at DESC, notification_id DESC
                     LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        admin_id: row.get(1)?,
                        janitor_id: row.get(2)?,
                        bin_id: row.get(3)?,
                        category: row.get(4)?,
                        title: row.get(5)?,
                        message: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            })
            .await
            .map_err(map_tr_err)?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }
}
