//! Trait describing the datastore gateway and its error type.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{
    AuditEntry, AuditSchema, Bin, BinId, BinStatus, Janitor, JanitorId, NewNotification,
    Notification,
};

#[derive(thiserror::Error, Debug)]
/// Errors that can occur while talking to a datastore backend.
pub enum PortError {
    /// A statement could not be prepared or executed.
    #[error("Statement failed: {0}")]
    Statement(String),
    /// A stored row could not be turned into a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

#[async_trait]
/// Parameterized reads and writes against the bins datastore.
///
/// One implementation exists per backing store; the service only sees this trait.
pub trait BinStore: Send + Sync {
    /// Short name of the backend, used in log fields.
    fn backend(&self) -> &'static str;

    /// Set the status of a bin, its capacity when `capacity` is `Some`, and its
    /// modification time.
    ///
    /// Returns the number of rows touched; zero when the bin does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the statement cannot run.
    async fn update_bin_status(
        &self,
        bin_id: BinId,
        status: BinStatus,
        capacity: Option<u8>,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, PortError>;

    /// Look up a janitor by id.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the query fails.
    async fn janitor(&self, janitor_id: JanitorId) -> Result<Option<Janitor>, PortError>;

    /// Look up the display code of a bin.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the query fails.
    async fn bin_code(&self, bin_id: BinId) -> Result<Option<String>, PortError>;

    /// Append a notification.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the insert fails.
    async fn insert_notification(&self, notification: &NewNotification) -> Result<(), PortError>;

    /// Append a row to `bin_history`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the insert fails or the table is missing.
    async fn insert_bin_history(&self, entry: &AuditEntry) -> Result<(), PortError>;

    /// Append a row to `bin_logs`, using [`AuditEntry::action_label`] for the action.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the insert fails or the table is missing.
    async fn insert_bin_log(&self, entry: &AuditEntry) -> Result<(), PortError>;

    /// All bins assigned to a janitor, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the query fails or a row is corrupt.
    async fn assigned_bins(&self, janitor_id: JanitorId) -> Result<Vec<Bin>, PortError>;

    /// Count audit entries by a janitor on `day` whose action marks finished work.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the query fails.
    async fn count_completed_actions(
        &self,
        schema: AuditSchema,
        janitor_id: JanitorId,
        day: NaiveDate,
    ) -> Result<u64, PortError>;

    /// Newest notifications first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the query fails or a row is corrupt.
    async fn recent_notifications(&self, limit: usize) -> Result<Vec<Notification>, PortError>;
}
