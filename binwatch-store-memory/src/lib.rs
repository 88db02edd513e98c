//! In-process implementation of the binwatch datastore port.
//!
//! State lives behind one `tokio` mutex, so every call sees a consistent
//! snapshot and concurrent writes to the same bin are last-write-wins.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use binwatch_core::{
    model::{
        AuditEntry, AuditSchema, Bin, BinId, BinStatus, Janitor, JanitorId, NewNotification,
        Notification,
    },
    ports::{BinStore, PortError},
};

#[derive(Default)]
struct State {
    bins: BTreeMap<BinId, Bin>,
    janitors: HashMap<JanitorId, Janitor>,
    notifications: Vec<Notification>,
    history: Vec<AuditEntry>,
    logs: Vec<AuditEntry>,
}

/// `BinStore` holding everything in memory.
#[derive(Default)]
pub struct InMemoryBinStore {
    state: Mutex<State>,
    audit: AuditSchema,
}

impl InMemoryBinStore {
    /// Empty store that has only the audit table `audit` names.
    ///
    /// Writes to the other audit table fail the way a missing SQL table does.
    #[must_use]
    pub fn new(audit: AuditSchema) -> Self {
        Self {
            state: Mutex::default(),
            audit,
        }
    }

    /// Audit table this store has.
    #[must_use]
    pub fn audit_schema(&self) -> AuditSchema {
        self.audit
    }

    /// Add or replace a bin.
    pub async fn insert_bin(&self, bin: Bin) {
        self.state.lock().await.bins.insert(bin.id, bin);
    }

    /// Add or replace a janitor.
    pub async fn insert_janitor(&self, janitor: Janitor) {
        self.state.lock().await.janitors.insert(janitor.id, janitor);
    }

    /// Current copy of a bin.
    pub async fn bin(&self, bin_id: BinId) -> Option<Bin> {
        self.state.lock().await.bins.get(&bin_id).cloned()
    }

    /// Every stored notification, oldest first.
    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.lock().await.notifications.clone()
    }

    /// Every `bin_history` row, oldest first.
    pub async fn history(&self) -> Vec<AuditEntry> {
        self.state.lock().await.history.clone()
    }

    /// Every `bin_logs` row, oldest first.
    pub async fn logs(&self) -> Vec<AuditEntry> {
        self.state.lock().await.logs.clone()
    }

    fn require(&self, schema: AuditSchema) -> Result<(), PortError> {
        if self.audit == schema {
            return Ok(());
        }
        let table = schema.table().unwrap_or("audit");
        Err(PortError::Statement(format!("no such table: {table}")))
    }
}

#[async_trait]
impl BinStore for InMemoryBinStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn update_bin_status(
        &self,
        bin_id: BinId,
        status: BinStatus,
        capacity: Option<u8>,
        updated_at: DateTime<Utc>,
    ) -> Result<u64, PortError> {
        let mut state = self.state.lock().await;
        let Some(bin) = state.bins.get_mut(&bin_id) else {
            return Ok(0);
        };
        bin.status = status;
        if capacity.is_some() {
            bin.capacity = capacity;
        }
        bin.updated_at = Some(updated_at);
        Ok(1)
    }

    async fn janitor(&self, janitor_id: JanitorId) -> Result<Option<Janitor>, PortError> {
        Ok(self.state.lock().await.janitors.get(&janitor_id).cloned())
    }

    async fn bin_code(&self, bin_id: BinId) -> Result<Option<String>, PortError> {
        Ok(self
            .state
            .lock()
            .await
            .bins
            .get(&bin_id)
            .and_then(|bin| bin.code.clone()))
    }

    async fn insert_notification(&self, notification: &NewNotification) -> Result<(), PortError> {
        let mut state = self.state.lock().await;
        let id = i64::try_from(state.notifications.len())
            .map_err(|err| PortError::Statement(err.to_string()))?
            + 1;
        state.notifications.push(Notification {
            id,
            body: notification.clone(),
        });
        Ok(())
    }

    async fn insert_bin_history(&self, entry: &AuditEntry) -> Result<(), PortError> {
        self.require(AuditSchema::BinHistory)?;
        self.state.lock().await.history.push(entry.clone());
        Ok(())
    }

    async fn insert_bin_log(&self, entry: &AuditEntry) -> Result<(), PortError> {
        self.require(AuditSchema::BinLogs)?;
        let mut logged = entry.clone();
        logged.action_type = Some(entry.action_label().to_owned());
        self.state.lock().await.logs.push(logged);
        Ok(())
    }

    async fn assigned_bins(&self, janitor_id: JanitorId) -> Result<Vec<Bin>, PortError> {
        Ok(self
            .state
            .lock()
            .await
            .bins
            .values()
            .filter(|bin| bin.assigned_to == Some(janitor_id))
            .cloned()
            .collect())
    }

    async fn count_completed_actions(
        &self,
        schema: AuditSchema,
        janitor_id: JanitorId,
        day: NaiveDate,
    ) -> Result<u64, PortError> {
        if schema == AuditSchema::None {
            return Ok(0);
        }
        self.require(schema)?;
        let state = self.state.lock().await;
        let entries = match schema {
            AuditSchema::BinLogs => &state.logs,
            AuditSchema::BinHistory | AuditSchema::None => &state.history,
        };
        let count = entries
            .iter()
            .filter(|entry| {
                entry.janitor_id == janitor_id
                    && entry.is_completion()
                    && entry.created_at.date_naive() == day
            })
            .count();
        Ok(count as u64)
    }

    async fn recent_notifications(&self, limit: usize) -> Result<Vec<Notification>, PortError> {
        let state = self.state.lock().await;
        let mut recent = state.notifications.clone();
        recent.sort_by(|left, right| {
            right
                .body
                .created_at
                .cmp(&left.body.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });
        recent.truncate(limit);
        Ok(recent)
    }
}
