//! High-level service facade for janitor bin operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{
    AuditEntry, AuditSchema, Bin, BinId, BinStatus, DashboardStats, JanitorId, NewNotification,
    Notification, NotificationCategory, UnknownStatus,
};
use crate::notice;
use crate::ports::{BinStore, PortError};

/// Default cap on bins returned with dashboard stats.
pub const DEFAULT_BIN_LIMIT: usize = 500;

#[derive(thiserror::Error, Debug)]
/// Errors that abort a service call. Nothing is written when one is returned
/// before the primary update.
pub enum ServiceError {
    /// No authenticated janitor.
    #[error("Unauthorized")]
    Unauthorized,
    /// Requested status is not one of the known statuses.
    #[error(transparent)]
    InvalidStatus(#[from] UnknownStatus),
    /// The datastore rejected the primary statement.
    #[error(transparent)]
    Persistence(#[from] PortError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Secondary write or lookup that failed without failing the update.
pub enum SideEffectWarning {
    /// The notification could not be stored.
    #[error("notification insert failed: {0}")]
    Notification(String),
    /// The audit row could not be stored.
    #[error("audit insert into {table} failed: {message}")]
    Audit {
        /// Table the row was meant for.
        table: &'static str,
        /// Driver message.
        message: String,
    },
    /// A display-name lookup failed and a fallback was used.
    #[error("lookup failed: {0}")]
    Lookup(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A janitor's request to change a bin's status.
pub struct StatusUpdate {
    /// Bin to change; it does not have to exist.
    #[serde(alias = "bin_id")]
    pub bin_id: BinId,
    /// Requested status as sent by the client.
    pub status: String,
    /// Optional free-text action such as `emptied`.
    #[serde(default, alias = "action_type")]
    pub action_type: Option<String>,
}

impl StatusUpdate {
    /// Construct a new request.
    #[must_use]
    pub fn new<S: Into<String>, A: Into<String>>(
        bin_id: BinId,
        status: S,
        action_type: Option<A>,
    ) -> Self {
        Self {
            bin_id,
            status: status.into(),
            action_type: action_type.map(Into::into),
        }
    }

    /// Trimmed action type, `None` when blank.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action_type
            .as_deref()
            .map(str::trim)
            .filter(|action| !action.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a successful status update.
pub struct UpdateOutcome {
    /// Status after normalization.
    pub status: BinStatus,
    /// Rows touched by the primary update.
    pub affected: u64,
    /// Secondary failures that were logged and skipped.
    pub warnings: Vec<SideEffectWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
/// JSON body returned to the caller of a status update.
pub enum UpdateResponse {
    /// `{"success":true,"status":…,"affected":…}`
    Updated {
        /// Always `true`.
        success: bool,
        /// Status after normalization.
        status: BinStatus,
        /// Rows touched by the primary update.
        affected: u64,
    },
    /// `{"success":false,"message":…}`
    Rejected {
        /// Always `false`.
        success: bool,
        /// Short reason.
        message: String,
    },
}

impl UpdateResponse {
    /// Whether the update went through.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }
}

impl From<Result<UpdateOutcome, ServiceError>> for UpdateResponse {
    fn from(result: Result<UpdateOutcome, ServiceError>) -> Self {
        match result {
            Ok(outcome) => Self::Updated {
                success: true,
                status: outcome.status,
                affected: outcome.affected,
            },
            Err(err) => Self::Rejected {
                success: false,
                message: err.to_string(),
            },
        }
    }
}

/// Public entry point for status updates and dashboard reads.
#[derive(Clone)]
pub struct BinService {
    store: Arc<dyn BinStore>,
    audit: AuditSchema,
    bin_limit: usize,
}

impl BinService {
    /// Create a new service bound to a store and the audit table it has.
    #[must_use]
    pub fn new(store: Arc<dyn BinStore>, audit: AuditSchema) -> Self {
        Self {
            store,
            audit,
            bin_limit: DEFAULT_BIN_LIMIT,
        }
    }

    /// Cap the number of bins returned with dashboard stats.
    #[must_use]
    pub fn with_bin_limit(mut self, bin_limit: usize) -> Self {
        self.bin_limit = bin_limit;
        self
    }

    /// Audit table this service writes to.
    #[must_use]
    pub fn audit_schema(&self) -> AuditSchema {
        self.audit
    }

    /// Change a bin's status on behalf of `actor`.
    ///
    /// The bin row is updated first. The notification and audit writes that
    /// follow are best effort: their failures are logged and returned as
    /// warnings in the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for a missing or non-positive actor,
    /// [`ServiceError::InvalidStatus`] for an unknown status, and
    /// [`ServiceError::Persistence`] when the bin update fails.
    pub async fn update_bin_status(
        &self,
        actor: Option<JanitorId>,
        request: &StatusUpdate,
    ) -> Result<UpdateOutcome, ServiceError> {
        let actor = authorize(actor)?;
        let status: BinStatus = request.status.parse()?;
        let action = request.action();
        let bin_id = request.bin_id;
        let now = Utc::now();

        let affected = self
            .store
            .update_bin_status(bin_id, status, status.capacity(), now)
            .await?;
        info!(
            backend = self.store.backend(),
            bin_id = %bin_id,
            janitor_id = %actor,
            status = %status,
            affected,
            "bin status updated"
        );

        let mut warnings = Vec::new();

        let notification = self
            .compose_notification(actor, bin_id, status, action, now, &mut warnings)
            .await;
        if let Err(err) = self.store.insert_notification(&notification).await {
            warn!(bin_id = %bin_id, error = %err, "notification insert failed");
            warnings.push(SideEffectWarning::Notification(err.to_string()));
        }

        let entry = AuditEntry {
            bin_id,
            janitor_id: actor,
            status,
            action_type: action.map(str::to_owned),
            created_at: now,
        };
        if let Some(warning) = self.record_audit(&entry).await {
            warnings.push(warning);
        }

        Ok(UpdateOutcome {
            status,
            affected,
            warnings,
        })
    }

    /// Stats and assigned bins for a janitor's dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Unauthorized`] for a missing or non-positive janitor
    /// and [`ServiceError::Persistence`] when a read fails.
    pub async fn dashboard(&self, janitor: Option<JanitorId>) -> Result<DashboardStats, ServiceError> {
        let janitor_id = authorize(janitor)?;

        let mut bins = self.store.assigned_bins(janitor_id).await?;
        let assigned_bins = bins.len() as u64;
        let full_bins = bins.iter().filter(|bin| bin.needs_emptying()).count() as u64;

        let completed_today = match self.audit {
            AuditSchema::None => 0,
            schema => {
                self.store
                    .count_completed_actions(schema, janitor_id, Utc::now().date_naive())
                    .await?
            }
        };

        sort_for_dashboard(&mut bins);
        bins.truncate(self.bin_limit);
        debug!(janitor_id = %janitor_id, assigned_bins, full_bins, completed_today, "dashboard loaded");

        Ok(DashboardStats {
            janitor_id,
            bins,
            assigned_bins,
            full_bins,
            pending_tasks: full_bins,
            completed_today,
        })
    }

    /// Newest notifications first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Persistence`] when the read fails.
    pub async fn recent_notifications(&self, limit: usize) -> Result<Vec<Notification>, ServiceError> {
        Ok(self.store.recent_notifications(limit).await?)
    }

    async fn compose_notification(
        &self,
        actor: JanitorId,
        bin_id: BinId,
        status: BinStatus,
        action: Option<&str>,
        now: DateTime<Utc>,
        warnings: &mut Vec<SideEffectWarning>,
    ) -> NewNotification {
        let janitor = match self.store.janitor(actor).await {
            Ok(janitor) => janitor,
            Err(err) => {
                warn!(janitor_id = %actor, error = %err, "janitor lookup failed");
                warnings.push(SideEffectWarning::Lookup(err.to_string()));
                None
            }
        };

        let code = if bin_id.0 > 0 {
            match self.store.bin_code(bin_id).await {
                Ok(code) => code,
                Err(err) => {
                    warn!(bin_id = %bin_id, error = %err, "bin code lookup failed");
                    warnings.push(SideEffectWarning::Lookup(err.to_string()));
                    None
                }
            }
        } else {
            None
        };

        let actor_name = notice::actor_display(actor, janitor.as_ref());
        let bin_name = notice::bin_display(bin_id, code.as_deref());

        NewNotification {
            admin_id: None,
            janitor_id: actor,
            bin_id,
            category: NotificationCategory::Info,
            title: notice::status_title(&bin_name),
            message: notice::status_message(&actor_name, status, action),
            created_at: now,
        }
    }

    async fn record_audit(&self, entry: &AuditEntry) -> Option<SideEffectWarning> {
        let table = self.audit.table()?;
        let result = match self.audit {
            AuditSchema::None => return None,
            AuditSchema::BinHistory => self.store.insert_bin_history(entry).await,
            AuditSchema::BinLogs => self.store.insert_bin_log(entry).await,
        };
        match result {
            Ok(()) => None,
            Err(err) => {
                warn!(table, bin_id = %entry.bin_id, error = %err, "audit insert failed");
                Some(SideEffectWarning::Audit {
                    table,
                    message: err.to_string(),
                })
            }
        }
    }
}

fn authorize(actor: Option<JanitorId>) -> Result<JanitorId, ServiceError> {
    actor
        .filter(|id| id.is_valid())
        .ok_or(ServiceError::Unauthorized)
}

/// Order bins for the dashboard: bins needing emptying first, then by capacity
/// (unknown last), then newest first.
pub fn sort_for_dashboard(bins: &mut [Bin]) {
    bins.sort_by(|left, right| {
        right
            .needs_emptying()
            .cmp(&left.needs_emptying())
            .then_with(|| right.capacity.cmp(&left.capacity))
            .then_with(|| right.created_at.cmp(&left.created_at))
    });
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, MutexGuard};

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::model::Janitor;

    #[derive(Default)]
    struct Recorded {
        updates: Vec<(BinId, BinStatus, Option<u8>)>,
        notifications: Vec<NewNotification>,
        history: Vec<AuditEntry>,
        logs: Vec<String>,
    }

    #[derive(Default)]
    struct RecordingStore {
        recorded: Mutex<Recorded>,
        janitors: Vec<Janitor>,
        codes: Vec<(BinId, String)>,
        bins: Vec<Bin>,
        affected: u64,
        fail_update: bool,
        fail_notification: bool,
        fail_audit: bool,
        fail_lookup: bool,
    }

    impl RecordingStore {
        fn with_jane() -> Self {
            Self {
                janitors: vec![Janitor {
                    id: JanitorId(7),
                    first_name: Some("Jane".to_owned()),
                    last_name: Some("Doe".to_owned()),
                    email: None,
                    phone: None,
                }],
                codes: vec![(BinId(12), "B-12".to_owned())],
                affected: 1,
                ..Self::default()
            }
        }

        fn recorded(&self) -> MutexGuard<'_, Recorded> {
            self.recorded.lock().expect("recording lock")
        }
    }

    fn failure(what: &str) -> PortError {
        PortError::Statement(format!("{what} refused"))
    }

    #[async_trait]
    impl BinStore for RecordingStore {
        fn backend(&self) -> &'static str {
            "recording"
        }

        async fn update_bin_status(
            &self,
            bin_id: BinId,
            status: BinStatus,
            capacity: Option<u8>,
            _updated_at: DateTime<Utc>,
        ) -> Result<u64, PortError> {
            if self.fail_update {
                return Err(failure("update"));
            }
            self.recorded().updates.push((bin_id, status, capacity));
            Ok(self.affected)
        }

        async fn janitor(&self, janitor_id: JanitorId) -> Result<Option<Janitor>, PortError> {
            if self.fail_lookup {
                return Err(failure("janitor lookup"));
            }
            Ok(self
                .janitors
                .iter()
                .find(|janitor| janitor.id == janitor_id)
                .cloned())
        }

        async fn bin_code(&self, bin_id: BinId) -> Result<Option<String>, PortError> {
            if self.fail_lookup {
                return Err(failure("bin lookup"));
            }
            Ok(self
                .codes
                .iter()
                .find(|(id, _code)| *id == bin_id)
                .map(|(_id, code)| code.clone()))
        }

        async fn insert_notification(&self, notification: &NewNotification) -> Result<(), PortError> {
            if self.fail_notification {
                return Err(failure("notification"));
            }
            self.recorded().notifications.push(notification.clone());
            Ok(())
        }

        async fn insert_bin_history(&self, entry: &AuditEntry) -> Result<(), PortError> {
            if self.fail_audit {
                return Err(failure("history"));
            }
            self.recorded().history.push(entry.clone());
            Ok(())
        }

        async fn insert_bin_log(&self, entry: &AuditEntry) -> Result<(), PortError> {
            if self.fail_audit {
                return Err(failure("log"));
            }
            self.recorded().logs.push(entry.action_label().to_owned());
            Ok(())
        }

        async fn assigned_bins(&self, janitor_id: JanitorId) -> Result<Vec<Bin>, PortError> {
            Ok(self
                .bins
                .iter()
                .filter(|bin| bin.assigned_to == Some(janitor_id))
                .cloned()
                .collect())
        }

        async fn count_completed_actions(
            &self,
            _schema: AuditSchema,
            _janitor_id: JanitorId,
            _day: NaiveDate,
        ) -> Result<u64, PortError> {
            Ok(2)
        }

        async fn recent_notifications(&self, _limit: usize) -> Result<Vec<Notification>, PortError> {
            Ok(Vec::new())
        }
    }

    fn service(store: &Arc<RecordingStore>, audit: AuditSchema) -> BinService {
        let port: Arc<dyn BinStore> = Arc::<RecordingStore>::clone(store);
        BinService::new(port, audit)
    }

    #[tokio::test]
    async fn every_status_succeeds_and_is_echoed() {
        let store = Arc::new(RecordingStore::with_jane());
        let service = service(&store, AuditSchema::None);

        for status in BinStatus::ALL {
            let request = StatusUpdate::new(BinId(12), status.as_str(), None::<String>);
            let outcome = service
                .update_bin_status(Some(JanitorId(7)), &request)
                .await
                .expect("valid status");
            assert_eq!(outcome.status, status);
            assert_eq!(outcome.affected, 1);
            assert!(outcome.warnings.is_empty(), "no warnings: {:?}", outcome.warnings);
        }
        assert_eq!(store.recorded().updates.len(), 6);
    }

    #[tokio::test]
    async fn legacy_in_progress_behaves_like_half_full() {
        let store = Arc::new(RecordingStore::with_jane());
        let service = service(&store, AuditSchema::None);

        let legacy = StatusUpdate::new(BinId(12), "in_progress", None::<String>);
        let current = StatusUpdate::new(BinId(12), "half_full", None::<String>);
        let first = service
            .update_bin_status(Some(JanitorId(7)), &legacy)
            .await
            .expect("legacy accepted");
        let second = service
            .update_bin_status(Some(JanitorId(7)), &current)
            .await
            .expect("current accepted");
        assert_eq!(first.status, BinStatus::HalfFull);
        assert_eq!(first, second);

        let recorded = store.recorded();
        assert_eq!(recorded.updates.first(), recorded.updates.get(1));
        assert_eq!(
            recorded.updates.first(),
            Some(&(BinId(12), BinStatus::HalfFull, Some(50)))
        );
        let messages: Vec<_> = recorded
            .notifications
            .iter()
            .map(|notification| notification.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                "Jane Doe updated status to \"Half Full\".",
                "Jane Doe updated status to \"Half Full\"."
            ]
        );
    }

    #[tokio::test]
    async fn capacity_is_passed_only_for_fill_statuses() {
        let store = Arc::new(RecordingStore::with_jane());
        let service = service(&store, AuditSchema::None);

        for status in ["empty", "half_full", "full", "needs_attention", "disabled", "out_of_service"] {
            let request = StatusUpdate::new(BinId(1), status, None::<String>);
            service
                .update_bin_status(Some(JanitorId(7)), &request)
                .await
                .expect("valid status");
        }

        let capacities: Vec<_> = store
            .recorded()
            .updates
            .iter()
            .map(|(_bin, _status, capacity)| *capacity)
            .collect();
        assert_eq!(capacities, vec![Some(10), Some(50), Some(90), None, None, None]);
    }

    #[tokio::test]
    async fn invalid_status_has_no_side_effects() {
        let store = Arc::new(RecordingStore::with_jane());
        let service = service(&store, AuditSchema::BinHistory);

        let request = StatusUpdate::new(BinId(12), "overflowing", Some("emptied"));
        let err = service
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect_err("unknown status");
        assert!(matches!(err, ServiceError::InvalidStatus(_)), "got {err:?}");

        let recorded = store.recorded();
        assert!(recorded.updates.is_empty());
        assert!(recorded.notifications.is_empty());
        assert!(recorded.history.is_empty());
    }

    #[tokio::test]
    async fn missing_or_zero_actor_is_unauthorized() {
        let store = Arc::new(RecordingStore::with_jane());
        let service = service(&store, AuditSchema::BinHistory);
        let request = StatusUpdate::new(BinId(12), "full", None::<String>);

        for actor in [None, Some(JanitorId(0)), Some(JanitorId(-4))] {
            let err = service
                .update_bin_status(actor, &request)
                .await
                .expect_err("no actor");
            assert!(matches!(err, ServiceError::Unauthorized), "got {err:?}");
        }

        // Checked before the status, so a bad status still reads as unauthorized.
        let bad = StatusUpdate::new(BinId(12), "nope", None::<String>);
        let err = service.update_bin_status(None, &bad).await.expect_err("no actor");
        assert!(matches!(err, ServiceError::Unauthorized), "got {err:?}");
        assert!(store.recorded().updates.is_empty());
    }

    #[tokio::test]
    async fn failed_primary_update_is_fatal() {
        let store = Arc::new(RecordingStore {
            fail_update: true,
            ..RecordingStore::with_jane()
        });
        let service = service(&store, AuditSchema::BinHistory);
        let request = StatusUpdate::new(BinId(12), "full", None::<String>);

        let err = service
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect_err("update refused");
        assert!(matches!(err, ServiceError::Persistence(_)), "got {err:?}");
        assert!(store.recorded().notifications.is_empty());
        assert!(store.recorded().history.is_empty());

        let response = UpdateResponse::from(Err(err));
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn notification_failure_is_swallowed() {
        let store = Arc::new(RecordingStore {
            fail_notification: true,
            affected: 3,
            ..RecordingStore::with_jane()
        });
        let service = service(&store, AuditSchema::BinHistory);
        let request = StatusUpdate::new(BinId(12), "full", Some("emptied"));

        let outcome = service
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect("secondary failure is not fatal");
        assert_eq!(outcome.status, BinStatus::Full);
        assert_eq!(outcome.affected, 3);
        assert_eq!(
            outcome.warnings,
            vec![SideEffectWarning::Notification(
                "Statement failed: notification refused".to_owned()
            )]
        );
        // Audit still runs after a failed notification.
        assert_eq!(store.recorded().history.len(), 1);

        let response = UpdateResponse::from(Ok(outcome));
        assert_eq!(
            response,
            UpdateResponse::Updated {
                success: true,
                status: BinStatus::Full,
                affected: 3
            }
        );
    }

    #[tokio::test]
    async fn audit_failure_is_swallowed() {
        let store = Arc::new(RecordingStore {
            fail_audit: true,
            ..RecordingStore::with_jane()
        });
        let service = service(&store, AuditSchema::BinLogs);
        let request = StatusUpdate::new(BinId(12), "empty", None::<String>);

        let outcome = service
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect("secondary failure is not fatal");
        assert_eq!(store.recorded().notifications.len(), 1);
        assert!(matches!(
            outcome.warnings.as_slice(),
            [SideEffectWarning::Audit { table: "bin_logs", .. }]
        ));
    }

    #[tokio::test]
    async fn notification_text_matches_dashboard_format() {
        let store = Arc::new(RecordingStore::with_jane());
        let service = service(&store, AuditSchema::None);

        let request = StatusUpdate::new(BinId(12), "full", Some("emptied"));
        service
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect("valid update");

        let recorded = store.recorded();
        let notification = recorded.notifications.first().expect("one notification");
        assert_eq!(notification.title, "Bin 'B-12' status updated");
        assert_eq!(
            notification.message,
            "Jane Doe updated status to \"Full\". Action: emptied."
        );
        assert_eq!(notification.category, NotificationCategory::Info);
        assert_eq!(notification.admin_id, None);
        assert_eq!(notification.janitor_id, JanitorId(7));
        assert_eq!(notification.bin_id, BinId(12));
    }

    #[tokio::test]
    async fn unknown_actor_and_bin_use_fallback_names() {
        let store = Arc::new(RecordingStore::with_jane());
        let service = service(&store, AuditSchema::None);

        let request = StatusUpdate::new(BinId(99), "disabled", Some("  "));
        service
            .update_bin_status(Some(JanitorId(42)), &request)
            .await
            .expect("valid update");

        let recorded = store.recorded();
        let notification = recorded.notifications.first().expect("one notification");
        assert_eq!(notification.title, "Bin #99 status updated");
        assert_eq!(
            notification.message,
            "Janitor #42 updated status to \"Disabled\"."
        );
    }

    #[tokio::test]
    async fn lookup_failures_fall_back_and_warn() {
        let store = Arc::new(RecordingStore {
            fail_lookup: true,
            ..RecordingStore::with_jane()
        });
        let service = service(&store, AuditSchema::None);

        let request = StatusUpdate::new(BinId(12), "full", None::<String>);
        let outcome = service
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect("lookups are best effort");
        assert_eq!(outcome.warnings.len(), 2);

        let recorded = store.recorded();
        let notification = recorded.notifications.first().expect("one notification");
        assert_eq!(notification.message, "Janitor #7 updated status to \"Full\".");
    }

    #[tokio::test]
    async fn audit_target_follows_schema() {
        let request = StatusUpdate::new(BinId(12), "needs_attention", None::<String>);

        let history = Arc::new(RecordingStore::with_jane());
        service(&history, AuditSchema::BinHistory)
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect("valid update");
        assert_eq!(history.recorded().history.len(), 1);
        assert!(history.recorded().logs.is_empty());

        let logs = Arc::new(RecordingStore::with_jane());
        service(&logs, AuditSchema::BinLogs)
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect("valid update");
        assert!(logs.recorded().history.is_empty());
        assert_eq!(logs.recorded().logs, vec!["status_update".to_owned()]);

        let none = Arc::new(RecordingStore::with_jane());
        let outcome = service(&none, AuditSchema::None)
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect("valid update");
        assert!(outcome.warnings.is_empty());
        assert!(none.recorded().history.is_empty());
        assert!(none.recorded().logs.is_empty());
    }

    #[tokio::test]
    async fn zero_affected_rows_is_still_success() {
        let store = Arc::new(RecordingStore {
            affected: 0,
            ..RecordingStore::with_jane()
        });
        let service = service(&store, AuditSchema::BinHistory);
        let request = StatusUpdate::new(BinId(404), "full", None::<String>);

        let outcome = service
            .update_bin_status(Some(JanitorId(7)), &request)
            .await
            .expect("missing bin is not an error");
        assert_eq!(outcome.affected, 0);
        assert_eq!(store.recorded().notifications.len(), 1);
        assert_eq!(store.recorded().history.len(), 1);
    }

    #[test]
    fn responses_serialize_to_dashboard_json() {
        let ok = UpdateResponse::Updated {
            success: true,
            status: BinStatus::HalfFull,
            affected: 1,
        };
        assert_eq!(
            serde_json::to_string(&ok).expect("serializable"),
            r#"{"success":true,"status":"half_full","affected":1}"#
        );

        let rejected = UpdateResponse::from(Err(ServiceError::Unauthorized));
        assert_eq!(
            serde_json::to_string(&rejected).expect("serializable"),
            r#"{"success":false,"message":"Unauthorized"}"#
        );
    }

    #[test]
    fn request_accepts_both_field_spellings() {
        let camel: StatusUpdate =
            serde_json::from_str(r#"{"binId":5,"status":"full","actionType":"emptied"}"#)
                .expect("camelCase");
        let snake: StatusUpdate =
            serde_json::from_str(r#"{"bin_id":5,"status":"full","action_type":"emptied"}"#)
                .expect("snake_case");
        assert_eq!(camel, snake);

        let bare: StatusUpdate =
            serde_json::from_str(r#"{"binId":5,"status":"full"}"#).expect("no action");
        assert_eq!(bare.action(), None);
    }

    #[tokio::test]
    async fn dashboard_orders_bins_and_counts() {
        let stamp = |day: u32| Utc.with_ymd_and_hms(2026, 1, day, 8, 0, 0).single();
        let mut half = Bin::new(BinId(1), BinStatus::HalfFull);
        half.assigned_to = Some(JanitorId(7));
        half.created_at = stamp(1);
        let mut full = Bin::new(BinId(2), BinStatus::Full);
        full.assigned_to = Some(JanitorId(7));
        full.created_at = stamp(1);
        let mut brimming = Bin::new(BinId(3), BinStatus::NeedsAttention);
        brimming.assigned_to = Some(JanitorId(7));
        brimming.capacity = Some(100);
        let mut unknown = Bin::new(BinId(4), BinStatus::Disabled);
        unknown.assigned_to = Some(JanitorId(7));
        let mut newer_half = Bin::new(BinId(5), BinStatus::HalfFull);
        newer_half.assigned_to = Some(JanitorId(7));
        newer_half.created_at = stamp(2);
        let mut other = Bin::new(BinId(6), BinStatus::Full);
        other.assigned_to = Some(JanitorId(8));

        let store = Arc::new(RecordingStore {
            bins: vec![half, full, brimming, unknown, newer_half, other],
            ..RecordingStore::with_jane()
        });

        let stats = service(&store, AuditSchema::BinLogs)
            .dashboard(Some(JanitorId(7)))
            .await
            .expect("dashboard");
        let order: Vec<_> = stats.bins.iter().map(|bin| bin.id.0).collect();
        assert_eq!(order, vec![3, 2, 5, 1, 4]);
        assert_eq!(stats.assigned_bins, 5);
        assert_eq!(stats.full_bins, 2);
        assert_eq!(stats.pending_tasks, 2);
        assert_eq!(stats.completed_today, 2);

        let limited = service(&store, AuditSchema::None)
            .with_bin_limit(2)
            .dashboard(Some(JanitorId(7)))
            .await
            .expect("dashboard");
        assert_eq!(limited.bins.len(), 2);
        assert_eq!(limited.assigned_bins, 5, "counts ignore the limit");
        assert_eq!(limited.completed_today, 0, "no audit table, nothing completed");
    }

    #[tokio::test]
    async fn dashboard_requires_a_janitor() {
        let store = Arc::new(RecordingStore::with_jane());
        let err = service(&store, AuditSchema::None)
            .dashboard(Some(JanitorId(0)))
            .await
            .expect_err("no janitor");
        assert!(matches!(err, ServiceError::Unauthorized), "got {err:?}");
    }
}
