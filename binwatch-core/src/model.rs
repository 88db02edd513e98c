//! Domain data structures for bins, janitors, notifications, and audit entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status value older clients still send for a half-full bin.
pub const LEGACY_IN_PROGRESS: &str = "in_progress";

/// Action recorded in `bin_logs` when the janitor gave no action type.
pub const DEFAULT_LOG_ACTION: &str = "status_update";

/// Action types that count as finished work on the dashboard.
pub const COMPLETED_ACTIONS: [&str; 2] = ["emptied", "completed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier of a bin row.
pub struct BinId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Identifier of a janitor row.
pub struct JanitorId(pub i64);

impl JanitorId {
    /// Whether the id can belong to an authenticated janitor.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for BinId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl fmt::Display for JanitorId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Closed set of states a bin can be in. Any state may move to any other.
pub enum BinStatus {
    /// Freshly emptied.
    Empty,
    /// Partially filled.
    HalfFull,
    /// Needs emptying.
    Full,
    /// Damaged, dirty, or otherwise flagged for a visit.
    NeedsAttention,
    /// Taken out of rotation on purpose.
    Disabled,
    /// Broken and waiting for repair.
    OutOfService,
}

impl BinStatus {
    /// Every status, in display order.
    pub const ALL: [Self; 6] = [
        Self::Empty,
        Self::HalfFull,
        Self::Full,
        Self::NeedsAttention,
        Self::Disabled,
        Self::OutOfService,
    ];

    /// Wire and storage spelling of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::HalfFull => "half_full",
            Self::Full => "full",
            Self::NeedsAttention => "needs_attention",
            Self::Disabled => "disabled",
            Self::OutOfService => "out_of_service",
        }
    }

    /// Fill estimate written alongside the status, if the status implies one.
    #[must_use]
    pub fn capacity(self) -> Option<u8> {
        match self {
            Self::Empty => Some(10),
            Self::HalfFull => Some(50),
            Self::Full => Some(90),
            Self::NeedsAttention | Self::Disabled | Self::OutOfService => None,
        }
    }

    /// Human label with underscores turned into spaces and each word capitalized.
    #[must_use]
    pub fn label(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect::<String>()
                })
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for BinStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid status value: {0:?}")]
/// Raised when text does not name a known status.
pub struct UnknownStatus(pub String);

impl FromStr for BinStatus {
    type Err = UnknownStatus;

    /// Parse a status, trimming whitespace and mapping the legacy `in_progress` to `half_full`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if trimmed == LEGACY_IN_PROGRESS {
            return Ok(Self::HalfFull);
        }
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == trimmed)
            .ok_or_else(|| UnknownStatus(trimmed.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A physical waste receptacle.
pub struct Bin {
    /// Row identifier.
    pub id: BinId,
    /// Short code painted on the bin, such as `B-12`.
    pub code: Option<String>,
    /// Where the bin stands.
    pub location: Option<String>,
    /// Kind of waste the bin takes.
    pub bin_type: Option<String>,
    /// Current state.
    pub status: BinStatus,
    /// Fill estimate from 0 to 100.
    pub capacity: Option<u8>,
    /// Janitor responsible for the bin.
    pub assigned_to: Option<JanitorId>,
    /// When the row was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the status last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bin {
    /// A bin with the given id and status and nothing else known about it.
    #[must_use]
    pub fn new(id: BinId, status: BinStatus) -> Self {
        Self {
            id,
            code: None,
            location: None,
            bin_type: None,
            status,
            capacity: status.capacity(),
            assigned_to: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Full by status or by a capacity reading of 100 or more.
    #[must_use]
    pub fn needs_emptying(&self) -> bool {
        self.status == BinStatus::Full || self.capacity.is_some_and(|capacity| capacity >= 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Staff member who looks after bins.
pub struct Janitor {
    /// Row identifier.
    pub id: JanitorId,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Contact e-mail.
    pub email: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
}

impl Janitor {
    /// Trimmed "first last", or `None` when both parts are blank.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let name = name.trim();
        (!name.is_empty()).then(|| name.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
/// Category tag stored in `notifications.notification_type`.
pub enum NotificationCategory {
    /// Informational; used for status updates.
    Info,
    /// Something an admin should look at.
    Warning,
    /// Urgent.
    Alert,
    /// Any other tag found in the datastore.
    Other(String),
}

impl NotificationCategory {
    /// Storage spelling of the category.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Alert => "alert",
            Self::Other(tag) => tag,
        }
    }

    /// Map a stored tag back to a category.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "info" => Self::Info,
            "warning" => Self::Warning,
            "alert" => Self::Alert,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<NotificationCategory> for String {
    fn from(category: NotificationCategory) -> Self {
        match category {
            NotificationCategory::Other(tag) => tag,
            known => known.as_str().to_owned(),
        }
    }
}

impl From<String> for NotificationCategory {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Notification about to be written.
pub struct NewNotification {
    /// Admin recipient; `None` means visible to every admin.
    pub admin_id: Option<i64>,
    /// Janitor who caused the notification.
    pub janitor_id: JanitorId,
    /// Bin the notification is about.
    pub bin_id: BinId,
    /// Category tag.
    pub category: NotificationCategory,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Stored notification.
pub struct Notification {
    /// Row identifier.
    pub id: i64,
    /// Stored fields.
    #[serde(flatten)]
    pub body: NewNotification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Which optional audit table the target datastore has.
pub enum AuditSchema {
    /// No audit table; audit writes are skipped.
    #[default]
    None,
    /// `bin_history(bin_id, janitor_id, status, action_type, created_at)`.
    BinHistory,
    /// `bin_logs(bin_id, performed_by, action, status, created_at)`.
    BinLogs,
}

impl AuditSchema {
    /// Name of the backing table, if any.
    #[must_use]
    pub fn table(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::BinHistory => Some("bin_history"),
            Self::BinLogs => Some("bin_logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Append-only record of a status change.
pub struct AuditEntry {
    /// Bin that changed.
    pub bin_id: BinId,
    /// Janitor who changed it.
    pub janitor_id: JanitorId,
    /// Status after the change.
    pub status: BinStatus,
    /// Free-text action such as `emptied` or `inspection`.
    pub action_type: Option<String>,
    /// When the change happened.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Value for the `bin_logs.action` column.
    #[must_use]
    pub fn action_label(&self) -> &str {
        self.action_type.as_deref().unwrap_or(DEFAULT_LOG_ACTION)
    }

    /// Whether the entry records finished work.
    #[must_use]
    pub fn is_completion(&self) -> bool {
        self.action_type
            .as_deref()
            .is_some_and(|action| COMPLETED_ACTIONS.contains(&action))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Numbers and bins shown on a janitor's dashboard.
pub struct DashboardStats {
    /// Janitor the stats belong to.
    pub janitor_id: JanitorId,
    /// Assigned bins, fullest first.
    pub bins: Vec<Bin>,
    /// Number of bins assigned to the janitor.
    pub assigned_bins: u64,
    /// Assigned bins that need emptying.
    pub full_bins: u64,
    /// Work waiting for the janitor; equal to `full_bins`.
    pub pending_tasks: u64,
    /// Bins emptied or completed today.
    pub completed_today: u64,
}
