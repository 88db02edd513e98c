//! Text shown to admins after a janitor changes a bin.

use crate::model::{BinId, BinStatus, Janitor, JanitorId};

/// Name used for the actor in notification text.
#[must_use]
pub fn actor_display(actor: JanitorId, janitor: Option<&Janitor>) -> String {
    if let Some(name) = janitor.and_then(Janitor::full_name) {
        return name;
    }
    if actor.is_valid() {
        format!("Janitor #{actor}")
    } else {
        "A janitor".to_owned()
    }
}

/// Name used for the bin in notification text.
#[must_use]
pub fn bin_display(bin_id: BinId, code: Option<&str>) -> String {
    match code.map(str::trim).filter(|code| !code.is_empty()) {
        Some(code) => format!("Bin '{code}'"),
        None => format!("Bin #{bin_id}"),
    }
}

/// Headline of a status-change notification.
#[must_use]
pub fn status_title(bin: &str) -> String {
    format!("{bin} status updated")
}

/// Body of a status-change notification.
#[must_use]
pub fn status_message(actor: &str, status: BinStatus, action_type: Option<&str>) -> String {
    let mut message = format!("{actor} updated status to \"{}\".", status.label());
    if let Some(action) = action_type.filter(|action| !action.is_empty()) {
        message.push_str(" Action: ");
        message.push_str(action);
        message.push('.');
    }
    message
}
