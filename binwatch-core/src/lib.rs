//! Core types and service wiring for the binwatch bin operations backend.

/// Domain models and identifiers shared by all stores.
pub mod model;
/// Notification text composed after a status change.
pub mod notice;
/// Trait describing the datastore interface.
pub mod ports;
/// High-level service facade used by clients.
pub mod service;

pub use model::*;
pub use ports::*;
pub use service::*;
