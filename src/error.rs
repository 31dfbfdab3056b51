//! Error types for the notification bus.

use thiserror::Error;

/// Errors surfaced by the bus.
///
/// Publishing and subscription management never fail; only construction
/// from a caller-supplied configuration can.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("Invalid bus configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
