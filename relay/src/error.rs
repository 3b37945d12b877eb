//! Error types for Garden Relay.
//!
//! This module defines the top-level error used during process bootstrap,
//! plus the persistence error raised by the registered-user store.
//!
//! # Error Types
//!
//! - [`StoreError`] - Reading or writing the persisted user list
//! - [`RelayError`] - Top-level error encompassing every bootstrap failure
//!
//! Errors raised while a tracking session is running never reach this
//! type: feed failures collapse into an error report and delivery failures
//! are logged by the session task.

use thiserror::Error;

use crate::config::ConfigError;
use crate::delivery::DeliveryError;
use crate::feeds::FeedError;

/// Errors that occur while loading or persisting the registered-user list.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("user store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file does not hold a JSON array of strings.
    #[error("user store is not a valid JSON array of user IDs: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error type for Garden Relay.
///
/// Returned from the bootstrap path of the binary; none of these are raised
/// once the relay is serving requests.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration could not be parsed or validated.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The upstream feed client could not be constructed.
    #[error("feed client error: {0}")]
    Feed(#[from] FeedError),

    /// The delivery client could not be constructed.
    #[error("delivery client error: {0}")]
    Delivery(#[from] DeliveryError),

    /// The user store failed in a way the caller has to handle.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Binding or serving the command API failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Returns `true` if the error comes from operator-supplied configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// A specialized `Result` type for relay bootstrap.
pub type Result<T> = std::result::Result<T, RelayError>;
