//! Delivery channel for stock reports.
//!
//! The relay does not talk to the chat platform itself. It hands every
//! report to a [`Delivery`] implementation, which only has to tell apart
//! "this user can no longer be reached" from every other failure: the former
//! ends the user's tracking session, the latter is logged and retried on the
//! next tick.
//!
//! [`WebhookDelivery`] is the shipped implementation. It posts the rendered
//! message as JSON to the bot front-end:
//!
//! ```text
//! POST {base_url}/users/{user_id}/messages
//! ```
//!
//! The user ID is percent-encoded as a single path segment. `404 Not Found`
//! and `410 Gone` mean the user is unreachable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::{debug, warn};

use crate::report::StockReport;

/// Timeout for a single delivery request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors reported by a delivery channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The user no longer exists or cannot receive messages.
    #[error("user {user_id} is unreachable")]
    Unreachable {
        /// The user that could not be resolved.
        user_id: String,
    },

    /// Any other failure; the next tick tries again.
    #[error("delivery failed: {0}")]
    Failed(String),

    /// The delivery client could not be built.
    #[error("client configuration error: {0}")]
    Configuration(String),
}

impl DeliveryError {
    /// Returns `true` if the target is permanently gone.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Sends a report to a user.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Delivers one report to `user_id`.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::Unreachable`] - The user cannot be reached any more
    /// - [`DeliveryError::Failed`] - A transient or unknown failure
    async fn deliver(&self, user_id: &str, report: &StockReport) -> Result<(), DeliveryError>;
}

/// Delivers reports by posting them to the bot front-end's webhook.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    http_client: Client,
    base_url: Url,
}

impl WebhookDelivery {
    /// Creates a webhook delivery client.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Configuration`] if `base_url` is not an HTTP
    /// base URL or the HTTP client cannot be created.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, DeliveryError> {
        let base_url = Url::parse(base_url.as_ref()).map_err(|e| {
            DeliveryError::Configuration(format!("invalid delivery URL: {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(DeliveryError::Configuration(format!(
                "delivery URL cannot carry a path: {base_url}"
            )));
        }

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                DeliveryError::Configuration(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    fn message_url(&self, user_id: &str) -> Result<Url, DeliveryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                DeliveryError::Configuration(format!(
                    "delivery URL cannot carry a path: {}",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["users", user_id, "messages"]);
        Ok(url)
    }
}

#[async_trait]
impl Delivery for WebhookDelivery {
    async fn deliver(&self, user_id: &str, report: &StockReport) -> Result<(), DeliveryError> {
        let url = self.message_url(user_id)?;

        debug!(user_id = %user_id, url = %url, "Delivering stock report");

        let response = self
            .http_client
            .post(url)
            .json(&report.to_message())
            .send()
            .await
            .map_err(|e| DeliveryError::Failed(format!("request failed: {e}")))?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(DeliveryError::Unreachable {
                user_id: user_id.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(user_id = %user_id, status = %status, body = %body, "Delivery rejected");
            return Err(DeliveryError::Failed(format!(
                "unexpected status {status}: {body}"
            )));
        }

        Ok(())
    }
}
