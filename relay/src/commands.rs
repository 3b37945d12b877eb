//! Command handlers.
//!
//! The three user-facing commands: `register`, `track` and `stop`. Each one
//! checks the registered-user store and the session manager, mutates at most
//! one of them, and returns an outcome that knows how to render its reply.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::report::{ReportMessage, ERROR_COLOR, FOOTER_TEXT};
use crate::session::SessionManager;
use crate::store::{RegisterOutcome, UserStore};

/// Accent color of a successful reply.
const SUCCESS_COLOR: u32 = 0x57F287;

/// Accent color of a warning reply.
const WARNING_COLOR: u32 = 0xFEE75C;

/// Outcome of a `track` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackOutcome {
    NotRegistered,
    AlreadyTracking,
    Started,
}

/// Outcome of a `stop` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopOutcome {
    NotTracking,
    Stopped,
}

/// Entry points for the command front-end.
#[derive(Clone)]
pub struct CommandHandler {
    users: Arc<dyn UserStore>,
    sessions: SessionManager,
}

impl CommandHandler {
    pub fn new(users: Arc<dyn UserStore>, sessions: SessionManager) -> Self {
        Self { users, sessions }
    }

    /// The registered-user store.
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// The session manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Registers the user.
    pub async fn register(&self, user_id: &str) -> RegisterOutcome {
        self.users.register(user_id).await
    }

    /// Starts tracking for a registered user.
    pub async fn track(&self, user_id: &str) -> TrackOutcome {
        if !self.users.is_registered(user_id).await {
            info!(user_id = %user_id, "Track refused, user not registered");
            return TrackOutcome::NotRegistered;
        }

        if self.sessions.start(user_id) {
            TrackOutcome::Started
        } else {
            TrackOutcome::AlreadyTracking
        }
    }

    /// Stops tracking.
    pub fn stop(&self, user_id: &str) -> StopOutcome {
        if self.sessions.stop(user_id) {
            StopOutcome::Stopped
        } else {
            StopOutcome::NotTracking
        }
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("users", &"<UserStore>")
            .field("sessions", &self.sessions)
            .finish()
    }
}

/// Reply to a `register` command.
///
/// `display_name` personalises the success message; the user ID is used when
/// the front-end does not provide one.
pub fn register_reply(outcome: RegisterOutcome, display_name: &str) -> ReportMessage {
    match outcome {
        RegisterOutcome::AlreadyRegistered => reply(
            "⚠️ Already Registered",
            "You are already registered!",
            WARNING_COLOR,
        ),
        RegisterOutcome::Registered => reply(
            "✅ Registration Successful!",
            format!(
                "Hi **{display_name}**, you are now registered to use the Grow A Garden tracker bot."
            ),
            SUCCESS_COLOR,
        ),
    }
}

/// Reply to a `track` command.
pub fn track_reply(outcome: TrackOutcome, interval: Duration) -> ReportMessage {
    match outcome {
        TrackOutcome::NotRegistered => reply(
            "⚠️ Not Registered",
            "You need to register first to use this bot. Use `/register`.",
            ERROR_COLOR,
        ),
        TrackOutcome::AlreadyTracking => reply(
            "⚠️ Already Tracking",
            "You are already receiving updates. Use `/stop` to stop.",
            WARNING_COLOR,
        ),
        TrackOutcome::Started => reply(
            "📡 Tracking Started",
            format!(
                "You'll receive Grow A Garden stock updates every {} seconds via DM.",
                interval.as_secs()
            ),
            SUCCESS_COLOR,
        ),
    }
}

/// Reply to a `stop` command.
pub fn stop_reply(outcome: StopOutcome) -> ReportMessage {
    match outcome {
        StopOutcome::NotTracking => reply(
            "⚠️ Not Tracking",
            "You are not currently receiving updates.",
            WARNING_COLOR,
        ),
        StopOutcome::Stopped => reply(
            "🛑 Tracking Stopped",
            "You will no longer receive Grow A Garden stock updates.",
            ERROR_COLOR,
        ),
    }
}

fn reply(title: &str, description: impl Into<String>, color: u32) -> ReportMessage {
    ReportMessage {
        title: title.to_string(),
        description: Some(description.into()),
        color,
        fields: Vec::new(),
        footer: FOOTER_TEXT.to_string(),
        timestamp: None,
    }
}
