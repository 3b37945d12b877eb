//! Tracking session manager.
//!
//! A tracking session is one background task per user that, every period,
//! asks a [`ReportSource`] for a fresh report and hands it to a
//! [`Delivery`]. The manager owns the map from user ID to session and is the
//! only place sessions are created or cancelled.
//!
//! # Lifecycle
//!
//! ```text
//! NoSession --start--> Running --stop / unreachable--> NoSession
//! ```
//!
//! - [`SessionManager::start`] is a no-op if the user already has a session.
//! - [`SessionManager::stop`] is a no-op if the user has none.
//! - A tick whose delivery reports [`DeliveryError::Unreachable`] removes its
//!   own entry and ends the task. Any other delivery error is logged and the
//!   session waits for the next tick.
//!
//! Stopping cancels the session's token. A tick already in flight runs to
//! completion; it simply is not followed by another one. On
//! [`SessionManager::shutdown`] ticks get [`SHUTDOWN_GRACE`] to finish before
//! they are aborted.
//!
//! A session task that ends for any reason, including a panic, removes its
//! own entry, so a user is never left marked as tracking without a timer.
//!
//! # Thread Safety
//!
//! The map sits behind a [`std::sync::Mutex`] that is never held across an
//! await point, so every insert and removal is a single atomic step.
//!
//! [`DeliveryError::Unreachable`]: crate::delivery::DeliveryError::Unreachable

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::aggregator::ReportSource;
use crate::delivery::Delivery;

/// Default period between two reports.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// How long [`SessionManager::shutdown`] waits for in-flight ticks.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Handle to one running session.
#[derive(Debug)]
struct SessionHandle {
    /// Distinguishes this session from a later one for the same user.
    id: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

type SessionMap = HashMap<String, SessionHandle>;

/// Owns every running tracking session.
///
/// Cheap to clone; clones share the same map.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<Mutex<SessionMap>>,
    source: Arc<dyn ReportSource>,
    delivery: Arc<dyn Delivery>,
    interval: Duration,
    next_id: Arc<AtomicU64>,
}

impl SessionManager {
    /// Creates a manager with the default 10 second period.
    pub fn new(source: Arc<dyn ReportSource>, delivery: Arc<dyn Delivery>) -> Self {
        Self::with_interval(source, delivery, DEFAULT_INTERVAL)
    }

    /// Creates a manager with a custom period.
    pub fn with_interval(
        source: Arc<dyn ReportSource>,
        delivery: Arc<dyn Delivery>,
        interval: Duration,
    ) -> Self {
        debug!(interval_secs = interval.as_secs_f64(), "Creating session manager");
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            source,
            delivery,
            interval,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Period between two reports.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts tracking `user_id`.
    ///
    /// The first report is delivered one full period after this call.
    /// Returns `false` without touching the existing session if the user is
    /// already tracked.
    pub fn start(&self, user_id: &str) -> bool {
        let mut sessions = self.lock();

        if sessions.contains_key(user_id) {
            debug!(user_id = %user_id, "Session already running");
            return false;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let first_tick = Instant::now() + self.interval;
        let task = tokio::spawn(run_session(
            self.clone(),
            user_id.to_string(),
            id,
            first_tick,
            cancel.clone(),
        ));

        sessions.insert(user_id.to_string(), SessionHandle { id, cancel, task });

        info!(
            user_id = %user_id,
            interval_secs = self.interval.as_secs_f64(),
            active_sessions = sessions.len(),
            "Tracking started"
        );
        true
    }

    /// Stops tracking `user_id`.
    ///
    /// Returns `false` if the user had no session.
    pub fn stop(&self, user_id: &str) -> bool {
        let Some(handle) = self.lock().remove(user_id) else {
            debug!(user_id = %user_id, "No session to stop");
            return false;
        };

        handle.cancel.cancel();
        info!(user_id = %user_id, "Tracking stopped");
        true
    }

    /// Returns `true` if `user_id` has a running session.
    pub fn is_active(&self, user_id: &str) -> bool {
        self.lock().contains_key(user_id)
    }

    /// Number of running sessions.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// Cancels every session and waits for their tasks to finish.
    ///
    /// In-flight ticks get [`SHUTDOWN_GRACE`] to complete; tasks still
    /// running after that are aborted.
    pub async fn shutdown(&self) {
        let handles: Vec<(String, SessionHandle)> = self.lock().drain().collect();
        let count = handles.len();

        for (_, handle) in &handles {
            handle.cancel.cancel();
        }

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        for (user_id, mut handle) in handles {
            match timeout_at(deadline, &mut handle.task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(user_id = %user_id, error = %err, "Session task ended abnormally");
                }
                Err(_) => {
                    warn!(user_id = %user_id, "Session tick still running, aborting");
                    handle.task.abort();
                }
            }
        }

        info!(stopped = count, "All tracking sessions stopped");
    }

    /// Removes the entry for `user_id` only if it still belongs to session `id`.
    fn remove_if_current(&self, user_id: &str, id: u64) -> bool {
        let mut sessions = self.lock();
        match sessions.get(user_id) {
            Some(handle) if handle.id == id => {
                if let Some(handle) = sessions.remove(user_id) {
                    handle.cancel.cancel();
                }
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionMap> {
        // A poisoned map is still structurally valid.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("active_sessions", &self.active_count())
            .field("interval", &self.interval)
            .finish()
    }
}

/// Removes a session's map entry when its task ends, however it ends.
struct SessionEntry {
    manager: SessionManager,
    user_id: String,
    id: u64,
}

impl Drop for SessionEntry {
    fn drop(&mut self) {
        // Stop, shutdown and unreachable have already removed the entry.
        if self.manager.remove_if_current(&self.user_id, self.id) {
            error!(user_id = %self.user_id, "Session task ended unexpectedly, tracking ended");
        }
    }
}

/// Body of a session task.
async fn run_session(
    manager: SessionManager,
    user_id: String,
    id: u64,
    first_tick: Instant,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(first_tick, manager.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let entry = SessionEntry {
        manager,
        user_id,
        id,
    };
    let manager = &entry.manager;
    let user_id = entry.user_id.as_str();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let report = manager.source.produce_report().await;

        match manager.delivery.deliver(user_id, &report).await {
            Ok(()) => {
                debug!(
                    user_id = %user_id,
                    unavailable = report.is_unavailable(),
                    "Stock update delivered"
                );
            }
            Err(err) if err.is_unreachable() => {
                if manager.remove_if_current(user_id, id) {
                    warn!(user_id = %user_id, "User unreachable, tracking ended");
                }
                break;
            }
            Err(err) => {
                error!(user_id = %user_id, error = %err, "Failed to send update to user");
            }
        }
    }

    debug!(user_id = %user_id, session_id = id, "Session task finished");
}
