//! Registered-user store.
//!
//! Only registered users may start tracking. Registration is permanent (there
//! is no unregister) and idempotent: registering twice reports
//! [`RegisterOutcome::AlreadyRegistered`] and touches nothing.
//!
//! # Durability
//!
//! [`JsonFileUserStore`] keeps the set in memory and rewrites the whole file
//! after every insertion. A failed write is logged and the in-memory insert
//! stays, so memory and disk may disagree until the next successful write.
//! A missing or unreadable file at startup yields an empty store.
//!
//! # File Format
//!
//! A pretty-printed JSON array of user ID strings in registration order:
//!
//! ```json
//! [
//!   "123456789012345678",
//!   "876543210987654321"
//! ]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The user was already in the set; nothing changed.
    AlreadyRegistered,
    /// The user was added.
    Registered,
}

/// Storage for the set of registered user IDs.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns `true` if the user has registered.
    async fn is_registered(&self, user_id: &str) -> bool;

    /// Registers a user, persisting the change before returning.
    async fn register(&self, user_id: &str) -> RegisterOutcome;

    /// Number of registered users.
    async fn len(&self) -> usize;

    /// Returns `true` if nobody has registered yet.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Insertion-ordered set of user IDs.
#[derive(Debug, Default)]
struct UserSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl UserSet {
    fn from_ids(ids: Vec<String>) -> Self {
        let mut set = Self::default();
        for id in ids {
            set.insert(&id);
        }
        set
    }

    fn contains(&self, user_id: &str) -> bool {
        self.members.contains(user_id)
    }

    /// Returns `false` if the ID was already present.
    fn insert(&mut self, user_id: &str) -> bool {
        if !self.members.insert(user_id.to_string()) {
            return false;
        }
        self.order.push(user_id.to_string());
        true
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Registered users kept in a JSON file.
#[derive(Debug)]
pub struct JsonFileUserStore {
    path: PathBuf,

    /// Held across the file write so rewrites land in insertion order.
    users: RwLock<UserSet>,
}

impl JsonFileUserStore {
    /// Loads the store from `path`.
    ///
    /// Never fails: a missing file starts an empty store, and an unreadable or
    /// malformed file is logged and also starts an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let users = match read_user_ids(&path).await {
            Ok(Some(ids)) => {
                let set = UserSet::from_ids(ids);
                info!(path = %path.display(), count = set.len(), "Loaded registered users");
                set
            }
            Ok(None) => {
                debug!(path = %path.display(), "No registered users file, starting empty");
                UserSet::default()
            }
            Err(err) => {
                error!(
                    path = %path.display(),
                    error = %err,
                    "Error loading registered users, starting empty"
                );
                UserSet::default()
            }
        };

        Self {
            path,
            users: RwLock::new(users),
        }
    }
}

#[async_trait]
impl UserStore for JsonFileUserStore {
    async fn is_registered(&self, user_id: &str) -> bool {
        self.users.read().await.contains(user_id)
    }

    async fn register(&self, user_id: &str) -> RegisterOutcome {
        let mut users = self.users.write().await;

        if !users.insert(user_id) {
            return RegisterOutcome::AlreadyRegistered;
        }

        if let Err(err) = write_user_ids(&self.path, &users.order).await {
            warn!(
                path = %self.path.display(),
                user_id = %user_id,
                error = %err,
                "Error saving registered users; keeping registration in memory"
            );
        } else {
            info!(user_id = %user_id, total = users.len(), "User registered");
        }

        RegisterOutcome::Registered
    }

    async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

/// Registered users kept only in memory.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<UserSet>,
}

impl MemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn is_registered(&self, user_id: &str) -> bool {
        self.users.read().await.contains(user_id)
    }

    async fn register(&self, user_id: &str) -> RegisterOutcome {
        if self.users.write().await.insert(user_id) {
            RegisterOutcome::Registered
        } else {
            RegisterOutcome::AlreadyRegistered
        }
    }

    async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

/// Reads the persisted IDs, or `None` if the file does not exist.
async fn read_user_ids(path: &Path) -> Result<Option<Vec<String>>, StoreError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    Ok(Some(serde_json::from_str(&contents)?))
}

/// Overwrites the file with the full list of IDs.
async fn write_user_ids(path: &Path, ids: &[String]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(ids)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
