use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use thiserror::Error;

use innkeep_core::{NotificationId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadStateError {
    #[error("read-state store unavailable: {0}")]
    Unavailable(String),
}

/// Persists which notifications a user has read.
pub trait ReadStateStore: Send + Sync {
    fn mark_read(&self, user_id: UserId, ids: &[NotificationId]) -> Result<(), ReadStateError>;

    fn is_read(&self, user_id: UserId, id: NotificationId) -> Result<bool, ReadStateError>;
}

#[derive(Debug, Default)]
pub struct InMemoryReadStateStore {
    read: RwLock<HashMap<UserId, HashSet<NotificationId>>>,
}

impl InMemoryReadStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadStateStore for InMemoryReadStateStore {
    fn mark_read(&self, user_id: UserId, ids: &[NotificationId]) -> Result<(), ReadStateError> {
        let mut guard = self
            .read
            .write()
            .map_err(|_| ReadStateError::Unavailable("lock poisoned".to_string()))?;
        guard.entry(user_id).or_default().extend(ids.iter().copied());
        Ok(())
    }

    fn is_read(&self, user_id: UserId, id: NotificationId) -> Result<bool, ReadStateError> {
        let guard = self
            .read
            .read()
            .map_err(|_| ReadStateError::Unavailable("lock poisoned".to_string()))?;
        Ok(guard.get(&user_id).is_some_and(|set| set.contains(&id)))
    }
}
