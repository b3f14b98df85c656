//! In-memory session storage.

use std::collections::{HashMap, VecDeque};

use chrono::{Duration, Utc};
use parking_lot::Mutex;
use tracelens_core::{Error, Result, Session};
use uuid::Uuid;

use crate::collaborators::SessionStorage;

/// Bounds on what a [`MemoryStorage`] retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageLimits {
    /// Most sessions kept at once; the earliest saved are evicted first.
    pub capacity: usize,
    /// Sessions that started longer ago than this are evicted.
    pub max_age: Duration,
}

impl Default for StorageLimits {
    fn default() -> Self {
        Self {
            capacity: 1_000,
            max_age: Duration::hours(1),
        }
    }
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<Uuid, Session>,
    /// Stored ids in save order.
    saved: VecDeque<Uuid>,
    /// Unviewed ids per user scope, oldest first.
    unviewed: HashMap<Option<String>, Vec<Uuid>>,
}

impl Inner {
    fn evict(&mut self, id: Uuid) {
        self.sessions.remove(&id);
        self.saved.retain(|saved| *saved != id);
        self.unviewed.retain(|_, ids| {
            ids.retain(|unviewed| *unviewed != id);
            !ids.is_empty()
        });
        tracing::trace!(%id, "Evicted profiling session");
    }

    fn enforce(&mut self, limits: StorageLimits) {
        if let Some(cutoff) = Utc::now().checked_sub_signed(limits.max_age) {
            let expired: Vec<Uuid> = self
                .sessions
                .values()
                .filter(|session| session.started() < cutoff)
                .map(Session::id)
                .collect();
            for id in expired {
                self.evict(id);
            }
        }

        while self.sessions.len() > limits.capacity {
            let Some(&oldest) = self.saved.front() else {
                break;
            };
            self.evict(oldest);
        }
    }
}

/// Keeps sessions and per-user unviewed ids in process memory.
///
/// A single lock guards both maps, so saving, reading and marking ids as
/// viewed never interleave for the same user. Every save enforces the
/// store's [`StorageLimits`]; an evicted session also leaves every unviewed
/// list.
#[derive(Default)]
pub struct MemoryStorage {
    limits: StorageLimits,
    inner: Mutex<Inner>,
}

impl MemoryStorage {
    /// Create an empty store with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store bounded by `limits`.
    #[must_use]
    pub fn with_limits(limits: StorageLimits) -> Self {
        Self {
            limits,
            inner: Mutex::default(),
        }
    }

    #[must_use]
    pub const fn limits(&self) -> StorageLimits {
        self.limits
    }

    /// Store a session and mark it unviewed for its user.
    pub fn save(&self, session: Session) {
        let id = session.id();
        let user = session.user().map(str::to_owned);

        let mut inner = self.inner.lock();
        if inner.sessions.insert(id, session).is_none() {
            inner.saved.push_back(id);
        }
        let ids = inner.unviewed.entry(user).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
        tracing::trace!(%id, "Saved profiling session");
        inner.enforce(self.limits);
    }

    /// Load a stored session.
    pub fn load(&self, id: Uuid) -> Result<Session> {
        self.inner
            .lock()
            .sessions
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }

    /// Remove `id` from the user's unviewed list.
    pub fn set_viewed(&self, user: Option<&str>, id: Uuid) {
        let key = user.map(str::to_owned);
        let mut inner = self.inner.lock();
        if let Some(ids) = inner.unviewed.get_mut(&key) {
            ids.retain(|unviewed| *unviewed != id);
            if ids.is_empty() {
                inner.unviewed.remove(&key);
            }
        }
    }

    /// Put a stored session back on the user's unviewed list.
    ///
    /// Ids that are not (or no longer) stored are ignored.
    pub fn set_unviewed(&self, user: Option<&str>, id: Uuid) {
        let mut inner = self.inner.lock();
        if !inner.sessions.contains_key(&id) {
            tracing::trace!(%id, "Ignoring unviewed mark for unknown session");
            return;
        }
        let ids = inner.unviewed.entry(user.map(str::to_owned)).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStorage for MemoryStorage {
    fn unviewed_ids(&self, user: Option<&str>) -> Result<Vec<Uuid>> {
        let key = user.map(str::to_owned);
        Ok(self
            .inner
            .lock()
            .unviewed
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}
