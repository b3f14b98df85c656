//! Completed profiling sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::timing::{Timing, TimingIter, TimingRecord};

/// One complete profiling run, rooted at a single top-level [`Timing`].
///
/// Sessions are produced by the capture side and only read here. In JSON the
/// tree is stored flat, as pre-order `{depth, name, durationMs, ...}` records,
/// so nesting depth never reaches the parser's recursion limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    id: Uuid,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    started: DateTime<Utc>,
    root: Timing,
}

impl Session {
    /// Create a session with a fresh id, started now.
    #[must_use]
    pub fn new(name: impl Into<String>, root: Timing) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            user: None,
            started: Utc::now(),
            root,
        }
    }

    /// Replace the generated id.
    #[must_use]
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Attribute the session to a user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Replace the start time.
    #[must_use]
    pub fn with_started(mut self, started: DateTime<Utc>) -> Self {
        self.started = started;
        self
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning user, `None` for the anonymous scope.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    #[must_use]
    pub const fn started(&self) -> DateTime<Utc> {
        self.started
    }

    #[must_use]
    pub const fn root(&self) -> &Timing {
        &self.root
    }

    /// Pre-order walk over every timing in the session, with its depth.
    #[must_use]
    pub fn timings(&self) -> TimingIter<'_> {
        self.root.iter()
    }

    /// Total number of timings in the session.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON written by [`Session::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        let record: SessionRecord = serde_json::from_str(json)?;
        Ok(Self {
            id: record.id,
            name: record.name,
            user: record.user,
            started: record.started,
            root: Timing::from_records(record.root)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    id: Uuid,
    name: String,
    #[serde(default)]
    user: Option<String>,
    started: DateTime<Utc>,
    root: Vec<TimingRecord>,
}
