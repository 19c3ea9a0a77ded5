//! Push-event rows selected for backfilling.

use sqlx::FromRow;

use lineage_core::types::{DbId, Timestamp};

/// One push event joined with its payload and the count of commit rows
/// already recorded for it. Read-only input; never mutated.
#[derive(Debug, Clone, FromRow)]
pub struct PushEvent {
    pub event_id: DbId,
    pub actor_id: DbId,
    pub actor_login: String,
    pub repo_id: DbId,
    pub repo_name: String,
    pub created_at: Timestamp,
    /// Payload head SHA; raw and unvalidated.
    pub head: Option<String>,
    /// Payload before SHA; raw and unvalidated.
    pub before: Option<String>,
    /// Declared commit count from the payload, when present.
    pub size: Option<i64>,
    /// Commit rows already recorded for this event.
    pub recorded_commits: i64,
}

impl PushEvent {
    pub fn head_str(&self) -> &str {
        self.head.as_deref().unwrap_or("")
    }

    pub fn before_str(&self) -> &str {
        self.before.as_deref().unwrap_or("")
    }
}
