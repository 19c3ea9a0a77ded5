//! Reconstructed commit and role rows to persist.

use lineage_core::types::{DbId, Timestamp};

/// A `gha_commits` row to insert. All text fields are post-redaction
/// and byte-capped; `is_distinct` is computed at insert time in SQL.
#[derive(Debug, Clone)]
pub struct NewCommit {
    pub sha: String,
    pub event_id: DbId,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub actor_id: DbId,
    pub actor_login: String,
    pub repo_id: DbId,
    pub repo_name: String,
    pub created_at: Timestamp,
    /// Resolved author actor id; 0 when unknown.
    pub author_id: DbId,
    /// Resolved committer actor id; 0 when unknown.
    pub committer_id: DbId,
    pub author_login: String,
    pub committer_login: String,
    pub committer_name: String,
    pub committer_email: String,
}

/// A `gha_commits_roles` row to insert. The role columns default to 0
/// and empty strings rather than NULL.
#[derive(Debug, Clone)]
pub struct NewCommitRole {
    pub sha: String,
    pub event_id: DbId,
    pub role: String,
    pub actor_id: DbId,
    pub actor_login: String,
    pub actor_name: String,
    pub actor_email: String,
    pub repo_id: DbId,
    pub repo_name: String,
    pub created_at: Timestamp,
}
