//! PostgreSQL layer: event-store models, repositories, and the cached
//! identity resolver.
//!
//! The schema is the GitHub-archive event store this engine backfills:
//! `gha_events`/`gha_payloads` (read-only inputs), `gha_commits` and
//! `gha_commits_roles` (outputs), and the `gha_actors*` directory used
//! for identity resolution. Column spellings follow that schema,
//! including the historical `befor` column name.

pub mod identity;
pub mod models;
pub mod repositories;
