//! Backfill orchestration: drives the commit-lineage reconstruction
//! pipeline per repository, fans repositories out across a bounded
//! worker pool within each database, and processes databases
//! sequentially in deterministic order.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod repo;

pub use config::{BackfillConfig, BackfillMode};
pub use error::BackfillError;
pub use orchestrator::{Backfiller, Totals};
pub use repo::RepoOutcome;
