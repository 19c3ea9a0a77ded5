//! External git command boundary.
//!
//! All interaction with local clones goes through three black-box
//! commands: a batch commit-metadata script, a paged ranged-listing
//! script, and plain `git` for ancestry checks and the pull-request ref
//! fetch used as a recovery step. The [`runner::CommandRunner`] trait
//! keeps that boundary narrow so the resolver and fetcher logic can be
//! tested against scripted output instead of real processes.

pub mod error;
pub mod metadata;
pub mod range;
pub mod runner;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::GitError;
pub use metadata::{CommitInfo, MetadataFetcher};
pub use range::{RangeOutcome, RangePolicy, RangeResolver, SkipReason};
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
