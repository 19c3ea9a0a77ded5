//! Pure domain logic for the commit-lineage backfill engine.
//!
//! No I/O lives here: SHA validation, commit-message trailer parsing,
//! byte-capped truncation, and identity redaction are all plain functions
//! so they can be exercised without a database or a git checkout.

pub mod redact;
pub mod sha;
pub mod text;
pub mod trailers;
pub mod types;
