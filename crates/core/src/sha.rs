//! Commit identifier validation.
//!
//! Push event payloads carry `before`/`head` as raw strings; nothing
//! upstream guarantees they are real SHAs. The all-zero value is the
//! platform's "no prior reference" sentinel and is never a real commit.

/// Length of a full hex commit identifier.
pub const SHA_LEN: usize = 40;

/// The "no prior reference" sentinel (branch or tag creation).
pub const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

/// True for empty strings and all-zero values (any length).
pub fn is_zero_sha(sha: &str) -> bool {
    let sha = sha.trim();
    sha.is_empty() || sha.chars().all(|c| c == '0')
}

/// True iff `sha` is a syntactically valid 40-hex commit identifier.
///
/// The zero sentinel passes this check; use [`is_usable_sha`] when the
/// sentinel must be rejected too.
pub fn is_valid_sha(sha: &str) -> bool {
    sha.len() == SHA_LEN && sha.bytes().all(|b| b.is_ascii_hexdigit())
}

/// True iff `sha` is a valid 40-hex identifier and not the zero sentinel.
pub fn is_usable_sha(sha: &str) -> bool {
    is_valid_sha(sha) && !is_zero_sha(sha)
}

/// Trim and lowercase a raw commit identifier from an event payload.
pub fn normalize_sha(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
