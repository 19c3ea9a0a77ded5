//! Commit range resolution for push events.
//!
//! Given the `(before, head)` pair from a push payload, produce the
//! ordered (oldest-to-newest) list of commit SHAs the push introduced.
//! The external ranged-listing command emits one SHA per line,
//! newest-first, so paging with `--skip`/`--max-count` stays stable; the
//! accumulated list is reversed before being returned.
//!
//! Two policies exist. Strict (the default) requires both SHAs to be
//! real 40-hex identifiers and never falls back to guessing. Legacy
//! preserves the historical best-effort behaviour: any non-zero head is
//! attempted, and for events whose `before` is missing or zero the
//! declared payload size caps how many commits are taken from `head`,
//! with known-capped sizes distrusted down to head-only.

use std::fmt;
use std::sync::Arc;

use lineage_core::sha::{is_usable_sha, is_zero_sha, normalize_sha, ZERO_SHA};

use crate::error::GitError;
use crate::runner::{run_ok, CommandRunner};

/// Default ranged-listing command name.
pub const RANGE_SCRIPT: &str = "git_commits_range.sh";

/// Declared payload sizes that indicate a truncated commit list rather
/// than a real count. The platform embeds at most 20 commits in a push
/// payload; 1024 shows up in archived payloads as a truncation artifact.
const CAPPED_PAYLOAD_SIZES: [i64; 2] = [20, 1024];

/// Refspec used for the recovery fetch when a range listing fails:
/// commits reachable only through pull-request merge refs are pulled
/// into the local clone before the single retry.
const PR_REFSPEC: &str = "+refs/pull/*/head:refs/remotes/origin/pr/*";

/// Validation policy for `(before, head)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePolicy {
    /// Both SHAs must be valid and non-zero; no fallbacks.
    Strict,
    /// Best-effort compatibility shim for events with a zero/garbled
    /// `before`, capped by the declared payload size.
    Legacy,
}

/// Why an event was excluded from this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InvalidHead,
    InvalidBefore,
    NoOpPush,
    NonFastForward,
    ListingFailed,
    NonPositiveSize,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::InvalidHead => "empty or invalid head SHA",
            SkipReason::InvalidBefore => "empty or invalid before SHA",
            SkipReason::NoOpPush => "no-op push (before == head)",
            SkipReason::NonFastForward => "before is not an ancestor of head",
            SkipReason::ListingFailed => "range listing failed after recovery attempt",
            SkipReason::NonPositiveSize => "non-positive payload size with zero before SHA",
        };
        f.write_str(s)
    }
}

/// Result of resolving one push event's range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Oldest-to-newest commit SHAs introduced by the push.
    Commits(Vec<String>),
    /// The event stays eligible for a future run.
    Skipped(SkipReason),
}

/// Resolves `(before, head)` pairs to ordered commit lists.
pub struct RangeResolver {
    runner: Arc<dyn CommandRunner>,
    script: String,
    page_size: usize,
    policy: RangePolicy,
    require_fast_forward: bool,
}

impl RangeResolver {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        cmd_prefix: &str,
        page_size: usize,
        policy: RangePolicy,
        require_fast_forward: bool,
    ) -> Self {
        Self {
            runner,
            script: format!("{cmd_prefix}{RANGE_SCRIPT}"),
            page_size: page_size.max(1),
            policy,
            require_fast_forward,
        }
    }

    /// Resolve the commits introduced by one push.
    ///
    /// `declared_size` is the payload's commit count, used only by the
    /// legacy policy to cap the scan when `before` is the zero sentinel.
    ///
    /// Strict demands a valid non-zero 40-hex head; legacy only refuses
    /// empty/all-zero heads and hands anything else to the listing
    /// command as-is.
    pub async fn resolve(
        &self,
        repo_path: &str,
        before_raw: &str,
        head_raw: &str,
        declared_size: Option<i64>,
    ) -> RangeOutcome {
        let head = normalize_sha(head_raw);
        match self.policy {
            RangePolicy::Strict => {
                if !is_usable_sha(&head) {
                    return RangeOutcome::Skipped(SkipReason::InvalidHead);
                }
                self.resolve_strict(repo_path, before_raw, &head).await
            }
            RangePolicy::Legacy => {
                if is_zero_sha(&head) {
                    return RangeOutcome::Skipped(SkipReason::InvalidHead);
                }
                self.resolve_legacy(repo_path, before_raw, &head, declared_size)
                    .await
            }
        }
    }

    async fn resolve_strict(&self, repo_path: &str, before_raw: &str, head: &str) -> RangeOutcome {
        let before = normalize_sha(before_raw);
        if !is_usable_sha(&before) {
            return RangeOutcome::Skipped(SkipReason::InvalidBefore);
        }
        if before == head {
            return RangeOutcome::Skipped(SkipReason::NoOpPush);
        }
        if self.require_fast_forward && !self.is_ancestor(repo_path, &before, head).await {
            return RangeOutcome::Skipped(SkipReason::NonFastForward);
        }

        match self.list_range(repo_path, &before, head, 0).await {
            Ok(shas) => RangeOutcome::Commits(shas),
            Err(err) => {
                tracing::warn!(
                    repo_path,
                    before,
                    head,
                    error = %err,
                    "range listing failed, fetching PR refs and retrying"
                );
                self.fetch_pr_refs(repo_path).await;
                match self.list_range(repo_path, &before, head, 0).await {
                    Ok(shas) => RangeOutcome::Commits(shas),
                    Err(err) => {
                        tracing::warn!(repo_path, before, head, error = %err, "range listing retry failed");
                        RangeOutcome::Skipped(SkipReason::ListingFailed)
                    }
                }
            }
        }
    }

    async fn resolve_legacy(
        &self,
        repo_path: &str,
        before_raw: &str,
        head: &str,
        declared_size: Option<i64>,
    ) -> RangeOutcome {
        let before = normalize_sha(before_raw);
        let (before, max_needed) = if is_usable_sha(&before) {
            if before == head {
                return RangeOutcome::Skipped(SkipReason::NoOpPush);
            }
            (before, 0)
        } else {
            // BEFORE=0 is ambiguous: take the newest <size> commits
            // reachable from head, distrusting capped sizes.
            match declared_size {
                Some(size) if size <= 0 => {
                    return RangeOutcome::Skipped(SkipReason::NonPositiveSize)
                }
                Some(size) if CAPPED_PAYLOAD_SIZES.contains(&size) => (ZERO_SHA.to_string(), 1),
                Some(size) => (ZERO_SHA.to_string(), size as usize),
                None => (ZERO_SHA.to_string(), 1),
            }
        };

        match self.list_range(repo_path, &before, head, max_needed).await {
            Ok(shas) => RangeOutcome::Commits(shas),
            Err(err) => {
                tracing::warn!(
                    repo_path,
                    before,
                    head,
                    error = %err,
                    "range listing failed, falling back to head only"
                );
                RangeOutcome::Commits(vec![head.to_string()])
            }
        }
    }

    /// Page through the listing command until a short page or `max_needed`.
    ///
    /// `max_needed == 0` means no cap. The result is reversed to
    /// oldest-to-newest.
    async fn list_range(
        &self,
        repo_path: &str,
        before: &str,
        head: &str,
        max_needed: usize,
    ) -> Result<Vec<String>, GitError> {
        let limit = self.page_size;
        let mut all: Vec<String> = Vec::new();
        let mut skip = 0usize;

        loop {
            let args = vec![
                repo_path.to_string(),
                before.to_string(),
                head.to_string(),
                skip.to_string(),
                limit.to_string(),
            ];
            let stdout = run_ok(self.runner.as_ref(), &self.script, &args).await?;

            let mut page: Vec<String> = stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            let page_len = page.len();

            if max_needed > 0 {
                let remaining = max_needed - all.len();
                if page.len() > remaining {
                    page.truncate(remaining);
                }
            }
            if page.is_empty() {
                break;
            }
            all.extend(page);

            if max_needed > 0 && all.len() >= max_needed {
                break;
            }
            if page_len < limit {
                break;
            }
            skip += limit;
        }

        all.reverse();
        Ok(all)
    }

    /// True iff `before` is an ancestor of `head` in the local clone.
    ///
    /// Exit code 1 from `merge-base --is-ancestor` means "not an
    /// ancestor"; anything else unexpected is logged and treated the
    /// same, which only makes the check more conservative.
    async fn is_ancestor(&self, repo_path: &str, before: &str, head: &str) -> bool {
        let args = vec![
            "-C".to_string(),
            repo_path.to_string(),
            "merge-base".to_string(),
            "--is-ancestor".to_string(),
            before.to_string(),
            head.to_string(),
        ];
        match self.runner.run("git", &args).await {
            Ok(out) if out.success() => true,
            Ok(out) => {
                if out.exit_code != Some(1) {
                    tracing::warn!(
                        repo_path,
                        before,
                        head,
                        exit_code = ?out.exit_code,
                        stderr = %out.stderr,
                        "merge-base --is-ancestor failed unexpectedly"
                    );
                }
                false
            }
            Err(err) => {
                tracing::warn!(repo_path, before, head, error = %err, "could not run merge-base");
                false
            }
        }
    }

    /// Best-effort fetch of pull-request refs before a listing retry.
    async fn fetch_pr_refs(&self, repo_path: &str) {
        let args = vec![
            "-C".to_string(),
            repo_path.to_string(),
            "fetch".to_string(),
            "origin".to_string(),
            PR_REFSPEC.to_string(),
        ];
        match self.runner.run("git", &args).await {
            Ok(out) if out.success() => {}
            Ok(out) => {
                tracing::warn!(repo_path, stderr = %out.stderr, "PR ref fetch failed");
            }
            Err(err) => {
                tracing::warn!(repo_path, error = %err, "could not run PR ref fetch");
            }
        }
    }
}
