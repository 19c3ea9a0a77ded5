//! Batch commit-metadata retrieval with bisection recovery.
//!
//! The external batch command takes a repository path plus a list of
//! SHAs and writes one record per commit to stdout. Records are
//! separated by `;`, fields by `,`:
//!
//! ```text
//! sha,b64(author_name),b64(author_email),b64(committer_name),b64(committer_email),b64(message)
//! ```
//!
//! A single unreadable object must not discard the rest of the batch, so
//! a failing invocation is retried on each half of the SHA list and the
//! partial results merged. Recursion bottoms out at batches of one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;

use lineage_core::text::strip_nul;

use crate::error::GitError;
use crate::runner::{run_ok, CommandRunner};

/// Default batch-metadata command name.
pub const METADATA_SCRIPT: &str = "git_commits.sh";

const RECORD_FIELDS: usize = 6;

/// Commit metadata decoded from the batch command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub author_name: String,
    pub author_email: String,
    pub committer_name: String,
    pub committer_email: String,
    pub message: String,
}

/// Fetches author/committer metadata for sets of commits.
pub struct MetadataFetcher {
    runner: Arc<dyn CommandRunner>,
    script: String,
}

impl MetadataFetcher {
    /// `cmd_prefix` lets a checkout-local script directory be used
    /// instead of an installed command.
    pub fn new(runner: Arc<dyn CommandRunner>, cmd_prefix: &str) -> Self {
        Self {
            runner,
            script: format!("{cmd_prefix}{METADATA_SCRIPT}"),
        }
    }

    /// Fetch metadata for `shas`, salvaging partial results on failure.
    ///
    /// Returns whatever records could be decoded together with the first
    /// unrecovered error, if any. An empty SHA list yields an empty map.
    pub async fn batch(
        &self,
        repo_path: &str,
        shas: &[String],
    ) -> (HashMap<String, CommitInfo>, Option<GitError>) {
        self.batch_inner(repo_path, shas).await
    }

    fn batch_inner<'a>(
        &'a self,
        repo_path: &'a str,
        shas: &'a [String],
    ) -> Pin<Box<dyn Future<Output = (HashMap<String, CommitInfo>, Option<GitError>)> + Send + 'a>>
    {
        Box::pin(async move {
            let mut out = HashMap::with_capacity(shas.len());
            if shas.is_empty() {
                return (out, None);
            }

            let mut args = Vec::with_capacity(shas.len() + 1);
            args.push(repo_path.to_string());
            args.extend(shas.iter().cloned());

            match run_ok(self.runner.as_ref(), &self.script, &args).await {
                Ok(stdout) => {
                    let perr = parse_batch_output(&stdout, &mut out);
                    (out, perr.err())
                }
                Err(err) => {
                    if shas.len() == 1 {
                        return (out, Some(err));
                    }
                    tracing::debug!(
                        repo_path,
                        batch = shas.len(),
                        error = %err,
                        "metadata batch failed, bisecting"
                    );
                    let mid = shas.len() / 2;
                    let (left, left_err) = self.batch_inner(repo_path, &shas[..mid]).await;
                    let (right, right_err) = self.batch_inner(repo_path, &shas[mid..]).await;
                    out.extend(left);
                    out.extend(right);
                    (out, left_err.or(right_err))
                }
            }
        })
    }
}

/// Decode the batch command output into `into`.
///
/// Already-decoded records are kept even when a later record fails to
/// parse; the caller decides whether the error is fatal.
fn parse_batch_output(
    stdout: &str,
    into: &mut HashMap<String, CommitInfo>,
) -> Result<(), GitError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    for record in trimmed.split(';') {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }
        let fields: Vec<&str> = record.split(',').collect();
        if fields.len() != RECORD_FIELDS {
            return Err(GitError::Parse(format!(
                "expected {RECORD_FIELDS} fields, got {}: {record:?}",
                fields.len()
            )));
        }
        let sha = fields[0].trim();
        if sha.is_empty() {
            return Err(GitError::Parse(format!("empty sha in record {record:?}")));
        }

        let author_name = decode_field(fields[1], "author_name", sha)?;
        let author_email = decode_field(fields[2], "author_email", sha)?;
        let committer_name = decode_field(fields[3], "committer_name", sha)?;
        let committer_email = decode_field(fields[4], "committer_email", sha)?;
        let message = decode_field(fields[5], "message", sha)?;

        into.insert(
            sha.to_string(),
            CommitInfo {
                sha: sha.to_string(),
                author_name,
                author_email,
                committer_name,
                committer_email,
                message,
            },
        );
    }
    Ok(())
}

fn decode_field(raw: &str, field: &'static str, sha: &str) -> Result<String, GitError> {
    let bytes = B64.decode(raw.trim()).map_err(|source| GitError::Decode {
        field,
        sha: sha.to_string(),
        source,
    })?;
    Ok(strip_nul(&String::from_utf8_lossy(&bytes)))
}
