//! The per-repository backfill pipeline.
//!
//! Verify the local clone, select under-recorded push events, resolve
//! each event's commit range against git, fetch metadata for the union
//! of needed SHAs, then persist everything for the repository inside a
//! single transaction. Any insert error rolls the whole repository
//! back; it can be re-run later with identical results thanks to the
//! idempotent inserts.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use sqlx::PgPool;

use lineage_core::redact::Redactor;
use lineage_core::sha::is_usable_sha;
use lineage_core::text::trunc_to_bytes;
use lineage_core::trailers::parse_trailers;
use lineage_core::types::DbId;
use lineage_db::identity::{resolve_actor, ActorCache, ActorRef};
use lineage_db::models::{NewCommit, NewCommitRole, PushEvent};
use lineage_db::repositories::{CommitRepo, PayloadRepo, PushEventRepo};
use lineage_git::{CommandRunner, CommitInfo, MetadataFetcher, RangeOutcome, RangePolicy, RangeResolver};

use crate::config::{BackfillConfig, BackfillMode};
use crate::error::BackfillError;

// Destination column byte budgets.
const COMMIT_NAME_MAX: usize = 120;
const EMAIL_MAX: usize = 160;
const ROLE_NAME_MAX: usize = 160;
const ROLE_MAX: usize = 60;
const LOGIN_MAX: usize = 120;
const MESSAGE_MAX: usize = 0xffff;

/// Per-repository result counters.
#[derive(Debug, Clone)]
pub struct RepoOutcome {
    pub repo: String,
    pub events: usize,
    pub skipped_events: usize,
    pub commits: u64,
    pub roles: u64,
}

impl RepoOutcome {
    fn empty(repo: &str) -> Self {
        Self {
            repo: repo.to_string(),
            events: 0,
            skipped_events: 0,
            commits: 0,
            roles: 0,
        }
    }
}

/// Reconstruct and persist commit lineage for one repository.
pub(crate) async fn backfill_repo(
    pool: &PgPool,
    cfg: &BackfillConfig,
    runner: &Arc<dyn CommandRunner>,
    redactor: &Redactor,
    cache: &ActorCache,
    repo: &str,
) -> Result<RepoOutcome, BackfillError> {
    let repo_path = format!("{}{}", cfg.repos_dir, repo);

    // The repository was explicitly requested for tracking; a missing
    // clone is an operator problem, never "nothing to do".
    match tokio::fs::metadata(&repo_path).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(BackfillError::CloneMissing { path: repo_path });
        }
        Err(source) => {
            return Err(BackfillError::CloneUnreadable {
                path: repo_path,
                source,
            });
        }
    }

    // In missing-only mode the scan can start at the newest commit
    // already recorded for this repository.
    let mut since = cfg.default_start_date;
    if cfg.mode == BackfillMode::MissingOnly {
        if let Some(last) = CommitRepo::last_recorded_at(pool, repo).await? {
            if last > since {
                since = last;
            }
        }
    }

    let events =
        PushEventRepo::needing_commits(pool, repo, since, cfg.mode.as_param()).await?;
    if events.is_empty() {
        tracing::info!(repo, %since, "no commits need backfilling");
        return Ok(RepoOutcome::empty(repo));
    }
    tracing::info!(repo, events = events.len(), %since, "backfilling push events");

    let policy = if cfg.legacy_ranges {
        RangePolicy::Legacy
    } else {
        RangePolicy::Strict
    };
    let resolver = RangeResolver::new(
        runner.clone(),
        &cfg.cmd_prefix,
        cfg.git_batch,
        policy,
        cfg.require_fast_forward,
    );

    // Event -> ordered SHAs, plus the union of all SHAs we need
    // metadata for. BTreeSet keeps the union deterministic.
    let mut event_shas: HashMap<DbId, Vec<String>> = HashMap::new();
    let mut sha_set: BTreeSet<String> = BTreeSet::new();
    let mut skipped_events = 0usize;

    for ev in &events {
        let outcome = resolver
            .resolve(&repo_path, ev.before_str(), ev.head_str(), ev.size)
            .await;
        match outcome {
            RangeOutcome::Skipped(reason) => {
                tracing::warn!(repo, event_id = ev.event_id, %reason, "skipping push event");
                skipped_events += 1;
            }
            RangeOutcome::Commits(shas) => {
                let shas: Vec<String> =
                    shas.into_iter().filter(|s| is_usable_sha(s)).collect();
                if shas.is_empty() {
                    tracing::debug!(repo, event_id = ev.event_id, "push introduced no commits");
                    continue;
                }
                sha_set.extend(shas.iter().cloned());
                event_shas.insert(ev.event_id, shas);
            }
        }
    }

    if event_shas.is_empty() {
        tracing::info!(
            repo,
            events = events.len(),
            skipped_events,
            "no commits to backfill after range resolution"
        );
        let mut outcome = RepoOutcome::empty(repo);
        outcome.events = events.len();
        outcome.skipped_events = skipped_events;
        return Ok(outcome);
    }

    // Metadata for the SHA union, in page-sized slices. A failing slice
    // only costs the records bisection could not salvage.
    let sha_list: Vec<String> = sha_set.into_iter().collect();
    let fetcher = MetadataFetcher::new(runner.clone(), &cfg.cmd_prefix);
    let mut info_map: HashMap<String, CommitInfo> = HashMap::with_capacity(sha_list.len());
    for slice in sha_list.chunks(cfg.git_batch) {
        let (batch, err) = fetcher.batch(&repo_path, slice).await;
        info_map.extend(batch);
        if let Some(err) = err {
            tracing::warn!(repo, slice = slice.len(), error = %err, "partial metadata slice");
        }
    }
    if info_map.is_empty() {
        return Err(BackfillError::NoMetadata {
            repo: repo.to_string(),
            shas: sha_list.len(),
        });
    }
    tracing::debug!(
        repo,
        needed = sha_list.len(),
        resolved = info_map.len(),
        "fetched commit metadata"
    );

    // One transaction per repository: either all of its reconstructed
    // rows land, or none do.
    let mut tx = pool.begin().await?;
    let mut n_commits = 0u64;
    let mut n_roles = 0u64;

    for ev in &events {
        let Some(shas) = event_shas.get(&ev.event_id) else {
            continue;
        };

        PayloadRepo::refresh_size(tx.as_mut(), ev.event_id, shas.len() as i64).await?;
        if let Some(size) = ev.size {
            if size != shas.len() as i64 {
                tracing::info!(
                    repo,
                    event_id = ev.event_id,
                    declared = size,
                    reconstructed = shas.len(),
                    "payload size disagrees with reconstructed commit count"
                );
            }
        }

        for sha in shas {
            let Some(ci) = info_map.get(sha) else {
                tracing::warn!(repo, event_id = ev.event_id, sha, "missing git metadata");
                continue;
            };

            let author = resolve_actor(
                tx.as_mut(),
                cache,
                redactor,
                &ci.author_name,
                &ci.author_email,
            )
            .await;
            let committer = resolve_actor(
                tx.as_mut(),
                cache,
                redactor,
                &ci.committer_name,
                &ci.committer_email,
            )
            .await;
            if author.is_unknown() {
                tracing::debug!(repo, sha, name = %ci.author_name, "author actor not found");
            }
            if committer.is_unknown() {
                tracing::debug!(repo, sha, name = %ci.committer_name, "committer actor not found");
            }

            let commit = build_commit(ev, sha, ci, &author, &committer, redactor);
            CommitRepo::insert(tx.as_mut(), &commit).await?;
            n_commits += 1;

            if cfg.author_role {
                let row = role_row(
                    ev,
                    sha,
                    "Author",
                    &author,
                    &ci.author_name,
                    &ci.author_email,
                    redactor,
                );
                CommitRepo::insert_role(tx.as_mut(), &row).await?;
                n_roles += 1;
            }
            if cfg.committer_role {
                let row = role_row(
                    ev,
                    sha,
                    "Committer",
                    &committer,
                    &ci.committer_name,
                    &ci.committer_email,
                    redactor,
                );
                CommitRepo::insert_role(tx.as_mut(), &row).await?;
                n_roles += 1;
            }

            for trailer in parse_trailers(&ci.message) {
                let actor =
                    resolve_actor(tx.as_mut(), cache, redactor, &trailer.name, &trailer.email)
                        .await;
                let row = role_row(
                    ev,
                    sha,
                    trailer.role,
                    &actor,
                    &trailer.name,
                    &trailer.email,
                    redactor,
                );
                CommitRepo::insert_role(tx.as_mut(), &row).await?;
                n_roles += 1;
            }
        }
    }

    tx.commit().await?;
    tracing::info!(
        repo,
        commits = n_commits,
        roles = n_roles,
        events = events.len(),
        skipped_events,
        "backfill complete"
    );

    Ok(RepoOutcome {
        repo: repo.to_string(),
        events: events.len(),
        skipped_events,
        commits: n_commits,
        roles: n_roles,
    })
}

fn build_commit(
    ev: &PushEvent,
    sha: &str,
    ci: &CommitInfo,
    author: &ActorRef,
    committer: &ActorRef,
    redactor: &Redactor,
) -> NewCommit {
    NewCommit {
        sha: sha.to_string(),
        event_id: ev.event_id,
        author_name: trunc_to_bytes(redactor.apply(&ci.author_name), COMMIT_NAME_MAX).to_string(),
        author_email: trunc_to_bytes(redactor.apply(&ci.author_email), EMAIL_MAX).to_string(),
        message: trunc_to_bytes(&ci.message, MESSAGE_MAX).to_string(),
        actor_id: ev.actor_id,
        actor_login: trunc_to_bytes(redactor.apply(&ev.actor_login), LOGIN_MAX).to_string(),
        repo_id: ev.repo_id,
        repo_name: ev.repo_name.clone(),
        created_at: ev.created_at,
        author_id: author.id,
        committer_id: committer.id,
        author_login: resolved_login(author, redactor),
        committer_login: resolved_login(committer, redactor),
        committer_name: trunc_to_bytes(redactor.apply(&ci.committer_name), ROLE_NAME_MAX)
            .to_string(),
        committer_email: trunc_to_bytes(redactor.apply(&ci.committer_email), EMAIL_MAX).to_string(),
    }
}

fn role_row(
    ev: &PushEvent,
    sha: &str,
    role: &str,
    actor: &ActorRef,
    name: &str,
    email: &str,
    redactor: &Redactor,
) -> NewCommitRole {
    NewCommitRole {
        sha: sha.to_string(),
        event_id: ev.event_id,
        role: trunc_to_bytes(role, ROLE_MAX).to_string(),
        actor_id: actor.id.max(0),
        actor_login: resolved_login(actor, redactor),
        actor_name: trunc_to_bytes(redactor.apply(name), ROLE_NAME_MAX).to_string(),
        actor_email: trunc_to_bytes(redactor.apply(email), EMAIL_MAX).to_string(),
        repo_id: ev.repo_id,
        repo_name: ev.repo_name.clone(),
        created_at: ev.created_at,
    }
}

fn resolved_login(actor: &ActorRef, redactor: &Redactor) -> String {
    if actor.login.is_empty() {
        String::new()
    } else {
        trunc_to_bytes(redactor.apply(&actor.login), LOGIN_MAX).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event() -> PushEvent {
        PushEvent {
            event_id: 7,
            actor_id: 11,
            actor_login: "pusher".to_string(),
            repo_id: 13,
            repo_name: "org/repo".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            head: Some("a".repeat(40)),
            before: Some("b".repeat(40)),
            size: Some(1),
            recorded_commits: 0,
        }
    }

    fn info() -> CommitInfo {
        CommitInfo {
            sha: "c".repeat(40),
            author_name: "Jane Doe".to_string(),
            author_email: "jane@example.com".to_string(),
            committer_name: "CI Bot".to_string(),
            committer_email: "bot@example.com".to_string(),
            message: "m".repeat(80_000),
        }
    }

    #[test]
    fn commit_row_caps_and_copies_fields() {
        let ev = event();
        let ci = info();
        let author = ActorRef {
            id: 42,
            login: "jane".to_string(),
        };
        let committer = ActorRef::unknown();
        let redactor = Redactor::empty();

        let c = build_commit(&ev, &ci.sha, &ci, &author, &committer, &redactor);
        assert_eq!(c.event_id, 7);
        assert_eq!(c.author_id, 42);
        assert_eq!(c.committer_id, 0);
        assert_eq!(c.author_login, "jane");
        assert_eq!(c.committer_login, "");
        assert_eq!(c.message.len(), MESSAGE_MAX);
        assert_eq!(c.repo_name, "org/repo");
    }

    #[test]
    fn role_row_defaults_unknowns_to_zero_and_empty() {
        let ev = event();
        let row = role_row(
            &ev,
            &"d".repeat(40),
            "Co-authored-by",
            &ActorRef::unknown(),
            "Jane Doe",
            "jane@example.com",
            &Redactor::empty(),
        );
        assert_eq!(row.actor_id, 0);
        assert_eq!(row.actor_login, "");
        assert_eq!(row.actor_name, "Jane Doe");
        assert_eq!(row.role, "Co-authored-by");
        assert_eq!(row.created_at, ev.created_at);
    }
}
