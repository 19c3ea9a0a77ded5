//! Database loop and bounded repository fan-out.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use lineage_core::redact::Redactor;
use lineage_git::{CommandRunner, ProcessRunner};

use crate::config::{BackfillConfig, BackfillMode};
use crate::error::BackfillError;
use crate::repo::backfill_repo;

/// Aggregate counters across the whole run.
#[derive(Debug, Clone, Copy, Default)]
pub struct Totals {
    pub databases: usize,
    pub repos: usize,
    pub failed_repos: usize,
    pub commits: u64,
    pub roles: u64,
}

/// Drives the backfill across databases and repositories.
///
/// Databases are processed one at a time in lexicographic order, each
/// with its own pool and its own identity cache. Repositories within a
/// database run concurrently up to the configured worker limit; the
/// orchestrator joins every worker before moving on. One repository's
/// failure is reported and counted, never propagated to its siblings.
pub struct Backfiller {
    cfg: Arc<BackfillConfig>,
    runner: Arc<dyn CommandRunner>,
    redactor: Arc<Redactor>,
}

impl Backfiller {
    pub fn new(cfg: BackfillConfig) -> Result<Self, BackfillError> {
        Self::with_runner(cfg, Arc::new(ProcessRunner))
    }

    /// Test seam: inject a scripted command runner.
    pub fn with_runner(
        cfg: BackfillConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, BackfillError> {
        let redactor = match &cfg.hide_file {
            Some(path) => Redactor::from_file(Path::new(path)).map_err(|e| {
                BackfillError::Config(format!("cannot load hide file {path}: {e}"))
            })?,
            None => Redactor::empty(),
        };
        Ok(Self {
            cfg: Arc::new(cfg),
            runner,
            redactor: Arc::new(redactor),
        })
    }

    /// Run the engine over every database with mapped repositories.
    ///
    /// `databases` maps database name to connection URL; `repo_dbs`
    /// maps database name to the repositories tracked in it. BTreeMap
    /// iteration makes both orders deterministic.
    pub async fn run(
        &self,
        databases: &BTreeMap<String, String>,
        repo_dbs: &BTreeMap<String, BTreeSet<String>>,
    ) -> Totals {
        let mut totals = Totals::default();
        if self.cfg.mode == BackfillMode::Off {
            tracing::info!("commit backfill disabled (mode 0)");
            return totals;
        }

        for (db_name, url) in databases {
            let Some(repos) = repo_dbs.get(db_name).filter(|r| !r.is_empty()) else {
                continue;
            };
            tracing::info!(
                db = %db_name,
                repos = repos.len(),
                workers = self.cfg.workers,
                batch = self.cfg.git_batch,
                "processing database"
            );

            let pool = match PgPoolOptions::new()
                .max_connections(self.cfg.workers as u32 + 1)
                .connect(url)
                .await
            {
                Ok(pool) => pool,
                Err(err) => {
                    tracing::error!(db = %db_name, error = %err, "cannot connect, skipping database");
                    totals.failed_repos += repos.len();
                    continue;
                }
            };
            totals.databases += 1;

            // One identity cache per database pass, shared by workers.
            let cache = Arc::new(lineage_db::identity::ActorCache::new());
            let semaphore = Arc::new(Semaphore::new(self.cfg.workers));
            let mut workers: JoinSet<(String, Result<crate::repo::RepoOutcome, BackfillError>)> =
                JoinSet::new();

            for repo in repos {
                let semaphore = semaphore.clone();
                let pool = pool.clone();
                let cfg = self.cfg.clone();
                let runner = self.runner.clone();
                let redactor = self.redactor.clone();
                let cache = cache.clone();
                let repo = repo.clone();
                workers.spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (
                                repo,
                                Err(BackfillError::Internal("worker semaphore closed".into())),
                            )
                        }
                    };
                    let result =
                        backfill_repo(&pool, &cfg, &runner, &redactor, &cache, &repo).await;
                    (repo, result)
                });
            }

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((_, Ok(outcome))) => {
                        totals.repos += 1;
                        totals.commits += outcome.commits;
                        totals.roles += outcome.roles;
                    }
                    Ok((repo, Err(err))) => {
                        tracing::error!(db = %db_name, %repo, error = %err, "repository backfill failed");
                        totals.failed_repos += 1;
                    }
                    Err(join_err) => {
                        tracing::error!(db = %db_name, error = %join_err, "repository worker panicked");
                        totals.failed_repos += 1;
                    }
                }
            }

            pool.close().await;
        }

        tracing::info!(
            databases = totals.databases,
            repos = totals.repos,
            failed_repos = totals.failed_repos,
            commits = totals.commits,
            roles = totals.roles,
            "backfill run finished"
        );
        totals
    }
}
