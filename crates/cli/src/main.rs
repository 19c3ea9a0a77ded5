//! Commit-lineage backfill binary.
//!
//! Usage: `lineage <repo-map.json>` (or set `LINEAGE_REPO_MAP`). The
//! map file assigns tracked repositories to their databases:
//!
//! ```json
//! { "gha": ["kubernetes/kubernetes", "kubernetes/minikube"] }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lineage_backfill::{Backfiller, BackfillConfig, BackfillMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lineage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = BackfillConfig::from_env()?;
    if cfg.mode == BackfillMode::Off {
        tracing::info!("LINEAGE_FETCH_COMMITS_MODE is 0, nothing to do");
        return Ok(());
    }

    let map_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LINEAGE_REPO_MAP").ok())
        .context("repo map required: pass a path or set LINEAGE_REPO_MAP")?;
    let raw = std::fs::read_to_string(&map_path)
        .with_context(|| format!("cannot read repo map {map_path}"))?;
    let repo_dbs: BTreeMap<String, BTreeSet<String>> =
        serde_json::from_str(&raw).with_context(|| format!("cannot parse repo map {map_path}"))?;

    let databases: BTreeMap<String, String> = repo_dbs
        .keys()
        .map(|db| (db.clone(), database_url(db)))
        .collect();

    let engine = Backfiller::new(cfg)?;
    let totals = engine.run(&databases, &repo_dbs).await;

    if totals.failed_repos > 0 {
        anyhow::bail!("{} repositories failed to backfill", totals.failed_repos);
    }
    Ok(())
}

/// Connection URL for one event-store database from `PG_*` variables.
fn database_url(db: &str) -> String {
    let host = std::env::var("PG_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = std::env::var("PG_PORT").unwrap_or_else(|_| "5432".to_string());
    let user = std::env::var("PG_USER").unwrap_or_else(|_| "gha_admin".to_string());
    let pass = std::env::var("PG_PASS").unwrap_or_else(|_| "password".to_string());
    format!("postgres://{user}:{pass}@{host}:{port}/{db}")
}
