//! Environment-driven engine configuration.

use chrono::{NaiveDateTime, TimeZone, Utc};

use lineage_core::types::Timestamp;

use crate::error::BackfillError;

const DEFAULT_GIT_BATCH: usize = 1000;
const DEFAULT_START_DATE: &str = "2012-07-01 00:00:00";
const DEFAULT_REPOS_DIR: &str = "~/devstats_repos/";

/// What counts as an under-recorded push event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillMode {
    /// Engine disabled.
    Off,
    /// Events with no recorded commits at all.
    MissingOnly,
    /// Missing events plus events whose recorded count is below the
    /// payload's declared size.
    MissingOrUndercounted,
}

impl BackfillMode {
    /// The mode as bound into the selector query (`$3 >= 2` enables the
    /// undercount clause).
    pub fn as_param(self) -> i32 {
        match self {
            BackfillMode::Off => 0,
            BackfillMode::MissingOnly => 1,
            BackfillMode::MissingOrUndercounted => 2,
        }
    }
}

/// Engine configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub mode: BackfillMode,
    /// Page size for range paging and metadata batch slices.
    pub git_batch: usize,
    /// Repository worker concurrency limit per database.
    pub workers: usize,
    /// Default earliest time bound for the selector.
    pub default_start_date: Timestamp,
    /// Use the legacy best-effort range policy instead of strict.
    pub legacy_ranges: bool,
    /// Verify fast-forward ancestry before resolving a range.
    pub require_fast_forward: bool,
    /// Persist Author roles in addition to trailer-derived roles.
    pub author_role: bool,
    /// Persist Committer roles in addition to trailer-derived roles.
    pub committer_role: bool,
    /// Root directory of local clones; always ends with `/`.
    pub repos_dir: String,
    /// Prefix for the helper scripts (e.g. `./git/` for a local checkout).
    pub cmd_prefix: String,
    /// Optional redaction list path.
    pub hide_file: Option<String>,
}

impl BackfillConfig {
    pub fn from_env() -> Result<Self, BackfillError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key/value lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self, BackfillError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match parse_number(&get, "LINEAGE_FETCH_COMMITS_MODE", 0)? {
            0 => BackfillMode::Off,
            1 => BackfillMode::MissingOnly,
            _ => BackfillMode::MissingOrUndercounted,
        };

        let git_batch = parse_number(&get, "LINEAGE_GIT_BATCH", DEFAULT_GIT_BATCH as i64)?;
        let git_batch = if git_batch <= 0 {
            DEFAULT_GIT_BATCH
        } else {
            git_batch as usize
        };

        let workers = match parse_number(&get, "LINEAGE_WORKERS", 0)? {
            n if n > 0 => n as usize,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        };

        let raw_start = get("LINEAGE_START_DATE").unwrap_or_else(|| DEFAULT_START_DATE.to_string());
        let naive = NaiveDateTime::parse_from_str(&raw_start, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| BackfillError::Config(format!("LINEAGE_START_DATE {raw_start:?}: {e}")))?;
        let default_start_date = Utc.from_utc_datetime(&naive);

        let mut repos_dir = get("LINEAGE_REPOS_DIR").unwrap_or_else(|| DEFAULT_REPOS_DIR.to_string());
        if let Some(rest) = repos_dir.strip_prefix("~/") {
            if let Some(home) = get("HOME") {
                repos_dir = format!("{}/{rest}", home.trim_end_matches('/'));
            }
        }
        if !repos_dir.ends_with('/') {
            repos_dir.push('/');
        }

        Ok(Self {
            mode,
            git_batch,
            workers,
            default_start_date,
            legacy_ranges: flag_set(&get, "LINEAGE_LEGACY_RANGES"),
            require_fast_forward: flag_set(&get, "LINEAGE_REQUIRE_FAST_FORWARD"),
            author_role: flag_set(&get, "LINEAGE_AUTHOR_ROLE"),
            committer_role: flag_set(&get, "LINEAGE_COMMITTER_ROLE"),
            repos_dir,
            cmd_prefix: get("LINEAGE_CMD_PREFIX").unwrap_or_default(),
            hide_file: get("LINEAGE_HIDE_FILE").filter(|v| !v.is_empty()),
        })
    }
}

fn parse_number<F>(get: &F, key: &str, default: i64) -> Result<i64, BackfillError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|e| BackfillError::Config(format!("{key} {raw:?}: {e}"))),
    }
}

/// A switch is on when the variable is set to anything non-empty.
fn flag_set<F>(get: &F, key: &str) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    get(key).map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg_from(vars: &[(&str, &str)]) -> Result<BackfillConfig, BackfillError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BackfillConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = cfg_from(&[]).unwrap();
        assert_eq!(cfg.mode, BackfillMode::Off);
        assert_eq!(cfg.git_batch, 1000);
        assert!(!cfg.legacy_ranges);
        assert!(!cfg.require_fast_forward);
        assert!(!cfg.author_role);
        assert!(cfg.repos_dir.ends_with('/'));
        assert_eq!(
            cfg.default_start_date,
            Utc.with_ymd_and_hms(2012, 7, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn mode_values_map_to_variants() {
        assert_eq!(
            cfg_from(&[("LINEAGE_FETCH_COMMITS_MODE", "1")]).unwrap().mode,
            BackfillMode::MissingOnly
        );
        assert_eq!(
            cfg_from(&[("LINEAGE_FETCH_COMMITS_MODE", "3")]).unwrap().mode,
            BackfillMode::MissingOrUndercounted
        );
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        assert!(matches!(
            cfg_from(&[("LINEAGE_GIT_BATCH", "lots")]),
            Err(BackfillError::Config(_))
        ));
        assert!(matches!(
            cfg_from(&[("LINEAGE_START_DATE", "yesterday")]),
            Err(BackfillError::Config(_))
        ));
    }

    #[test]
    fn repos_dir_gets_trailing_slash_and_home_expansion() {
        let cfg = cfg_from(&[("LINEAGE_REPOS_DIR", "/srv/repos")]).unwrap();
        assert_eq!(cfg.repos_dir, "/srv/repos/");

        let cfg = cfg_from(&[("LINEAGE_REPOS_DIR", "~/repos/"), ("HOME", "/home/u")]).unwrap();
        assert_eq!(cfg.repos_dir, "/home/u/repos/");
    }

    #[test]
    fn flags_are_set_by_any_nonempty_value() {
        let cfg = cfg_from(&[("LINEAGE_LEGACY_RANGES", "1")]).unwrap();
        assert!(cfg.legacy_ranges);
        let cfg = cfg_from(&[("LINEAGE_LEGACY_RANGES", "")]).unwrap();
        assert!(!cfg.legacy_ranges);
    }
}
