/// Fatal-to-repository failures. Everything softer (skipped events,
/// missing metadata for a single commit) is handled in place and only
/// logged.
#[derive(Debug, thiserror::Error)]
pub enum BackfillError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("repo not cloned: {path}")]
    CloneMissing { path: String },

    #[error("cannot stat repo path {path}: {source}")]
    CloneUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("no commit metadata could be retrieved for {repo} ({shas} SHAs)")]
    NoMetadata { repo: String, shas: usize },

    #[error("internal error: {0}")]
    Internal(String),
}
