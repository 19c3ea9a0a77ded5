/// Error type for external git command invocations and output decoding.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed (exit code {exit_code:?}): {stderr}")]
    CommandFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse command output: {0}")]
    Parse(String),

    #[error("base64 decode of {field} for {sha} failed: {source}")]
    Decode {
        field: &'static str,
        sha: String,
        #[source]
        source: base64::DecodeError,
    },
}
