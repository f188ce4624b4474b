//! Error taxonomy for the agent.
//!
//! Per-process failures (a vanished pid, an unexpected working directory)
//! are contained within the discovery pass or sampler that hit them and never
//! escalate. Only a startup failure aborts the agent.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The process has exited between enumeration and inspection. Expected,
    /// non-fatal; drives a sampler to its terminal state.
    #[error("process {0} not found in procfs")]
    NotFound(i32),

    /// The working directory does not follow the YARN appcache layout.
    /// The process is skipped, no sampler is created for it.
    #[error("working directory {0:?} does not match the appcache layout")]
    MalformedIdentity(PathBuf),

    /// A procfs file exists but could not be parsed.
    #[error("malformed {file}: {reason}")]
    MalformedStat { file: String, reason: String },

    /// An outbound send to the usage collector failed. Logged and dropped,
    /// never retried.
    #[error("usage sink unavailable: {0}")]
    SinkUnavailable(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Instance identity could not be resolved at startup. Fatal.
    #[error("startup failed: {0}")]
    Startup(String),
}

impl AgentError {
    /// Whether this error means the inspected process no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::NotFound(_))
            || matches!(self, AgentError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
