//! Error taxonomy for the deployment engine.
//!
//! Every fallible operation in this crate returns `DeployError`. The variants
//! map onto distinct failure classes with different propagation rules:
//! per-node failures (`Connection` after connect-all, `RemoteExecution`,
//! `VersionMismatch`) are collected into outcomes rather than aborting the
//! whole protocol, while whole-operation preconditions (`Validation`,
//! `Packaging`, a failed initial connect-all) abort before any remote work.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    /// SSH authentication failure, unreachable host, or transport error.
    #[error("connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    /// A unit could not be packaged (e.g. a fragment imports a name that is
    /// neither standard-library nor provided by another fragment). Indicates
    /// a programming error in how the fragment set was composed.
    #[error("packaging error in fragment '{fragment}': {reason}")]
    Packaging { fragment: String, reason: String },

    /// A remote command or unit entry point failed on one node.
    #[error("remote execution failed on {host}: {reason}")]
    RemoteExecution { host: String, reason: String },

    /// The installed runtime is outside the acceptable version bounds after
    /// all detection phases were exhausted.
    #[error("no acceptable runtime version on {host}: {reason}")]
    VersionMismatch { host: String, reason: String },

    /// Bad input: empty reservation, unknown node id, illegal directory
    /// argument, malformed byte-size string. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Local filesystem error (unit generation, path checks).
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    pub fn connection(host: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::Connection {
            host: host.into(),
            reason: reason.into(),
        }
    }

    pub fn remote(host: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::RemoteExecution {
            host: host.into(),
            reason: reason.into(),
        }
    }

    pub fn packaging(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        DeployError::Packaging {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::Io {
            path: path.into(),
            source,
        }
    }
}
