//! Typed error variants for resource adapters.
//!
//! Every adapter call that talks to the host returns [`ResourceError`];
//! entity operations wrap it together with the step that failed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that arise from adapter calls into the host.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The program could not be started at all.
    #[error("failed to execute '{program}': {source}")]
    Spawn {
        /// `zfs`, `useradd`, `smbpasswd`, ...
        program: String,
        /// Why the spawn failed.
        source: std::io::Error,
    },

    /// A command exited with a non-zero status.
    #[error("command '{command}' failed (exit {exit_code}): {stderr}")]
    ExecutionFailed {
        /// Full command line (never contains secrets, those go through stdin).
        command: String,
        /// Exit status, `-1` when killed by a signal.
        exit_code: i32,
        /// What the tool printed on stderr, trimmed.
        stderr: String,
    },

    /// A required host object was not found.
    #[error("resource not found: {resource}")]
    NotFound {
        /// What was looked up, e.g. `user 'alice'`.
        resource: String,
    },

    /// A host object exists but is in an unexpected state.
    #[error("invalid state for '{resource}': {reason}")]
    InvalidState {
        /// The object in question.
        resource: String,
        /// Why the state is unusable.
        reason: String,
    },

    /// A rendered service configuration failed syntax validation.
    #[error("configuration rejected by validator: {reason}")]
    ConfigRejected {
        /// Validator output.
        reason: String,
    },

    /// Reading or writing a managed file failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The managed file.
        path: PathBuf,
        /// Why the access failed.
        source: std::io::Error,
    },
}

impl ResourceError {
    /// Shorthand for [`ResourceError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
