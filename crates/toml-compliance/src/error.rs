//! Error types for loading fixtures and running subjects under test.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while loading the suite or executing a test case.
///
/// Everything except [`HarnessError::Config`] is isolated to a single test case
/// and surfaces as an errored outcome. `Config` aborts the run before any test
/// executes.
#[derive(Error, Debug)]
pub enum HarnessError {
    /// A fixture or a subject's output is not a valid typed-value document.
    /// `origin` names where the document came from (e.g. "decoder output").
    #[error("malformed typed-value encoding in {origin}: {message}")]
    MalformedEncoding { origin: String, message: String },

    /// The subprocess did not finish within the time limit and was killed.
    #[error("`{program}` timed out after {limit:?}")]
    Timeout { program: String, limit: Duration },

    /// The subprocess could not be started.
    #[error("could not run `{program}`: {cause}")]
    SpawnFailure {
        program: String,
        #[source]
        cause: std::io::Error,
    },

    /// The run was aborted while this case was pending or in flight.
    #[error("cancelled")]
    Cancelled,

    /// Reading a fixture file or a subprocess pipe failed.
    #[error("I/O error on {path}: {cause}")]
    Io {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    /// The suite itself is unusable (missing sibling file, unreadable directory,
    /// non-executable program). Fatal to the whole run.
    #[error("configuration error: {0}")]
    Config(String),

    /// The harness itself failed while running a case (a worker task panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

impl HarnessError {
    /// Build a [`HarnessError::MalformedEncoding`] from anything printable.
    pub fn malformed(origin: impl Into<String>, message: impl ToString) -> Self {
        HarnessError::MalformedEncoding {
            origin: origin.into(),
            message: message.to_string(),
        }
    }

    /// The short, stable name used in reports for this kind of error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::MalformedEncoding { .. } => ErrorKind::MalformedEncoding,
            HarnessError::Timeout { .. } => ErrorKind::Timeout,
            HarnessError::SpawnFailure { .. } => ErrorKind::SpawnFailure,
            HarnessError::Cancelled => ErrorKind::Cancelled,
            HarnessError::Io { .. } => ErrorKind::Io,
            HarnessError::Config(_) => ErrorKind::Config,
            HarnessError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Discriminant of [`HarnessError`], cheap to copy into test results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    MalformedEncoding,
    Timeout,
    SpawnFailure,
    Cancelled,
    Io,
    Config,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::MalformedEncoding => "malformed encoding",
            ErrorKind::Timeout => "timeout",
            ErrorKind::SpawnFailure => "spawn failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Io => "i/o error",
            ErrorKind::Config => "configuration error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// Convenience alias used throughout toml-compliance.
pub type Result<T> = std::result::Result<T, HarnessError>;
