//! Blotter error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by configuration loading and the driver.
///
/// Domain conditions such as unknown ids or duplicate inserts are not errors;
/// the blotter absorbs them and logs at debug level.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BlotterError {
    /// Configuration could not be parsed or holds invalid values
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Reading or writing a file failed
    #[error("I/O error{}: {message}", path.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default())]
    Io {
        /// Underlying error message
        message: String,
        /// File involved, when known
        path: Option<PathBuf>,
    },

    /// The driver task has exited and no longer accepts commands
    #[error("Blotter driver has stopped")]
    DriverStopped,
}

impl From<serde_json::Error> for BlotterError {
    fn from(err: serde_json::Error) -> Self {
        BlotterError::Config {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for BlotterError {
    fn from(err: std::io::Error) -> Self {
        BlotterError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}
