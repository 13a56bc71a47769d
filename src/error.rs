use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop a compilation. Recoverable gaps are warnings and
/// live in [`crate::backend::diagnostics`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{origin}:{line}:{column}: {message}")]
    Parse {
        origin: String,
        line: usize,
        column: usize,
        message: String,
        /// The offending source line followed by a caret line.
        snippet: String,
    },

    #[error("invalid IR in {location}: {message}")]
    Invalid { location: String, message: String },

    #[error("{count} warning(s) treated as errors")]
    DeniedWarnings { count: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn invalid(location: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Invalid {
            location: location.into(),
            message: message.into(),
        }
    }
}
