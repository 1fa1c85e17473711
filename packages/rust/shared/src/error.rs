//! Error types for procbook.
//!
//! Library crates use [`ProcbookError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all procbook operations.
#[derive(Debug, thiserror::Error)]
pub enum ProcbookError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The external conversion tool could not be run, exited non-zero, or timed out.
    #[error("`{tool}` failed: {message}")]
    ToolInvocation { tool: String, message: String },

    /// A rendered document listed for merging does not exist.
    #[error("missing input document: {path:?}")]
    MissingInput { path: PathBuf },

    /// The merge step produced no output although one was required.
    #[error("assembly error: {message}")]
    Assembly { message: String },

    /// A PDF could not be parsed or serialized.
    #[error("PDF error at {path:?}: {message}")]
    Pdf { path: PathBuf, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid argument or option value.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProcbookError>;

impl ProcbookError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a tool invocation error for the given command.
    pub fn tool(tool: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ToolInvocation {
            tool: tool.into(),
            message: msg.into(),
        }
    }

    /// Create an assembly error from any displayable message.
    pub fn assembly(msg: impl Into<String>) -> Self {
        Self::Assembly {
            message: msg.into(),
        }
    }

    /// Create a PDF error for the given file.
    pub fn pdf(path: impl Into<PathBuf>, msg: impl std::fmt::Display) -> Self {
        Self::Pdf {
            path: path.into(),
            message: msg.to_string(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProcbookError::tool("pandoc", "exited with status 43");
        assert_eq!(err.to_string(), "`pandoc` failed: exited with status 43");

        let err = ProcbookError::MissingInput {
            path: PathBuf::from("contrib-01/talk.pdf"),
        };
        assert!(err.to_string().contains("contrib-01/talk.pdf"));

        let err = ProcbookError::assembly("cannot merge files");
        assert_eq!(err.to_string(), "assembly error: cannot merge files");
    }
}
