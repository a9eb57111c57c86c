//! Error types for buildpipe.
//!
//! Library crates use [`BuildError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all buildpipe operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// No installed binary was found for a tool at any search location.
    #[error("{tool} binary not found; check that its package is installed")]
    ToolNotFound { tool: String },

    /// An external tool ran but exited unsuccessfully.
    #[error("{tool} failed with exit code {code}: {output}")]
    ToolExecutionFailed {
        tool: String,
        code: i32,
        output: String,
    },

    /// The per-file transformer rejected a source file.
    #[error("{}", transform_message(.path, .message))]
    TransformFailed {
        path: Option<PathBuf>,
        message: String,
    },

    /// A single asset copy failed.
    #[error("failed to copy {from:?} to {to:?}: {source}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// A subprocess could not be started at all.
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Invalid glob pattern.
    #[error("invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn transform_message(path: &Option<PathBuf>, message: &str) -> String {
    match path {
        Some(path) => format!("transform failed for {}: {message}", path.display()),
        None => format!("transform failed: {message}"),
    }
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BuildError>;

impl BuildError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a tool-not-found error for the given tool name.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a transform error, optionally tied to the offending file.
    pub fn transform(path: Option<PathBuf>, msg: impl Into<String>) -> Self {
        Self::TransformFailed {
            path,
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
