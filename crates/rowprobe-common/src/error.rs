//! Error types for rowprobe operations.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;
use thiserror::Error;

/// Result type alias for rowprobe operations.
pub type RowProbeResult<T> = Result<T, RowProbeError>;

/// Errors that can occur while driving an SNMP agent.
#[derive(Debug, Error)]
pub enum RowProbeError {
    /// Failed to spawn an external tool.
    #[error("Failed to execute '{command}': {source}")]
    Spawn {
        /// The rendered command line.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// External tool returned a non-zero exit code.
    #[error("Command failed: '{command}' (exit code {exit_code}): {output}")]
    CommandFailed {
        /// The rendered command line.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// The agent answered but holds no such object or instance.
    #[error("No such object or instance: {object}")]
    NoSuchObject {
        /// The requested object.
        object: String,
    },

    /// Tool output did not have the expected shape.
    #[error("Unexpected output from {tool}: {message}")]
    Parse {
        /// The tool whose output was parsed.
        tool: String,
        /// Error message.
        message: String,
    },

    /// Configuration file is missing or malformed.
    #[error("Invalid configuration for {field}: {message}")]
    Config {
        /// The file, entry or field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Report or input file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl RowProbeError {
    /// Creates a configuration error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an output parsing error.
    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Creates a file I/O error.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the remote agent rejected or could not serve the
    /// request. These failures are recorded per leaf and never abort a run.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            RowProbeError::CommandFailed { .. }
                | RowProbeError::NoSuchObject { .. }
                | RowProbeError::Parse { .. }
                | RowProbeError::Spawn { .. }
        )
    }

    /// Returns true if this error must stop the run before any probing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RowProbeError::Config { .. } | RowProbeError::Io { .. })
    }
}
