//! Error types for texpect.
//!
//! This module defines all error types used throughout the library.
//! A wait that times out or is ended by shutdown is not an error; those are
//! outcomes reported through [`crate::wait::WaitOutcome`].

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for texpect operations.
#[derive(Debug, Error)]
pub enum ExpectError {
    /// An I/O error occurred with additional context.
    #[error("{context}: {source}")]
    IoWithContext {
        /// What operation was being performed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A filesystem watch could not be established.
    #[error("failed to watch {}: {source}", path.display())]
    Watch {
        /// The path that could not be watched.
        path: PathBuf,
        /// The underlying notify error.
        #[source]
        source: notify::Error,
    },

    /// The path already has a running tailer.
    #[error("source already registered: {}", path.display())]
    AlreadyRegistered {
        /// The path that was registered twice.
        path: PathBuf,
    },

    /// The aggregator has been shut down.
    #[error("aggregator has been shut down")]
    Shutdown,

    /// Invalid pattern specification.
    #[error("invalid pattern: {message}")]
    InvalidPattern {
        /// Description of what's wrong with the pattern.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Session manager error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

/// Errors raised by the terminal multiplexer collaborator.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A window with this name already exists.
    #[error("window '{name}' already exists")]
    WindowExists {
        /// The duplicate window name.
        name: String,
    },

    /// No window with this name was spawned.
    #[error("unknown window '{name}'")]
    UnknownWindow {
        /// The window name that was not found.
        name: String,
    },

    /// A multiplexer command exited unsuccessfully.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The multiplexer binary could not be run at all.
    #[error("failed to run `{command}`: {source}")]
    Launch {
        /// The command line that was attempted.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for texpect operations.
pub type Result<T> = std::result::Result<T, ExpectError>;

impl ExpectError {
    /// Create an I/O error with context.
    pub fn io_context(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoWithContext {
            context: context.into(),
            source,
        }
    }

    /// Wrap an I/O result with context.
    pub fn with_io_context<T>(result: std::io::Result<T>, context: impl Into<String>) -> Result<T> {
        result.map_err(|e| Self::io_context(context, e))
    }

    /// Create a watch error for `path`.
    pub fn watch(path: impl Into<PathBuf>, source: notify::Error) -> Self {
        Self::Watch {
            path: path.into(),
            source,
        }
    }

    /// Create a duplicate registration error.
    pub fn already_registered(path: impl Into<PathBuf>) -> Self {
        Self::AlreadyRegistered { path: path.into() }
    }

    /// Create an invalid pattern error.
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check if this error means the source could not be registered.
    #[must_use]
    pub const fn is_registration_failure(&self) -> bool {
        matches!(self, Self::IoWithContext { .. } | Self::Watch { .. })
    }

    /// Check if this is a duplicate registration.
    #[must_use]
    pub const fn is_already_registered(&self) -> bool {
        matches!(self, Self::AlreadyRegistered { .. })
    }

    /// Check if this error was caused by shutdown.
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

impl SessionError {
    /// Create a window exists error.
    pub fn window_exists(name: impl Into<String>) -> Self {
        Self::WindowExists { name: name.into() }
    }

    /// Create an unknown window error.
    pub fn unknown_window(name: impl Into<String>) -> Self {
        Self::UnknownWindow { name: name.into() }
    }

    /// Create a command failure error.
    pub fn command_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            stderr: stderr.into(),
        }
    }
}
