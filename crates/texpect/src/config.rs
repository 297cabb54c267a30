//! Configuration types for texpect.
//!
//! This module defines configuration structures for source watching, wait
//! timeouts, the session manager and logging. Values can be loaded from a
//! TOML file ([`Config::load`]) and overridden from `TEXPECT_*` environment
//! variables ([`EnvConfig`]).

mod env;
mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub use env::{DEFAULT_PREFIX, EnvConfig, vars};

use crate::error::Result;

/// Default interval between length checks that back up filesystem events.
pub const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of bytes requested per read from a session log.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Default terminal multiplexer binary.
pub const DEFAULT_TMUX_BINARY: &str = "tmux";

/// Default tracing filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// How sources are tailed.
    pub watch: WatchConfig,

    /// Wait timeouts.
    pub timeouts: TimeoutConfig,

    /// Session manager settings.
    pub sessions: SessionConfig,

    /// Diagnostic logging.
    pub logging: LoggingConfig,
}

impl Config {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from TOML text.
    ///
    /// Missing sections and keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        file::parse(content)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        file::load(path.as_ref())
    }

    /// Apply environment overrides read from `env`.
    pub fn with_env(self, env: &EnvConfig) -> Result<Self> {
        env.apply(self)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(&EnvConfig::from_process())
    }

    /// Set the watch configuration.
    #[must_use]
    pub const fn watch(mut self, watch: WatchConfig) -> Self {
        self.watch = watch;
        self
    }

    /// Set the timeout configuration.
    #[must_use]
    pub const fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the session configuration.
    #[must_use]
    pub fn sessions(mut self, sessions: SessionConfig) -> Self {
        self.sessions = sessions;
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

/// Configuration for source tailers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchConfig {
    /// Interval at which a tailer checks the file length even without a
    /// change notification. `None` relies on notifications alone.
    pub rescan_interval: Option<Duration>,

    /// Bytes requested per read.
    pub read_chunk_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            rescan_interval: Some(DEFAULT_RESCAN_INTERVAL),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl WatchConfig {
    /// Create a watch configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rescan interval.
    #[must_use]
    pub const fn rescan_interval(mut self, interval: Duration) -> Self {
        self.rescan_interval = Some(interval);
        self
    }

    /// Tail on change notifications only.
    #[must_use]
    pub const fn notifications_only(mut self) -> Self {
        self.rescan_interval = None;
        self
    }

    /// Set the read chunk size. Zero is bumped to one byte.
    #[must_use]
    pub const fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = if size == 0 { 1 } else { size };
        self
    }
}

/// Configuration for wait timeouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Timeout applied to `expect`/`expect_any` calls that do not give one.
    /// `None` waits without limit.
    pub expect: Option<Duration>,
}

impl TimeoutConfig {
    /// Create a timeout configuration with the given default expect timeout.
    #[must_use]
    pub const fn new(expect: Duration) -> Self {
        Self {
            expect: Some(expect),
        }
    }

    /// Create a configuration that waits without limit.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { expect: None }
    }
}

/// Configuration for the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Directory the session log files are written to.
    pub log_dir: PathBuf,

    /// Terminal multiplexer binary.
    pub tmux: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            tmux: DEFAULT_TMUX_BINARY.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a session configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log directory.
    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Set the multiplexer binary.
    #[must_use]
    pub fn tmux(mut self, binary: impl Into<String>) -> Self {
        self.tmux = binary.into();
        self
    }
}

/// Configuration for diagnostic logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `texpect=debug`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Whether to colour the output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::default(),
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter directive.
    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the log format.
    #[must_use]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set whether to colour the output.
    #[must_use]
    pub const fn ansi(mut self, enabled: bool) -> Self {
        self.ansi = enabled;
        self
    }
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human readable output.
    Pretty,

    /// Single-line human readable output.
    #[default]
    Compact,

    /// Newline-delimited JSON.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::error::ExpectError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(crate::error::ExpectError::config(format!(
                "unknown log format '{other}'"
            ))),
        }
    }
}
