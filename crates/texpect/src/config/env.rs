//! Environment-based configuration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::{Config, LogFormat};
use crate::error::{ExpectError, Result};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "TEXPECT";

/// Recognised variable names, without the prefix.
pub mod vars {
    /// Default expect timeout in seconds; `none` waits without limit.
    pub const EXPECT_TIMEOUT: &str = "EXPECT_TIMEOUT";
    /// Rescan interval in milliseconds; `0` disables rescanning.
    pub const RESCAN_INTERVAL_MS: &str = "RESCAN_INTERVAL_MS";
    /// Session log directory.
    pub const LOG_DIR: &str = "LOG_DIR";
    /// Terminal multiplexer binary.
    pub const TMUX: &str = "TMUX";
    /// Tracing filter directive.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    /// Log format: `pretty`, `compact` or `json`.
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

/// A snapshot of prefixed environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    /// Captured values keyed by full variable name.
    values: HashMap<String, String>,
}

impl EnvConfig {
    /// Capture the current process environment under the default prefix.
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_vars(DEFAULT_PREFIX, std::env::vars())
    }

    /// Build from explicit `(name, value)` pairs.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let prefix = prefix.into();
        let wanted = format!("{prefix}_");
        let values = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| k.starts_with(&wanted))
            .collect();
        Self { prefix, values }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(&self.var_name(name)).map(String::as_str)
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get a parsed value, failing on malformed input.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>> {
        self.get(name)
            .map(|raw| {
                raw.trim().parse().map_err(|_| {
                    ExpectError::config(format!("invalid value '{raw}' for {}", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Apply every recognised override to `config`.
    pub fn apply(&self, mut config: Config) -> Result<Config> {
        if let Some(raw) = self.get(vars::EXPECT_TIMEOUT) {
            config.timeouts.expect = if raw.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                match self.parse::<u64>(vars::EXPECT_TIMEOUT)? {
                    Some(0) => {
                        return Err(ExpectError::config(format!(
                            "{} must be positive; use 'none' to wait without limit",
                            self.var_name(vars::EXPECT_TIMEOUT)
                        )));
                    }
                    secs => secs.map(Duration::from_secs),
                }
            };
        }
        if let Some(ms) = self.parse::<u64>(vars::RESCAN_INTERVAL_MS)? {
            config.watch.rescan_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(dir) = self.get(vars::LOG_DIR) {
            config.sessions.log_dir = PathBuf::from(dir);
        }
        if let Some(binary) = self.get(vars::TMUX) {
            config.sessions.tmux = binary.to_string();
        }
        if let Some(level) = self.get(vars::LOG_LEVEL) {
            config.logging.level = level.to_string();
        }
        if let Some(format) = self.parse::<LogFormat>(vars::LOG_FORMAT)? {
            config.logging.format = format;
        }
        Ok(config)
    }
}
