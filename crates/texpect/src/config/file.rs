//! TOML configuration files.
//!
//! ```toml
//! [watch]
//! rescan_interval_ms = 500   # 0 disables rescanning
//! read_chunk_size = 8192
//!
//! [timeouts]
//! expect_secs = 60           # absent waits without limit
//!
//! [sessions]
//! log_dir = "/tmp/texpect"
//! tmux = "tmux"
//!
//! [logging]
//! level = "texpect=debug"
//! format = "json"
//! ansi = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::{Config, LogFormat};
use crate::error::{ExpectError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    watch: WatchSection,
    timeouts: TimeoutSection,
    sessions: SessionSection,
    logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct WatchSection {
    rescan_interval_ms: Option<u64>,
    read_chunk_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TimeoutSection {
    expect_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SessionSection {
    log_dir: Option<PathBuf>,
    tmux: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LoggingSection {
    level: Option<String>,
    format: Option<LogFormat>,
    ansi: Option<bool>,
}

/// Load and parse a configuration file.
pub(super) fn load(path: &Path) -> Result<Config> {
    let content = ExpectError::with_io_context(
        std::fs::read_to_string(path),
        format!("reading config file {}", path.display()),
    )?;
    decode(&content).map_err(|e| ExpectError::config(format!("{}: {e}", path.display())))
}

/// Parse configuration text over the defaults.
pub(super) fn parse(content: &str) -> Result<Config> {
    decode(content).map_err(ExpectError::config)
}

fn decode(content: &str) -> std::result::Result<Config, String> {
    let file: ConfigFile = toml::from_str(content).map_err(|e| e.to_string())?;
    file.into_config()
}

impl ConfigFile {
    fn into_config(self) -> std::result::Result<Config, String> {
        let mut config = Config::default();

        if let Some(ms) = self.watch.rescan_interval_ms {
            config.watch.rescan_interval = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(size) = self.watch.read_chunk_size {
            config.watch = config.watch.read_chunk_size(size);
        }

        config.timeouts.expect = match self.timeouts.expect_secs {
            Some(0) => {
                return Err(
                    "timeouts.expect_secs must be positive; leave it out to wait without limit"
                        .into(),
                );
            }
            secs => secs.map(Duration::from_secs),
        };

        if let Some(dir) = self.sessions.log_dir {
            config.sessions.log_dir = dir;
        }
        if let Some(tmux) = self.sessions.tmux {
            config.sessions.tmux = tmux;
        }

        if let Some(level) = self.logging.level {
            config.logging.level = level;
        }
        if let Some(format) = self.logging.format {
            config.logging.format = format;
        }
        if let Some(ansi) = self.logging.ansi {
            config.logging.ansi = ansi;
        }

        Ok(config)
    }
}
