//! The script-facing vocabulary.
//!
//! [`Driver`] is what an embedding script runtime binds its `spawn`, `send`,
//! `expect`, `expectAny`, `sleep` and `exit` calls to. It owns the session
//! registry, the aggregator and a waiter sharing that aggregator, so a
//! script only ever deals in window names, patterns and timeouts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::error::Result;
use crate::pattern::{Pattern, PatternSet};
use crate::session::{Multiplexer, SessionRegistry, Tmux};
use crate::wait::{ExpectOutcome, WaitOutcome, Waiter};

/// Drives sessions and waits on their combined output.
#[derive(Debug)]
pub struct Driver<M> {
    sessions: SessionRegistry<M>,
    aggregator: Aggregator,
    waiter: Waiter,
}

impl Driver<Tmux> {
    /// Create a driver using the tmux binary named in `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(Tmux::new(config.sessions.tmux.clone()), config)
    }
}

impl<M: Multiplexer> Driver<M> {
    /// Create a driver over `mux`.
    #[must_use]
    pub fn new(mux: M, config: &Config) -> Self {
        let aggregator = Aggregator::with_config(config.watch);
        let sessions = SessionRegistry::new(mux, aggregator.clone(), config.sessions.log_dir.clone());
        let waiter = Waiter::new(aggregator.clone()).with_default_timeout(config.timeouts.expect);
        Self {
            sessions,
            aggregator,
            waiter,
        }
    }

    /// Open a window running `command` and watch its output.
    ///
    /// Returns the window's log file.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken or the multiplexer or log file cannot be
    /// set up.
    pub async fn spawn(&mut self, name: &str, command: &str) -> Result<PathBuf> {
        info!(window = name, command, "spawn");
        let window = self.sessions.spawn(name, command).await?;
        Ok(window.log_path().to_path_buf())
    }

    /// Watch an existing log file as the session `name`.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken or the file cannot be opened or watched.
    pub fn register_source(&mut self, name: &str, log_path: impl AsRef<Path>) -> Result<()> {
        let log_path = log_path.as_ref();
        info!(window = name, log = %log_path.display(), "register source");
        self.sessions.attach(name, log_path).map(drop)
    }

    /// Type `text` into the window `name`, followed by Enter.
    ///
    /// # Errors
    ///
    /// Fails for an unknown window or a multiplexer error.
    pub async fn send(&self, name: &str, text: &str) -> Result<()> {
        info!(window = name, text, "send");
        self.sessions.send(name, text).await
    }

    /// Wait for a line from any session containing `pattern`.
    ///
    /// `None` uses the configured default timeout.
    pub async fn expect(&self, pattern: impl Into<Pattern>, timeout: Option<Duration>) -> ExpectOutcome {
        let pattern: Pattern = pattern.into();
        info!(pattern = %pattern, ?timeout, "expect");
        self.waiter.expect(pattern, timeout).await
    }

    /// Wait for a line from any session matching one of `patterns`.
    ///
    /// `None` uses the configured default timeout.
    pub async fn expect_any(
        &self,
        patterns: impl Into<PatternSet>,
        timeout: Option<Duration>,
    ) -> WaitOutcome {
        let patterns = patterns.into();
        info!(patterns = ?patterns.patterns(), ?timeout, "expect any");
        self.waiter.expect_any(patterns, timeout).await
    }

    /// Pause without consuming output.
    pub async fn sleep(&self, duration: Duration) {
        info!(?duration, "sleep");
        self.waiter.sleep(duration).await;
    }

    /// Kill the multiplexer session.
    ///
    /// # Errors
    ///
    /// Returns the multiplexer failure.
    pub async fn exit(&mut self) -> Result<()> {
        info!("exit");
        self.sessions.exit().await
    }
}

impl<M> Driver<M> {
    /// The aggregate stream shared by every session.
    #[must_use]
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// The session registry.
    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry<M> {
        &self.sessions
    }

    /// Stop watching every session and end all waits.
    pub fn shutdown(&self) {
        self.aggregator.shutdown();
    }
}
