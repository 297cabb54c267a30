//! Blocking wrapper around [`Driver`].
//!
//! Script runtimes that cannot await call into a [`SyncDriver`]. It owns a
//! multi-thread tokio runtime so tailers keep draining logs between calls,
//! and takes timeouts and sleeps in whole seconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::config::Config;
use crate::error::{ExpectError, Result};
use crate::host::Driver;
use crate::pattern::{Pattern, PatternSet};
use crate::session::{Multiplexer, Tmux};
use crate::wait::{ExpectOutcome, WaitOutcome};

/// A blocking [`Driver`].
pub struct SyncDriver<M> {
    /// Runs tailers and every blocking call.
    runtime: Runtime,
    inner: Driver<M>,
}

impl SyncDriver<Tmux> {
    /// Create a driver using the tmux binary named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(Tmux::new(config.sessions.tmux.clone()), config)
    }
}

impl<M: Multiplexer> SyncDriver<M> {
    /// Create a blocking driver over `mux`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be built.
    pub fn new(mux: M, config: &Config) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .thread_name("texpect")
            .enable_all()
            .build()
            .map_err(|e| ExpectError::io_context("creating tokio runtime", e))?;

        Ok(Self {
            runtime,
            inner: Driver::new(mux, config),
        })
    }

    /// The async driver being wrapped.
    #[must_use]
    pub const fn driver(&self) -> &Driver<M> {
        &self.inner
    }

    /// Open a window running `command` and watch its output.
    ///
    /// # Errors
    ///
    /// See [`Driver::spawn`].
    pub fn spawn(&mut self, name: &str, command: &str) -> Result<PathBuf> {
        self.runtime.block_on(self.inner.spawn(name, command))
    }

    /// Watch an existing log file as the session `name`.
    ///
    /// # Errors
    ///
    /// See [`Driver::register_source`].
    pub fn register_source(&mut self, name: &str, log_path: impl AsRef<Path>) -> Result<()> {
        let _guard = self.runtime.enter();
        self.inner.register_source(name, log_path)
    }

    /// Type `text` into the window `name`, followed by Enter.
    ///
    /// # Errors
    ///
    /// See [`Driver::send`].
    pub fn send(&self, name: &str, text: &str) -> Result<()> {
        self.runtime.block_on(self.inner.send(name, text))
    }

    /// Wait up to `timeout_secs` seconds for `pattern`.
    ///
    /// `None` uses the configured default timeout.
    pub fn expect(&self, pattern: impl Into<Pattern>, timeout_secs: Option<u64>) -> ExpectOutcome {
        self.runtime
            .block_on(self.inner.expect(pattern, timeout_secs.map(Duration::from_secs)))
    }

    /// Wait up to `timeout_secs` seconds for any of `patterns`.
    ///
    /// `None` uses the configured default timeout.
    pub fn expect_any(&self, patterns: impl Into<PatternSet>, timeout_secs: Option<u64>) -> WaitOutcome {
        self.runtime
            .block_on(self.inner.expect_any(patterns, timeout_secs.map(Duration::from_secs)))
    }

    /// Pause for `secs` seconds without consuming output.
    pub fn sleep(&self, secs: u64) {
        self.runtime
            .block_on(self.inner.sleep(Duration::from_secs(secs)));
    }

    /// Kill the multiplexer session.
    ///
    /// # Errors
    ///
    /// See [`Driver::exit`].
    pub fn exit(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.exit())
    }

    /// Stop watching every session and end all waits.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Run an async operation synchronously.
    pub fn block_on<F, T>(&self, future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        self.runtime.block_on(future)
    }
}

impl<M> Drop for SyncDriver<M> {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl<M> std::fmt::Debug for SyncDriver<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncDriver").finish_non_exhaustive()
    }
}
