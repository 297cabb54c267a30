//! Terminal sessions backed by a multiplexer.
//!
//! Each spawned session is a multiplexer window whose pane output is piped
//! into a log file named after the spawn date and the window name. The log
//! is registered with the [`Aggregator`], which is all the wait engine ever
//! sees of a session. Log files are left on disk.
//!
//! # Example
//!
//! ```ignore
//! use texpect::{Aggregator, SessionRegistry, Tmux};
//!
//! let aggregator = Aggregator::new();
//! let mut sessions = SessionRegistry::new(Tmux::default(), aggregator.clone(), "/tmp/logs");
//! sessions.spawn("db", "ssh db01").await?;
//! sessions.send("db", "pg_dump app > /backup/app.sql").await?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs::OpenOptions;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{Local, NaiveDate};
use tokio::process::Command;
use tracing::debug;

use crate::aggregator::Aggregator;
use crate::config::DEFAULT_TMUX_BINARY;
use crate::error::{ExpectError, Result, SessionError};

/// The multiplexer operations sessions are built on.
pub trait Multiplexer: Send + Sync {
    /// Names of the windows in the current session.
    fn list_windows(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Create a detached window named `name` running `command`.
    fn new_window(&self, name: &str, command: &str) -> impl Future<Output = Result<()>> + Send;

    /// Append everything the window's pane prints to `log_path`.
    fn pipe_pane(&self, name: &str, log_path: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Type `keys` into the window followed by Enter.
    fn send_keys(&self, name: &str, keys: &str) -> impl Future<Output = Result<()>> + Send;

    /// Destroy the current session and all its windows.
    fn kill_session(&self) -> impl Future<Output = Result<()>> + Send;
}

/// [`Multiplexer`] implementation that drives the `tmux` binary.
#[derive(Debug, Clone)]
pub struct Tmux {
    binary: String,
}

impl Tmux {
    /// Use the given tmux binary.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// The binary being invoked.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!(%command, "running multiplexer command");

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| SessionError::Launch {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SessionError::command_failed(command, stderr.trim()).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for Tmux {
    fn default() -> Self {
        Self::new(DEFAULT_TMUX_BINARY)
    }
}

impl Multiplexer for Tmux {
    async fn list_windows(&self) -> Result<Vec<String>> {
        let out = self.run(&["list-windows", "-F", "#{window_name}"]).await?;
        Ok(out.lines().filter(|l| !l.is_empty()).map(str::to_string).collect())
    }

    async fn new_window(&self, name: &str, command: &str) -> Result<()> {
        self.run(&["new-window", "-d", "-n", name, command]).await.map(drop)
    }

    async fn pipe_pane(&self, name: &str, log_path: &Path) -> Result<()> {
        let sink = format!("cat >> {}", shell_quote(&log_path.to_string_lossy()));
        self.run(&["pipe-pane", "-t", name, &sink]).await.map(drop)
    }

    async fn send_keys(&self, name: &str, keys: &str) -> Result<()> {
        self.run(&["send-keys", "-t", name, keys, "C-m"]).await.map(drop)
    }

    async fn kill_session(&self) -> Result<()> {
        self.run(&["kill-session"]).await.map(drop)
    }
}

/// Quote `s` for `/bin/sh`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Log file name for a window created on `created`: `YYYYMMDD-<name>.log`.
#[must_use]
pub fn log_file_name(created: NaiveDate, name: &str) -> String {
    format!("{}-{name}.log", created.format("%Y%m%d"))
}

/// A session known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    name: String,
    command: Option<String>,
    created: NaiveDate,
    log_path: PathBuf,
}

impl Window {
    /// The window name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command the window was spawned with; `None` for attached logs.
    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// The local date the window was created on.
    #[must_use]
    pub const fn created(&self) -> NaiveDate {
        self.created
    }

    /// The log file receiving the window's output.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.log_path.display())
    }
}

/// Named sessions and the multiplexer that runs them.
pub struct SessionRegistry<M> {
    mux: M,
    aggregator: Aggregator,
    log_dir: PathBuf,
    windows: HashMap<String, Window>,
}

impl<M: Multiplexer> SessionRegistry<M> {
    /// Create an empty registry writing logs into `log_dir`.
    pub fn new(mux: M, aggregator: Aggregator, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            mux,
            aggregator,
            log_dir: log_dir.into(),
            windows: HashMap::new(),
        }
    }

    /// The multiplexer in use.
    pub const fn multiplexer(&self) -> &M {
        &self.mux
    }

    /// The directory log files are written to.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Open a window named `name` running `command` and start watching its
    /// output.
    ///
    /// The log file is created (never truncated) and registered before the
    /// window starts, so the first line the window prints is not missed.
    /// Respawning a name on the same day reuses the same log file and the
    /// tailer that is already following it. If the multiplexer fails to open
    /// or pipe the window, the log stays registered and a later `spawn` of
    /// the same name picks it up again.
    ///
    /// # Errors
    ///
    /// [`SessionError::WindowExists`] if the registry or the multiplexer
    /// already has a window with this name; otherwise any multiplexer,
    /// file or registration failure.
    pub async fn spawn(&mut self, name: &str, command: &str) -> Result<&Window> {
        if self.windows.contains_key(name) {
            return Err(SessionError::window_exists(name).into());
        }
        if self.mux.list_windows().await?.iter().any(|w| w == name) {
            return Err(SessionError::window_exists(name).into());
        }

        let created = Local::now().date_naive();
        let log_path = self.log_dir.join(log_file_name(created, name));
        create_log(&log_path)?;
        self.watch(&log_path)?;

        self.mux.new_window(name, command).await?;
        self.mux.pipe_pane(name, &log_path).await?;
        debug!(window = name, log = %log_path.display(), "spawned window");

        Ok(self.insert(Window {
            name: name.to_string(),
            command: Some(command.to_string()),
            created,
            log_path,
        }))
    }

    /// Track an existing log file under `name` without creating a window.
    ///
    /// # Errors
    ///
    /// [`SessionError::WindowExists`] for a known name; otherwise the
    /// registration failure from the aggregator.
    pub fn attach(&mut self, name: &str, log_path: impl Into<PathBuf>) -> Result<&Window> {
        if self.windows.contains_key(name) {
            return Err(SessionError::window_exists(name).into());
        }
        let log_path = log_path.into();
        self.aggregator.register(&log_path)?;

        Ok(self.insert(Window {
            name: name.to_string(),
            command: None,
            created: Local::now().date_naive(),
            log_path,
        }))
    }

    /// Type `text` into the window named `name`, followed by Enter.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownWindow`] for a name that was never spawned, or
    /// the multiplexer failure.
    pub async fn send(&self, name: &str, text: &str) -> Result<()> {
        if !self.windows.contains_key(name) {
            return Err(SessionError::unknown_window(name).into());
        }
        self.mux.send_keys(name, text).await
    }

    /// Kill the multiplexer session. Log files stay on disk.
    ///
    /// # Errors
    ///
    /// Returns the multiplexer failure.
    pub async fn exit(&mut self) -> Result<()> {
        self.mux.kill_session().await?;
        debug!(windows = self.windows.len(), "session killed");
        self.windows.clear();
        Ok(())
    }

    /// Every known window, in no particular order.
    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.values()
    }

    /// Look up a window by name.
    pub fn window(&self, name: &str) -> Option<&Window> {
        self.windows.get(name)
    }

    /// Log file of the window named `name`.
    pub fn log_path(&self, name: &str) -> Option<&Path> {
        self.windows.get(name).map(Window::log_path)
    }

    fn watch(&self, log_path: &Path) -> Result<()> {
        match self.aggregator.register(log_path) {
            Err(e) if e.is_already_registered() => {
                debug!(log = %log_path.display(), "log already watched");
                Ok(())
            }
            other => other,
        }
    }

    fn insert(&mut self, window: Window) -> &Window {
        let name = window.name.clone();
        self.windows.entry(name).or_insert(window)
    }
}

impl<M> fmt::Debug for SessionRegistry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("log_dir", &self.log_dir)
            .field("windows", &self.windows.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Create `path` and its directory if missing, keeping existing content.
fn create_log(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        ExpectError::with_io_context(
            std::fs::create_dir_all(dir),
            format!("creating log directory {}", dir.display()),
        )?;
    }
    ExpectError::with_io_context(
        OpenOptions::new().create(true).append(true).open(path),
        format!("creating log file {}", path.display()),
    )
    .map(drop)
}
