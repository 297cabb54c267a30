//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use texpect::{Multiplexer, Result, WatchConfig};

/// How long a test waits for anything that should happen promptly.
pub const PROMPT: Duration = Duration::from_secs(5);

/// Watch settings that do not depend on notification timing alone.
pub fn watch_config() -> WatchConfig {
    WatchConfig::new().rescan_interval(Duration::from_millis(50))
}

/// Append `data` to the file at `path`, as a session writing output would.
pub fn append(path: &Path, data: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(data.as_bytes()).unwrap();
    file.flush().unwrap();
}

/// Create an empty log file in `dir`.
pub fn new_log(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::File::create(&path).unwrap();
    path
}

/// A multiplexer whose windows only understand `echo`.
///
/// Sending `echo <text>` to a window appends `<text>` to its piped log,
/// wrapped in colour codes the way a shell theme would print it.
#[derive(Debug, Clone, Default)]
pub struct FakeMux {
    pipes: Arc<Mutex<HashMap<String, PathBuf>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeMux {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Multiplexer for FakeMux {
    async fn list_windows(&self) -> Result<Vec<String>> {
        Ok(self.pipes.lock().unwrap().keys().cloned().collect())
    }

    async fn new_window(&self, name: &str, command: &str) -> Result<()> {
        self.record(format!("new-window {name} {command}"));
        Ok(())
    }

    async fn pipe_pane(&self, name: &str, log_path: &Path) -> Result<()> {
        self.record(format!("pipe-pane {name}"));
        self.pipes
            .lock()
            .unwrap()
            .insert(name.to_string(), log_path.to_path_buf());
        Ok(())
    }

    async fn send_keys(&self, name: &str, keys: &str) -> Result<()> {
        self.record(format!("send-keys {name} {keys}"));
        let path = self.pipes.lock().unwrap().get(name).cloned().unwrap();
        if let Some(text) = keys.strip_prefix("echo ") {
            append(&path, &format!("\x1b[32m{text}\x1b[0m\r\n"));
        }
        Ok(())
    }

    async fn kill_session(&self) -> Result<()> {
        self.record("kill-session".to_string());
        self.pipes.lock().unwrap().clear();
        Ok(())
    }
}
