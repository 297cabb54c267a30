//! Source tailers.
//!
//! A tailer follows one append-only log file. It starts at the file's end,
//! so nothing written before registration is ever delivered, and wakes on
//! filesystem change notifications to read whatever was appended. Complete
//! lines are cleaned and published into the shared sink; the trailing
//! fragment stays in the tailer's own [`LineSplitter`].

use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::config::WatchConfig;
use crate::error::{ExpectError, Result};
use crate::line::{Line, LineSplitter};

/// Sending half of the sink shared by every tailer.
pub type LineSink = mpsc::UnboundedSender<Line>;

/// Notification forwarded from the watcher thread to the tailer task.
#[derive(Debug)]
enum WatchEvent {
    Changed,
    Failed(notify::Error),
}

/// Handle to a running tailer task.
#[derive(Debug)]
pub struct TailerHandle {
    path: Arc<Path>,
    offset: u64,
    task: JoinHandle<()>,
    #[cfg(test)]
    events: mpsc::UnboundedSender<WatchEvent>,
}

impl TailerHandle {
    /// The file being tailed.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset the tailer started reading from.
    #[must_use]
    pub const fn start_offset(&self) -> u64 {
        self.offset
    }

    /// Check whether the tailer is still following its file.
    ///
    /// Returns `false` once it stopped for shutdown or after a watch or read
    /// failure.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the tailer without waiting for it to finish a read.
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Deliver a watcher error to the task as if the backend had reported it.
    #[cfg(test)]
    pub(crate) fn inject_watch_error(&self, err: notify::Error) {
        let _ = self.events.send(WatchEvent::Failed(err));
    }
}

/// Follows a single log file and publishes its lines.
pub struct Tailer {
    path: Arc<Path>,
    file: tokio::fs::File,
    /// Bytes consumed from the file, counted from its start.
    offset: u64,
    splitter: LineSplitter,
    buf: Vec<u8>,
    sink: LineSink,
    shutdown: watch::Receiver<bool>,
}

impl Tailer {
    /// Open `path` at its current end, install a change watch on it and
    /// spawn the tailing task.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the watch cannot be
    /// established. No task is spawned in that case.
    pub fn start(
        path: impl AsRef<Path>,
        sink: LineSink,
        shutdown: watch::Receiver<bool>,
        config: &WatchConfig,
    ) -> Result<TailerHandle> {
        let path: Arc<Path> = Arc::from(path.as_ref());

        let mut file = ExpectError::with_io_context(
            std::fs::File::open(&path),
            format!("opening {}", path.display()),
        )?;
        let offset = ExpectError::with_io_context(
            file.seek(SeekFrom::End(0)),
            format!("seeking to end of {}", path.display()),
        )?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        #[cfg(test)]
        let events = event_tx.clone();
        let watcher = watch_file(&path, event_tx)?;

        let tailer = Self {
            path: Arc::clone(&path),
            file: tokio::fs::File::from_std(file),
            offset,
            splitter: LineSplitter::new(),
            buf: vec![0; config.read_chunk_size.max(1)],
            sink,
            shutdown,
        };

        debug!(path = %path.display(), offset, "tailing source");
        let task = tokio::spawn(tailer.run(watcher, event_rx, config.rescan_interval));

        Ok(TailerHandle {
            path,
            offset,
            task,
            #[cfg(test)]
            events,
        })
    }

    async fn run(
        mut self,
        // Dropping the watcher stops notifications, so it lives as long as the task.
        _watcher: RecommendedWatcher,
        mut events: mpsc::UnboundedReceiver<WatchEvent>,
        rescan: Option<Duration>,
    ) {
        let mut rescan = rescan.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });

        // Bytes appended between the seek and the watch being installed
        // produced no notification.
        if !self.pump().await {
            return;
        }

        loop {
            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        debug!(path = %self.path.display(), "tailer stopping");
                        return;
                    }
                }

                event = events.recv() => match event {
                    Some(WatchEvent::Changed) => {
                        if !self.pump().await {
                            return;
                        }
                    }
                    Some(WatchEvent::Failed(err)) => {
                        warn!(path = %self.path.display(), error = %err, "watch failed, source stopped");
                        return;
                    }
                    None => return,
                },

                () = tick(&mut rescan) => {
                    if self.grew().await && !self.pump().await {
                        return;
                    }
                }
            }
        }
    }

    /// Read and publish everything available. Returns `false` when the
    /// tailer should stop.
    async fn pump(&mut self) -> bool {
        match self.drain().await {
            Ok(keep_going) => keep_going,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "read failed, source stopped");
                false
            }
        }
    }

    async fn drain(&mut self) -> std::io::Result<bool> {
        loop {
            if *self.shutdown.borrow() {
                return Ok(false);
            }

            let n = self.file.read(&mut self.buf).await?;
            if n == 0 {
                return Ok(true);
            }
            self.offset += n as u64;

            for text in self.splitter.push(&self.buf[..n]) {
                trace!(path = %self.path.display(), line = %text, "line");
                if self.sink.send(Line::new(Arc::clone(&self.path), text)).is_err() {
                    // Nobody left to consume lines.
                    return Ok(false);
                }
            }
        }
    }

    /// Check whether the file is longer than what has been consumed.
    async fn grew(&self) -> bool {
        tokio::fs::metadata(&self.path)
            .await
            .is_ok_and(|meta| meta.len() > self.offset)
    }
}

/// Wait for the next rescan tick, or forever if rescanning is disabled.
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn watch_file(path: &Path, events: mpsc::UnboundedSender<WatchEvent>) -> Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let event = match res {
            Ok(event) if is_content_change(&event.kind) => WatchEvent::Changed,
            Ok(_) => return,
            Err(err) => WatchEvent::Failed(err),
        };
        // The task is gone once the receiver is closed.
        let _ = events.send(event);
    })
    .map_err(|e| ExpectError::watch(PathBuf::from(path), e))?;

    watcher
        .watch(path, RecursiveMode::NonRecursive)
        .map_err(|e| ExpectError::watch(PathBuf::from(path), e))?;

    Ok(watcher)
}

const fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Any | EventKind::Other => true,
        EventKind::Access(_) | EventKind::Remove(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    fn fast_config() -> WatchConfig {
        WatchConfig::new().rescan_interval(Duration::from_millis(50))
    }

    fn append(path: &Path, data: &[u8]) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
    }

    async fn recv_text(rx: &mut mpsc::UnboundedReceiver<Line>) -> String {
        timeout(RECV_TIMEOUT, rx.recv())
            .await
            .expect("timed out waiting for a line")
            .expect("sink closed")
            .into_text()
    }

    #[tokio::test]
    async fn existing_content_is_not_replayed() {
        let log = NamedTempFile::new().unwrap();
        append(log.path(), b"old line\npartial old");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_stop, shutdown) = watch::channel(false);
        let handle = Tailer::start(log.path(), tx, shutdown, &fast_config()).unwrap();
        assert_eq!(handle.start_offset(), 20);

        append(log.path(), b"\nnew line\n");
        // The old fragment is before the watermark; only its terminator is new.
        assert_eq!(recv_text(&mut rx).await, "");
        assert_eq!(recv_text(&mut rx).await, "new line");
    }

    #[tokio::test]
    async fn appended_lines_arrive_in_order() {
        let log = NamedTempFile::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_stop, shutdown) = watch::channel(false);
        let _handle = Tailer::start(log.path(), tx, shutdown, &fast_config()).unwrap();

        append(log.path(), b"connecting...\n\x1b[32mbackup1 completed\x1b[0m\r\n");
        append(log.path(), b"do");
        append(log.path(), b"ne\n");

        assert_eq!(recv_text(&mut rx).await, "connecting...");
        assert_eq!(recv_text(&mut rx).await, "backup1 completed");
        assert_eq!(recv_text(&mut rx).await, "done");
    }

    #[tokio::test]
    async fn lines_carry_their_source() {
        let log = NamedTempFile::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_stop, shutdown) = watch::channel(false);
        let _handle = Tailer::start(log.path(), tx, shutdown, &fast_config()).unwrap();

        append(log.path(), b"hello\n");
        let line = timeout(RECV_TIMEOUT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(line.source(), log.path());
    }

    #[tokio::test]
    async fn missing_file_fails_to_start() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (_stop, shutdown) = watch::channel(false);
        let err = Tailer::start("/path/that/does/not/exist.log", tx, shutdown, &fast_config())
            .unwrap_err();
        assert!(err.is_registration_failure());
    }

    #[tokio::test]
    async fn shutdown_stops_the_task() {
        let log = NamedTempFile::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (stop, shutdown) = watch::channel(false);
        let handle = Tailer::start(log.path(), tx, shutdown, &fast_config()).unwrap();
        assert!(handle.is_running());

        stop.send(true).unwrap();
        timeout(RECV_TIMEOUT, async {
            while handle.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("tailer did not stop");
    }

    #[tokio::test]
    async fn watch_error_stops_the_task() {
        let log = NamedTempFile::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_stop, shutdown) = watch::channel(false);
        let handle = Tailer::start(log.path(), tx, shutdown, &fast_config()).unwrap();

        handle.inject_watch_error(notify::Error::generic("inotify queue overflow"));
        timeout(RECV_TIMEOUT, async {
            while handle.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("tailer did not stop");

        append(log.path(), b"after failure\n");
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_sink_stops_the_task() {
        let log = NamedTempFile::new().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let (_stop, shutdown) = watch::channel(false);
        let handle = Tailer::start(log.path(), tx, shutdown, &fast_config()).unwrap();

        drop(rx);
        append(log.path(), b"nobody listens\n");
        timeout(RECV_TIMEOUT, async {
            while handle.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("tailer did not stop");
    }

    #[test]
    fn metadata_changes_are_ignored() {
        use notify::event::{AccessKind, DataChange, MetadataKind};
        assert!(is_content_change(&EventKind::Modify(ModifyKind::Data(DataChange::Any))));
        assert!(!is_content_change(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any))));
        assert!(!is_content_change(&EventKind::Access(AccessKind::Any)));
    }
}
