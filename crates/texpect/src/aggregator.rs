//! Line aggregation across sources.
//!
//! Every [`Tailer`] publishes into one unbounded sink. The aggregator owns
//! the receiving half and serves it out one line per [`Aggregator::next_line`]
//! call, so a line is consumed exactly once no matter how many sources are
//! producing. Sources can be added at any time, including while a consumer
//! is blocked waiting for the next line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::config::WatchConfig;
use crate::error::{ExpectError, Result};
use crate::line::Line;
use crate::tailer::{LineSink, Tailer, TailerHandle};

/// Fan-in of lines from a dynamic set of sources.
///
/// Cloning is cheap; all clones share the same sources and stream.
#[derive(Clone)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

struct Inner {
    config: WatchConfig,
    sink: LineSink,
    /// The single drain point for the shared sink.
    lines: tokio::sync::Mutex<mpsc::UnboundedReceiver<Line>>,
    shutdown: watch::Sender<bool>,
    sources: Mutex<HashMap<PathBuf, TailerHandle>>,
}

impl Aggregator {
    /// Create an aggregator with the default watch configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(WatchConfig::default())
    }

    /// Create an aggregator whose tailers use `config`.
    #[must_use]
    pub fn with_config(config: WatchConfig) -> Self {
        let (sink, lines) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                sink,
                lines: tokio::sync::Mutex::new(lines),
                shutdown,
                sources: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The watch configuration used for new sources.
    #[must_use]
    pub fn config(&self) -> &WatchConfig {
        &self.inner.config
    }

    /// Start tailing `path`.
    ///
    /// Returns once the file is open at its current end and watched; lines
    /// are then delivered in the background. Must be called from within a
    /// tokio runtime.
    ///
    /// A path whose tailer is still running is rejected. A path whose tailer
    /// stopped after a failure is replaced, which is how a failed source is
    /// retried.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::AlreadyRegistered`] for a live duplicate,
    /// [`ExpectError::Shutdown`] after [`shutdown`](Self::shutdown), and an
    /// I/O or watch error if the source cannot be opened or watched.
    pub fn register(&self, path: impl AsRef<Path>) -> Result<()> {
        if self.is_shutdown() {
            return Err(ExpectError::Shutdown);
        }

        let path = path.as_ref();
        let key = ExpectError::with_io_context(
            std::fs::canonicalize(path),
            format!("resolving {}", path.display()),
        )?;

        let mut sources = self.registry();
        if sources.get(&key).is_some_and(TailerHandle::is_running) {
            return Err(ExpectError::already_registered(key));
        }

        let handle = Tailer::start(
            &key,
            self.inner.sink.clone(),
            self.inner.shutdown.subscribe(),
            &self.inner.config,
        )?;
        if sources.insert(key.clone(), handle).is_some() {
            info!(path = %key.display(), "replaced stopped source");
        } else {
            debug!(path = %key.display(), sources = sources.len(), "registered source");
        }
        Ok(())
    }

    /// Wait for the next line from any source.
    ///
    /// Returns `None` once the aggregator has been shut down, including when
    /// shutdown happens while waiting. Cancel safe: dropping the future never
    /// loses a line.
    pub async fn next_line(&self) -> Option<Line> {
        let mut shutdown = self.inner.shutdown.subscribe();
        tokio::select! {
            biased;

            _ = shutdown.wait_for(|stopped| *stopped) => None,

            line = async { self.inner.lines.lock().await.recv().await } => line,
        }
    }

    /// Take a line if one is already buffered.
    ///
    /// Returns `None` when nothing is buffered, when another caller is
    /// currently waiting in [`next_line`](Self::next_line), or after
    /// shutdown.
    #[must_use]
    pub fn try_next_line(&self) -> Option<Line> {
        if self.is_shutdown() {
            return None;
        }
        self.inner.lines.try_lock().ok()?.try_recv().ok()
    }

    /// Number of lines published but not yet consumed.
    ///
    /// Reports zero while another caller is waiting in
    /// [`next_line`](Self::next_line).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lines.try_lock().map_or(0, |lines| lines.len())
    }

    /// The aggregate stream as a [`Stream`], ending at shutdown.
    pub fn lines(&self) -> impl Stream<Item = Line> + Send + 'static {
        futures::stream::unfold(self.clone(), |aggregator| async move {
            let line = aggregator.next_line().await?;
            Some((line, aggregator))
        })
    }

    /// Canonical paths of every registered source, running or not.
    #[must_use]
    pub fn sources(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.registry().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Check whether `path` is registered and its tailer is still running.
    #[must_use]
    pub fn is_active(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.registry().get(&key).is_some_and(TailerHandle::is_running)
    }

    /// Stop every tailer and end the stream.
    ///
    /// Pending and future [`next_line`](Self::next_line) calls return `None`.
    /// Idempotent.
    pub fn shutdown(&self) {
        if self.inner.shutdown.send_replace(true) {
            return;
        }
        let sources = self.registry();
        for handle in sources.values() {
            handle.abort();
        }
        debug!(sources = sources.len(), "aggregator shut down");
    }

    /// Check whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<PathBuf, TailerHandle>> {
        self.inner
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("config", &self.inner.config)
            .field("sources", &self.sources())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    fn aggregator() -> Aggregator {
        Aggregator::with_config(WatchConfig::new().rescan_interval(Duration::from_millis(50)))
    }

    fn append(path: &Path, data: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(data.as_bytes()).unwrap();
    }

    async fn next_text(aggregator: &Aggregator) -> String {
        timeout(RECV_TIMEOUT, aggregator.next_line())
            .await
            .expect("timed out waiting for a line")
            .expect("aggregator shut down")
            .into_text()
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let log = NamedTempFile::new().unwrap();
        let aggregator = aggregator();

        aggregator.register(log.path()).unwrap();
        let err = aggregator.register(log.path()).unwrap_err();
        assert!(err.is_already_registered());
        assert_eq!(aggregator.sources().len(), 1);

        // The first tailer keeps delivering, exactly once.
        append(log.path(), "once\n");
        assert_eq!(next_text(&aggregator).await, "once");
        assert!(aggregator.try_next_line().is_none());
    }

    #[tokio::test]
    async fn stopped_source_can_be_registered_again() {
        let log = NamedTempFile::new().unwrap();
        let aggregator = aggregator();
        aggregator.register(log.path()).unwrap();

        for handle in aggregator.registry().values() {
            handle.abort();
        }
        timeout(RECV_TIMEOUT, async {
            while aggregator.is_active(log.path()) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        aggregator.register(log.path()).unwrap();
        assert!(aggregator.is_active(log.path()));
        append(log.path(), "retried\n");
        assert_eq!(next_text(&aggregator).await, "retried");
    }

    #[tokio::test]
    async fn watch_failure_stops_only_its_source() {
        let failing = NamedTempFile::new().unwrap();
        let healthy = NamedTempFile::new().unwrap();
        let aggregator = aggregator();
        aggregator.register(failing.path()).unwrap();
        aggregator.register(healthy.path()).unwrap();

        let key = std::fs::canonicalize(failing.path()).unwrap();
        aggregator.registry()[&key].inject_watch_error(notify::Error::generic("watch lost"));
        timeout(RECV_TIMEOUT, async {
            while aggregator.is_active(failing.path()) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("failed source kept running");

        assert!(aggregator.is_active(healthy.path()));
        append(healthy.path(), "still delivering\n");
        assert_eq!(next_text(&aggregator).await, "still delivering");

        // Written while stopped, so before the retried tailer's start offset.
        append(failing.path(), "missed\n");
        aggregator.register(failing.path()).unwrap();
        assert!(aggregator.is_active(failing.path()));
        assert_eq!(aggregator.sources().len(), 2);

        append(failing.path(), "retried\n");
        assert_eq!(next_text(&aggregator).await, "retried");
        assert!(aggregator.try_next_line().is_none());
    }

    #[tokio::test]
    async fn missing_file_is_a_registration_failure() {
        let aggregator = aggregator();
        let err = aggregator.register("/no/such/dir/session.log").unwrap_err();
        assert!(err.is_registration_failure());
        assert!(aggregator.sources().is_empty());
    }

    #[tokio::test]
    async fn lines_accumulate_without_a_consumer() {
        let log = NamedTempFile::new().unwrap();
        let aggregator = aggregator();
        aggregator.register(log.path()).unwrap();

        append(log.path(), "one\ntwo\nthree\n");
        timeout(RECV_TIMEOUT, async {
            while aggregator.pending() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(aggregator.try_next_line().unwrap().text(), "one");
        assert_eq!(next_text(&aggregator).await, "two");
        assert_eq!(next_text(&aggregator).await, "three");
        assert_eq!(aggregator.pending(), 0);
    }

    #[tokio::test]
    async fn shutdown_wakes_a_blocked_consumer() {
        let aggregator = aggregator();
        let waiting = {
            let aggregator = aggregator.clone();
            tokio::spawn(async move { aggregator.next_line().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        aggregator.shutdown();
        let line = timeout(RECV_TIMEOUT, waiting).await.unwrap().unwrap();
        assert!(line.is_none());
        assert!(aggregator.next_line().await.is_none());
    }

    #[tokio::test]
    async fn register_after_shutdown_fails() {
        let log = NamedTempFile::new().unwrap();
        let aggregator = aggregator();
        aggregator.shutdown();
        aggregator.shutdown();

        let err = aggregator.register(log.path()).unwrap_err();
        assert!(err.is_shutdown());
    }

    #[tokio::test]
    async fn stream_yields_lines() {
        use futures::StreamExt;

        let log = NamedTempFile::new().unwrap();
        let aggregator = aggregator();
        aggregator.register(log.path()).unwrap();
        append(log.path(), "a\nb\n");

        let lines: Vec<String> = timeout(
            RECV_TIMEOUT,
            aggregator.lines().take(2).map(Line::into_text).collect(),
        )
        .await
        .unwrap();
        assert_eq!(lines, ["a", "b"]);
    }
}
