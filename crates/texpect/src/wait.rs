//! Waiting for patterns on the aggregate stream.
//!
//! A wait pulls lines from the [`Aggregator`] one at a time and checks each
//! against every pattern before moving on, so the earliest line that
//! satisfies any pattern decides the outcome. Lines read without matching
//! are gone; they are not offered to later waits.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::aggregator::Aggregator;
use crate::line::Line;
use crate::pattern::{Pattern, PatternSet};

/// Status code reported for a timed out wait.
pub const STATUS_TIMED_OUT: i64 = -1;

/// Status code reported for a wait ended by shutdown.
pub const STATUS_SHUTDOWN: i64 = -2;

/// Point in time at which a wait gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// A deadline `timeout` from now; `None` never expires.
    ///
    /// Durations too large to represent are treated as unbounded.
    #[must_use]
    pub fn after(timeout: Option<Duration>) -> Self {
        Self(timeout.and_then(|t| Instant::now().checked_add(t)))
    }

    /// A deadline that never expires.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self(None)
    }

    /// Check whether this deadline never expires.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.0.is_none()
    }

    /// Check whether the deadline has passed.
    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, or `None` when unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    async fn elapsed(&self) {
        match self.0 {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    }
}

/// Result of a single-pattern wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectOutcome {
    /// A line contained the pattern.
    Matched(Line),
    /// The deadline passed first.
    TimedOut,
    /// The aggregator was shut down while waiting.
    Shutdown,
}

impl ExpectOutcome {
    /// Check whether the pattern was seen.
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Check whether the wait timed out.
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// The matching line, if any.
    #[must_use]
    pub const fn line(&self) -> Option<&Line> {
        match self {
            Self::Matched(line) => Some(line),
            Self::TimedOut | Self::Shutdown => None,
        }
    }

    /// Integer form for script hosts: `0` matched, [`STATUS_TIMED_OUT`],
    /// or [`STATUS_SHUTDOWN`].
    #[must_use]
    pub const fn status_code(&self) -> i64 {
        match self {
            Self::Matched(_) => 0,
            Self::TimedOut => STATUS_TIMED_OUT,
            Self::Shutdown => STATUS_SHUTDOWN,
        }
    }
}

/// Result of a multi-pattern wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A line matched the pattern at `index`.
    Matched {
        /// Position of the winning pattern in the list.
        index: usize,
        /// The line that matched.
        line: Line,
    },
    /// The deadline passed first.
    TimedOut,
    /// The aggregator was shut down while waiting.
    Shutdown,
}

impl WaitOutcome {
    /// Index of the matching pattern.
    #[must_use]
    pub const fn index(&self) -> Option<usize> {
        match self {
            Self::Matched { index, .. } => Some(*index),
            Self::TimedOut | Self::Shutdown => None,
        }
    }

    /// The matching line, if any.
    #[must_use]
    pub const fn line(&self) -> Option<&Line> {
        match self {
            Self::Matched { line, .. } => Some(line),
            Self::TimedOut | Self::Shutdown => None,
        }
    }

    /// Check whether the wait timed out.
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Integer form for script hosts: the matched index, [`STATUS_TIMED_OUT`],
    /// or [`STATUS_SHUTDOWN`]. Never ambiguous since indices are non-negative.
    #[must_use]
    pub fn status_code(&self) -> i64 {
        match self {
            Self::Matched { index, .. } => i64::try_from(*index).unwrap_or(i64::MAX),
            Self::TimedOut => STATUS_TIMED_OUT,
            Self::Shutdown => STATUS_SHUTDOWN,
        }
    }
}

impl From<WaitOutcome> for ExpectOutcome {
    fn from(outcome: WaitOutcome) -> Self {
        match outcome {
            WaitOutcome::Matched { line, .. } => Self::Matched(line),
            WaitOutcome::TimedOut => Self::TimedOut,
            WaitOutcome::Shutdown => Self::Shutdown,
        }
    }
}

/// Runs waits against an aggregator.
#[derive(Debug, Clone)]
pub struct Waiter {
    aggregator: Aggregator,
    default_timeout: Option<Duration>,
}

impl Waiter {
    /// Create a waiter with no default timeout.
    #[must_use]
    pub const fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            default_timeout: None,
        }
    }

    /// Set the timeout used when a wait does not give one.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// The timeout used when a wait does not give one.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// The aggregator lines are pulled from.
    #[must_use]
    pub const fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Wait for a line matching `pattern`.
    ///
    /// `timeout` of `None` falls back to the default timeout.
    pub async fn expect(&self, pattern: impl Into<Pattern>, timeout: Option<Duration>) -> ExpectOutcome {
        let pattern: Pattern = pattern.into();
        self.expect_any(pattern, timeout).await.into()
    }

    /// Wait for a line matching any of `patterns`.
    ///
    /// Each line is checked against the patterns in order and the lowest
    /// matching index wins. An empty list only ends by timeout or shutdown.
    /// When the deadline passes, lines already buffered at that moment are
    /// still examined before reporting a timeout; a zero timeout therefore
    /// sees exactly what is already buffered.
    pub async fn expect_any(
        &self,
        patterns: impl Into<PatternSet>,
        timeout: Option<Duration>,
    ) -> WaitOutcome {
        let patterns = patterns.into();
        let timeout = timeout.or(self.default_timeout);
        let deadline = Deadline::after(timeout);
        debug!(?patterns, ?timeout, "waiting");

        loop {
            if deadline.has_expired() {
                return self.scan_buffered(&patterns);
            }

            tokio::select! {
                biased;

                line = self.aggregator.next_line() => {
                    let Some(line) = line else {
                        return WaitOutcome::Shutdown;
                    };
                    if let Some(outcome) = check(&patterns, line) {
                        return outcome;
                    }
                }

                () = deadline.elapsed() => {}
            }
        }
    }

    /// Block for `duration` without consuming any lines.
    pub async fn sleep(&self, duration: Duration) {
        trace!(?duration, "sleeping");
        tokio::time::sleep(duration).await;
    }

    fn scan_buffered(&self, patterns: &PatternSet) -> WaitOutcome {
        if self.aggregator.is_shutdown() {
            return WaitOutcome::Shutdown;
        }
        for _ in 0..self.aggregator.pending() {
            let Some(line) = self.aggregator.try_next_line() else {
                break;
            };
            if let Some(outcome) = check(patterns, line) {
                return outcome;
            }
        }
        debug!("wait timed out");
        WaitOutcome::TimedOut
    }
}

fn check(patterns: &PatternSet, line: Line) -> Option<WaitOutcome> {
    match patterns.first_match(line.text()) {
        Some(index) => {
            debug!(index, line = %line, "pattern matched");
            Some(WaitOutcome::Matched { index, line })
        }
        None => {
            trace!(line = %line, "discarded");
            None
        }
    }
}
