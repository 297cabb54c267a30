//! Lines and incremental line assembly.
//!
//! A [`LineSplitter`] is private to one source: it receives raw bytes as
//! they are read from the log and hands back complete, cleaned lines. Bytes
//! from two sources never share a splitter, so partial lines cannot be
//! interleaved.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bytes::BytesMut;

use crate::encoding::decode_line;

/// Initial capacity of a splitter's fragment buffer.
const DEFAULT_FRAGMENT_CAPACITY: usize = 4096;

/// One complete line of output from a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    source: Arc<Path>,
    text: String,
}

impl Line {
    /// Create a line read from `source`.
    #[must_use]
    pub fn new(source: Arc<Path>, text: impl Into<String>) -> Self {
        Self {
            source,
            text: text.into(),
        }
    }

    /// The log file this line was read from.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The cleaned line content, without its delimiter.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the line, returning its content.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }

    /// Check whether the line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Splits a byte stream into complete lines.
///
/// Anything after the last `\n` is held back and prefixed onto the next
/// [`push`](Self::push).
#[derive(Debug)]
pub struct LineSplitter {
    /// Bytes received since the last delimiter.
    partial: BytesMut,
    /// Prefix of `partial` already known to contain no delimiter.
    scanned: usize,
}

impl LineSplitter {
    /// Create an empty splitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            partial: BytesMut::with_capacity(DEFAULT_FRAGMENT_CAPACITY),
            scanned: 0,
        }
    }

    /// Append `data` and return every line it completes, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + pos;
            let raw = self.partial.split_to(end + 1);
            self.scanned = 0;
            lines.push(decode_line(&raw[..end]));
        }
        self.scanned = self.partial.len();
        lines
    }

    /// Number of buffered bytes not yet terminated by a delimiter.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    /// Check whether a fragment is being held.
    #[must_use]
    pub fn has_fragment(&self) -> bool {
        !self.partial.is_empty()
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}
