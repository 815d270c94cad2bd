//! # Output capture for child processes.
//!
//! [`OutputBus`] is a thin wrapper around [`tokio::sync::broadcast`] carrying stdout/stderr
//! lines from the reader tasks of a running child to any number of readers.
//!
//! ## Architecture
//! ```text
//! stdout reader ──┐                       ┌──► receiver 1 (UI tail)
//!                 ├──► OutputBus ─────────┼──► receiver 2 (log shipper)
//! stderr reader ──┘  (broadcast chan)     └──► ...
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: readers never stall the child's pipes.
//! - **Bounded capacity**: slow receivers get `RecvError::Lagged(n)` and skip `n` lines.
//! - **No replay**: a receiver only sees lines published after it subscribed;
//!   use [`OutputMode::buffered`] to keep everything.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tokio::sync::broadcast;

/// How a handle captures the child's output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputMode {
    /// Keep every line in memory, readable after the fact.
    pub buffered: bool,
    /// Publish every line on the output bus as soon as it is read.
    pub streaming: bool,
}

impl OutputMode {
    /// Unbuffered, line streaming (the default for records).
    pub const fn streaming() -> Self {
        Self {
            buffered: false,
            streaming: true,
        }
    }

    /// Buffered only, nothing streamed.
    pub const fn buffered() -> Self {
        Self {
            buffered: true,
            streaming: false,
        }
    }

    /// Output is discarded.
    pub const fn discard() -> Self {
        Self {
            buffered: false,
            streaming: false,
        }
    }

    /// Returns `true` if stdout/stderr need to be piped at all.
    #[inline]
    pub fn captures(&self) -> bool {
        self.buffered || self.streaming
    }
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::streaming()
    }
}

/// Which pipe a line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputStream {
    /// The child's standard output.
    Stdout,
    /// The child's standard error.
    Stderr,
}

/// One line of child output, without its trailing newline.
#[derive(Clone, Debug)]
pub struct OutputLine {
    /// Per-bus sequence number, increasing across both streams.
    pub seq: u64,
    /// Wall-clock time the line was read.
    pub at: SystemTime,
    /// Source pipe.
    pub stream: OutputStream,
    /// Line contents.
    pub text: Arc<str>,
}

/// Broadcast channel for output lines.
///
/// Cheap to clone; clones publish into the same channel and share the sequence counter.
#[derive(Clone, Debug)]
pub struct OutputBus {
    tx: broadcast::Sender<OutputLine>,
    seq: Arc<AtomicU64>,
}

impl OutputBus {
    /// Creates a new bus with the given channel capacity (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<OutputLine>(capacity);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publishes a line to all active receivers; dropped if there are none.
    pub fn publish(&self, stream: OutputStream, text: impl Into<Arc<str>>) {
        let line = OutputLine {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            stream,
            text: text.into(),
        };
        let _ = self.tx.send(line);
    }

    /// Creates a receiver observing subsequent lines.
    pub fn subscribe(&self) -> broadcast::Receiver<OutputLine> {
        self.tx.subscribe()
    }
}

/// Lines kept in memory by a buffered handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferedOutput {
    /// Lines read from stdout, oldest first.
    pub stdout: Vec<String>,
    /// Lines read from stderr, oldest first.
    pub stderr: Vec<String>,
}

impl BufferedOutput {
    pub(crate) fn push(&mut self, stream: OutputStream, line: String) {
        match stream {
            OutputStream::Stdout => self.stdout.push(line),
            OutputStream::Stderr => self.stderr.push(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receivers_see_lines_in_order() {
        let bus = OutputBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(OutputStream::Stdout, "one");
        bus.publish(OutputStream::Stderr, "two");

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert_eq!(&*a.text, "one");
        assert_eq!(a.stream, OutputStream::Stdout);
        assert_eq!(&*b.text, "two");
        assert!(b.seq > a.seq);
    }

    #[tokio::test]
    async fn test_publish_without_receivers_is_dropped() {
        let bus = OutputBus::new(0);
        bus.publish(OutputStream::Stdout, "lost");
        let mut rx = bus.subscribe();
        bus.publish(OutputStream::Stdout, "kept");
        assert_eq!(&*rx.recv().await.unwrap().text, "kept");
    }

    #[test]
    fn test_modes() {
        assert!(OutputMode::streaming().captures());
        assert!(OutputMode::buffered().captures());
        assert!(!OutputMode::discard().captures());
        assert_eq!(OutputMode::default(), OutputMode::streaming());
    }
}
