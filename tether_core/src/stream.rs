//! Reassembly of JSON fragments from the assistant's `data:` line stream.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::StreamConfig;

/// Anything yielding decoded response lines, such as `BufRead::lines()`.
pub trait LineSource: Iterator<Item = io::Result<String>> {}

impl<T> LineSource for T where T: Iterator<Item = io::Result<String>> {}

/// One decoded unit of the response stream.
#[derive(Debug)]
pub enum StreamEvent {
    /// A complete JSON object carrying one or more blocks.
    BlockPayload(Value),
    /// The backend (re)assigned the conversation's session identifier.
    SessionId(String),
    /// The stream failed; no further events follow.
    Error(StreamError),
    /// The termination sentinel was received.
    Done,
}

/// Terminal stream failures.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The backend reported an error inside the stream.
    #[error("{message}")]
    Protocol {
        /// Message as sent by the backend.
        message: String,
    },
    /// Reading from the line source failed or the source was cancelled.
    #[error("failed to read response stream: {source}")]
    Io {
        /// Underlying read failure.
        #[source]
        source: io::Error,
    },
}

/// Counters describing how a stream was consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Lines handed to the decoder.
    pub lines: usize,
    /// Lines ignored because they lacked the data prefix.
    pub skipped_lines: usize,
    /// Balanced fragments that failed to parse.
    pub malformed_fragments: usize,
    /// Unterminated fragments discarded at end of stream.
    pub truncated_fragments: usize,
}

/// Tracks brace depth while skipping braces inside JSON strings.
///
/// String and escape state persist across calls so that a string literal
/// split over two lines is scanned correctly.
#[derive(Debug, Clone, Copy, Default)]
struct BraceScanner {
    in_string: bool,
    escaped: bool,
}

impl BraceScanner {
    fn delta(&mut self, text: &str) -> i64 {
        let mut delta = 0;
        for ch in text.chars() {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == '"' {
                    self.in_string = false;
                }
                continue;
            }

            match ch {
                '"' => self.in_string = true,
                '{' => delta += 1,
                '}' => delta -= 1,
                _ => {}
            }
        }
        delta
    }
}

#[derive(Debug)]
enum DecoderState {
    Idle,
    Accumulating {
        buffer: String,
        balance: i64,
        scanner: BraceScanner,
    },
}

/// Push-driven decoder: feed it one line at a time.
#[derive(Debug)]
pub struct LineDecoder {
    config: StreamConfig,
    state: DecoderState,
    finished: bool,
    stats: DecoderStats,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

impl LineDecoder {
    /// Create a decoder for the given wire settings.
    #[must_use]
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            state: DecoderState::Idle,
            finished: false,
            stats: DecoderStats::default(),
        }
    }

    /// Whether a terminal event has been emitted or input has ended.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether a fragment is partially buffered.
    #[must_use]
    pub const fn is_accumulating(&self) -> bool {
        matches!(self.state, DecoderState::Accumulating { .. })
    }

    /// Consumption counters so far.
    #[must_use]
    pub const fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Process one line, returning the event it completes, if any.
    ///
    /// Lines fed after `Done` or an `Error` are ignored.
    pub fn feed(&mut self, line: &str) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        self.stats.lines += 1;

        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(content) = line.strip_prefix(self.config.data_prefix.as_str()) else {
            self.stats.skipped_lines += 1;
            return None;
        };

        if content.trim() == self.config.done_sentinel {
            self.discard_partial("sentinel received");
            self.finished = true;
            return Some(StreamEvent::Done);
        }

        if let DecoderState::Accumulating {
            buffer,
            balance,
            scanner,
        } = &mut self.state
        {
            buffer.push_str(content);
            *balance += scanner.delta(content);
        } else if content.starts_with('{') {
            let mut scanner = BraceScanner::default();
            let balance = scanner.delta(content);
            self.state = DecoderState::Accumulating {
                buffer: content.to_owned(),
                balance,
                scanner,
            };
        } else {
            debug!(content, "ignoring data line outside of a JSON fragment");
            return None;
        }

        let DecoderState::Accumulating {
            buffer, balance, ..
        } = &self.state
        else {
            return None;
        };
        if *balance > 0 {
            return None;
        }

        let parsed = serde_json::from_str::<Value>(buffer);
        let fragment_len = buffer.len();
        self.state = DecoderState::Idle;

        match parsed {
            Ok(value) => {
                let event = classify_fragment(value)?;
                if matches!(event, StreamEvent::Error(_)) {
                    self.finished = true;
                }
                Some(event)
            }
            Err(err) => {
                self.stats.malformed_fragments += 1;
                warn!(error = %err, fragment_len, "dropping malformed stream fragment");
                None
            }
        }
    }

    /// Signal end of input. Returns the length of any discarded partial
    /// fragment.
    pub fn finish(&mut self) -> Option<usize> {
        let dropped = self.discard_partial("stream ended");
        self.finished = true;
        dropped
    }

    fn fail(&mut self) {
        self.discard_partial("stream failed");
        self.finished = true;
    }

    fn discard_partial(&mut self, reason: &str) -> Option<usize> {
        match std::mem::replace(&mut self.state, DecoderState::Idle) {
            DecoderState::Accumulating { buffer, .. } => {
                self.stats.truncated_fragments += 1;
                warn!(
                    reason,
                    fragment_len = buffer.len(),
                    "discarding unterminated stream fragment"
                );
                Some(buffer.len())
            }
            DecoderState::Idle => None,
        }
    }
}

/// Classify by key presence. A null `session_id` or `error` carries nothing
/// to report, so the fragment is consumed without an event.
fn classify_fragment(value: Value) -> Option<StreamEvent> {
    if let Some(session_id) = value.get("session_id") {
        let session_id = match session_id {
            Value::Null => {
                debug!("ignoring null session identifier");
                return None;
            }
            Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        return Some(StreamEvent::SessionId(session_id));
    }

    if let Some(error) = value.get("error") {
        if error.is_null() {
            debug!("ignoring null stream error");
            return None;
        }
        return Some(StreamEvent::Error(StreamError::Protocol {
            message: error_message(error),
        }));
    }

    Some(StreamEvent::BlockPayload(value))
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_owned),
        other => other.to_string(),
    }
}

/// Pull-driven decoder over a [`LineSource`].
///
/// Yields events until the sentinel, a terminal error, or the end of the
/// source, and nothing afterwards.
#[derive(Debug)]
pub struct StreamDecoder<S> {
    source: S,
    decoder: LineDecoder,
}

impl<S: LineSource> StreamDecoder<S> {
    /// Decode `source` with default wire settings.
    pub fn new(source: S) -> Self {
        Self::with_config(source, StreamConfig::default())
    }

    /// Decode `source` with explicit wire settings.
    pub fn with_config(source: S, config: StreamConfig) -> Self {
        Self {
            source,
            decoder: LineDecoder::new(config),
        }
    }

    /// Consumption counters so far.
    #[must_use]
    pub const fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

impl<S: LineSource> Iterator for StreamDecoder<S> {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.decoder.is_finished() {
            match self.source.next() {
                Some(Ok(line)) => {
                    if let Some(event) = self.decoder.feed(&line) {
                        return Some(event);
                    }
                }
                Some(Err(source)) => {
                    self.decoder.fail();
                    return Some(StreamEvent::Error(StreamError::Io { source }));
                }
                None => {
                    self.decoder.finish();
                }
            }
        }
        None
    }
}

/// Shared flag used to cancel a [`CancellableSource`] from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Create a handle in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the next read fails.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Line source that fails with [`io::ErrorKind::Interrupted`] once cancelled.
#[derive(Debug)]
pub struct CancellableSource<S> {
    inner: S,
    handle: CancelHandle,
}

impl<S: LineSource> CancellableSource<S> {
    /// Wrap `inner`, returning the source and the handle that cancels it.
    pub fn new(inner: S) -> (Self, CancelHandle) {
        let handle = CancelHandle::new();
        (
            Self {
                inner,
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl<S: LineSource> Iterator for CancellableSource<S> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.handle.is_cancelled() {
            return Some(Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "line source cancelled",
            )));
        }
        self.inner.next()
    }
}
