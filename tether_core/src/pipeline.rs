//! Drives a response stream to completion and delivers its blocks in order.

use std::sync::mpsc::Sender;

use serde_json::Value;
use tether_api::Block;
use tracing::{debug, warn};

use crate::codec::{self, error_notice};
use crate::config::StreamConfig;
use crate::stream::{DecoderStats, LineSource, StreamDecoder, StreamError, StreamEvent};

/// Receiver of pipeline output. Calls arrive in emission order.
pub trait PipelineSink {
    /// A decoded block, or an error notice standing in for one.
    fn on_block(&mut self, block: Block);

    /// The backend assigned a session identifier; later calls supersede
    /// earlier ones.
    fn on_session_id(&mut self, session_id: &str);

    /// The stream failed. Called at most once, and nothing follows it.
    fn on_error(&mut self, error: StreamError, auth_related: bool);
}

/// Pipeline output as an owned value, for sinks that forward across threads.
#[derive(Debug)]
pub enum PipelineEvent {
    /// See [`PipelineSink::on_block`].
    Block(Block),
    /// See [`PipelineSink::on_session_id`].
    SessionId(String),
    /// See [`PipelineSink::on_error`].
    Error {
        /// The terminal failure.
        error: StreamError,
        /// Whether the failure looks like an authentication problem.
        auth_related: bool,
    },
}

impl PipelineSink for Sender<PipelineEvent> {
    fn on_block(&mut self, block: Block) {
        forward(self, PipelineEvent::Block(block));
    }

    fn on_session_id(&mut self, session_id: &str) {
        forward(self, PipelineEvent::SessionId(session_id.to_owned()));
    }

    fn on_error(&mut self, error: StreamError, auth_related: bool) {
        forward(
            self,
            PipelineEvent::Error {
                error,
                auth_related,
            },
        );
    }
}

fn forward(sender: &Sender<PipelineEvent>, event: PipelineEvent) {
    if sender.send(event).is_err() {
        debug!("pipeline receiver dropped; discarding event");
    }
}

/// Adapts three closures into a [`PipelineSink`].
pub struct FnSink<B, S, E> {
    on_block: B,
    on_session_id: S,
    on_error: E,
}

impl<B, S, E> FnSink<B, S, E>
where
    B: FnMut(Block),
    S: FnMut(&str),
    E: FnMut(StreamError, bool),
{
    /// Bundle the callbacks.
    pub const fn new(on_block: B, on_session_id: S, on_error: E) -> Self {
        Self {
            on_block,
            on_session_id,
            on_error,
        }
    }
}

impl<B, S, E> PipelineSink for FnSink<B, S, E>
where
    B: FnMut(Block),
    S: FnMut(&str),
    E: FnMut(StreamError, bool),
{
    fn on_block(&mut self, block: Block) {
        (self.on_block)(block);
    }

    fn on_session_id(&mut self, session_id: &str) {
        (self.on_session_id)(session_id);
    }

    fn on_error(&mut self, error: StreamError, auth_related: bool) {
        (self.on_error)(error, auth_related);
    }
}

/// How a processed stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamEnding {
    /// The termination sentinel arrived.
    Completed,
    /// The source ran dry without a sentinel.
    #[default]
    Exhausted,
    /// A protocol error or I/O failure stopped the stream.
    Failed {
        /// Whether the failure was classified as authentication related.
        auth_related: bool,
    },
}

/// Summary of one processed stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Blocks decoded and delivered.
    pub blocks_delivered: usize,
    /// Error notices delivered in place of undecodable content.
    pub notices_delivered: usize,
    /// The last session identifier observed.
    pub session_id: Option<String>,
    /// Whether a differing session identifier replaced an earlier one.
    pub session_reassigned: bool,
    /// How the stream ended.
    pub ending: StreamEnding,
    /// Decoder counters.
    pub stats: DecoderStats,
}

/// Whether an error reads as an authentication failure.
///
/// Only protocol errors are inspected; I/O failures are always generic.
#[must_use]
pub fn is_auth_error<M: AsRef<str>>(error: &StreamError, markers: &[M]) -> bool {
    match error {
        StreamError::Protocol { message } => markers
            .iter()
            .any(|marker| message.contains(marker.as_ref())),
        StreamError::Io { .. } => false,
    }
}

/// Turns a line source into ordered block deliveries.
#[derive(Debug, Clone, Default)]
pub struct ContentPipeline {
    config: StreamConfig,
}

impl ContentPipeline {
    /// Create a pipeline with explicit wire settings.
    #[must_use]
    pub const fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Wire settings in use.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Consume `source` until it ends, fails or sends the sentinel.
    pub fn process<S, K>(&self, source: S, sink: &mut K) -> StreamOutcome
    where
        S: LineSource,
        K: PipelineSink + ?Sized,
    {
        let mut decoder = StreamDecoder::with_config(source, self.config.clone());
        let mut outcome = StreamOutcome::default();

        for event in decoder.by_ref() {
            match event {
                StreamEvent::BlockPayload(payload) => deliver(&payload, sink, &mut outcome),
                StreamEvent::SessionId(session_id) => {
                    if outcome
                        .session_id
                        .as_deref()
                        .is_some_and(|current| current != session_id)
                    {
                        outcome.session_reassigned = true;
                    }
                    sink.on_session_id(&session_id);
                    outcome.session_id = Some(session_id);
                }
                StreamEvent::Error(error) => {
                    let auth_related = is_auth_error(&error, self.config.auth_markers.as_slice());
                    warn!(error = %error, auth_related, "response stream failed");
                    outcome.ending = StreamEnding::Failed { auth_related };
                    sink.on_error(error, auth_related);
                    break;
                }
                StreamEvent::Done => {
                    outcome.ending = StreamEnding::Completed;
                    break;
                }
            }
        }

        outcome.stats = decoder.stats();
        debug!(
            blocks = outcome.blocks_delivered,
            notices = outcome.notices_delivered,
            ending = ?outcome.ending,
            "response stream processed"
        );
        outcome
    }
}

fn deliver<K: PipelineSink + ?Sized>(payload: &Value, sink: &mut K, outcome: &mut StreamOutcome) {
    match codec::decode_payload(payload) {
        Ok(results) => {
            for result in results {
                match result {
                    Ok(block) => {
                        outcome.blocks_delivered += 1;
                        sink.on_block(block);
                    }
                    Err(err) => {
                        warn!(error = %err, "substituting undecodable block");
                        outcome.notices_delivered += 1;
                        sink.on_block(error_notice(err.to_string()));
                    }
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "substituting undecodable payload");
            outcome.notices_delivered += 1;
            sink.on_block(error_notice(err.to_string()));
        }
    }
}

/// Run the default pipeline with closure callbacks.
pub fn process<S, B, I, E>(source: S, on_block: B, on_session_id: I, on_error: E) -> StreamOutcome
where
    S: LineSource,
    B: FnMut(Block),
    I: FnMut(&str),
    E: FnMut(StreamError, bool),
{
    let mut sink = FnSink::new(on_block, on_session_id, on_error);
    ContentPipeline::default().process(source, &mut sink)
}
