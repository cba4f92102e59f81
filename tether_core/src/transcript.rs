//! Append-only record of a conversation, fed by the content pipeline.

use tether_api::{Block, Message, Role};

use crate::pipeline::PipelineSink;
use crate::stream::StreamError;

/// Ordered messages plus the session they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    session_id: Option<String>,
    last_error: Option<TranscriptError>,
}

/// Terminal stream failure as remembered by the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptError {
    /// Display text of the failure.
    pub message: String,
    /// Whether the failure looked like an authentication problem.
    pub auth_related: bool,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message.
    pub fn push_user(&mut self, blocks: Vec<Block>) {
        self.messages.push(Message {
            role: Role::User,
            blocks,
        });
    }

    /// Start a new assistant message; subsequent blocks land in it.
    pub fn begin_assistant(&mut self) {
        self.messages.push(Message::new(Role::Assistant));
        self.last_error = None;
    }

    /// Messages in order.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recently assigned session identifier.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Failure that ended the latest response, if any.
    #[must_use]
    pub const fn last_error(&self) -> Option<&TranscriptError> {
        self.last_error.as_ref()
    }

    /// Blocks of the latest assistant message.
    #[must_use]
    pub fn latest_response(&self) -> &[Block] {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
            .map(|message| message.blocks.as_slice())
            .unwrap_or_default()
    }

    fn open_assistant(&mut self) -> &mut Message {
        if self
            .messages
            .last()
            .map_or(true, |message| message.role != Role::Assistant)
        {
            self.messages.push(Message::new(Role::Assistant));
        }
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }
}

impl PipelineSink for Transcript {
    fn on_block(&mut self, block: Block) {
        self.open_assistant().blocks.push(block);
    }

    fn on_session_id(&mut self, session_id: &str) {
        self.session_id = Some(session_id.to_owned());
    }

    fn on_error(&mut self, error: StreamError, auth_related: bool) {
        self.last_error = Some(TranscriptError {
            message: error.to_string(),
            auth_related,
        });
    }
}
