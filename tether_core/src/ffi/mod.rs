mod content;
mod error;
mod session;

pub use content::{decode_block, decode_envelope, decode_stream, encode_block, StreamTranscript};
pub use error::CoreError;
pub use session::{diff_lines, open_document_session, DocumentSession};

#[allow(
    clippy::doc_markdown,
    clippy::missing_const_for_fn,
    clippy::missing_errors_doc,
    clippy::empty_line_after_doc_comments,
    clippy::missing_safety_doc
)]
mod scaffolding {
    use super::{
        decode_block, decode_envelope, decode_stream, diff_lines, encode_block,
        open_document_session, CoreError, DocumentSession, StreamTranscript,
    };
    use crate::{
        Block, CommandKind, CommandParameters, CommandTarget, DiffHunk, HunkKind, LineRange,
        Paragraph,
    };

    uniffi::include_scaffolding!("tether_core");
}

pub use scaffolding::*;
