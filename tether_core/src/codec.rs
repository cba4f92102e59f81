//! JSON encoding and decoding for content blocks and their envelopes.
//!
//! Decoding is tolerant where the backend is known to vary (field aliases,
//! enum casing, base64 versus escaped code content); encoding always emits
//! the canonical shape so that `decode_block(&encode_block(b)) == b`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tether_api::{Block, CommandKind, CommandParameters, CommandTarget, Paragraph};

/// `schema` value identifying the nested envelope.
pub const ASSISTANT_RESPONSE_SCHEMA: &str = "assistant-response";

const NOTICE_STYLE: &str = "error";
const NOTICE_TITLE: &str = "Unable to display content";
const DEFAULT_CALLOUT_STYLE: &str = "info";

/// Outer shape of a decoded stream payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// The payload is itself one block.
    Single,
    /// `{ "blocks": [...] }`
    Flat,
    /// `{ "schema": "assistant-response", "response": { "content": { "blocks": [...] } } }`
    Nested,
    /// None of the above.
    Unrecognized,
}

/// Errors produced while decoding blocks.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Input was not valid JSON.
    #[error("invalid JSON: {source}")]
    Json {
        /// Parser failure.
        #[from]
        source: serde_json::Error,
    },
    /// Block was not a JSON object.
    #[error("block must be a JSON object")]
    NotAnObject,
    /// Block lacked a string `type` field.
    #[error("block is missing its `type` discriminator")]
    MissingType,
    /// `type` named a block kind this client does not know.
    #[error("unknown block type `{type_name}`")]
    UnknownBlockType {
        /// Discriminator as received.
        type_name: String,
    },
    /// Fields did not match the shape of the block type.
    #[error("malformed {type_name} block: {source}")]
    InvalidBlock {
        /// Block type being decoded.
        type_name: &'static str,
        /// Field-level failure.
        #[source]
        source: serde_json::Error,
    },
    /// A field had an out-of-range or unrecognized value.
    #[error("invalid `{field}` in {type_name} block: {value}")]
    InvalidField {
        /// Block type being decoded.
        type_name: &'static str,
        /// Offending field.
        field: &'static str,
        /// Value as received.
        value: String,
    },
    /// Envelope did not contain a block array where one was expected.
    #[error("envelope is missing its block array at `{path}`")]
    InvalidEnvelope {
        /// JSON pointer that was expected to hold the blocks.
        path: &'static str,
    },
    /// Payload matched no known envelope or block shape.
    #[error("payload is neither a block nor a block envelope")]
    UnrecognizedPayload,
}

#[derive(Deserialize)]
struct TextWire {
    #[serde(alias = "text")]
    content: String,
}

#[derive(Deserialize)]
struct CodeWire {
    #[serde(default)]
    language: String,
    content: String,
    #[serde(default)]
    executable: bool,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandWire {
    #[serde(alias = "command_type")]
    command_type: String,
    target: String,
    #[serde(default)]
    parameters: Value,
}

#[derive(Deserialize)]
struct CreateFileWire {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct ExecuteBuildWire {
    command: String,
    #[serde(default)]
    args: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListItemWire {
    Text(String),
    Paragraph(TextWire),
}

#[derive(Deserialize)]
struct ListWire {
    #[serde(default)]
    ordered: bool,
    #[serde(default)]
    items: Vec<ListItemWire>,
}

#[derive(Deserialize)]
struct HeadingWire {
    level: i64,
    #[serde(alias = "text")]
    content: String,
}

#[derive(Deserialize)]
struct CalloutWire {
    #[serde(default = "default_callout_style")]
    style: String,
    #[serde(default)]
    title: String,
    #[serde(alias = "text")]
    content: String,
}

fn default_callout_style() -> String {
    DEFAULT_CALLOUT_STYLE.to_owned()
}

/// Decode one block from its JSON object.
///
/// # Errors
///
/// Returns [`DecodeError::UnknownBlockType`] for an unrecognized `type` and
/// other variants when the object does not match the shape of its type.
pub fn decode_block(value: &Value) -> Result<Block, DecodeError> {
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    let type_name = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;

    match type_name {
        "paragraph" => {
            let wire: TextWire = fields("paragraph", value)?;
            Ok(Block::Paragraph { text: wire.content })
        }
        "code" => {
            let wire: CodeWire = fields("code", value)?;
            Ok(Block::Code {
                language: wire.language,
                content: decode_code_content(&wire.content),
                executable: wire.executable,
                filename: wire.filename,
            })
        }
        "command" => decode_command(value),
        "list" => {
            let wire: ListWire = fields("list", value)?;
            let items = wire
                .items
                .into_iter()
                .map(|item| match item {
                    ListItemWire::Text(text) => Paragraph::new(text),
                    ListItemWire::Paragraph(paragraph) => Paragraph::new(paragraph.content),
                })
                .collect();
            Ok(Block::List {
                ordered: wire.ordered,
                items,
            })
        }
        "heading" => {
            let wire: HeadingWire = fields("heading", value)?;
            let level = u8::try_from(wire.level)
                .ok()
                .filter(|level| (1..=6).contains(level))
                .ok_or_else(|| DecodeError::InvalidField {
                    type_name: "heading",
                    field: "level",
                    value: wire.level.to_string(),
                })?;
            Ok(Block::Heading {
                level,
                text: wire.content,
            })
        }
        "callout" => {
            let wire: CalloutWire = fields("callout", value)?;
            Ok(Block::Callout {
                style: wire.style,
                title: wire.title,
                text: wire.content,
            })
        }
        other => Err(DecodeError::UnknownBlockType {
            type_name: other.to_owned(),
        }),
    }
}

/// Decode one block from JSON text.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] for unparsable input, otherwise as
/// [`decode_block`].
pub fn decode_block_str(json: &str) -> Result<Block, DecodeError> {
    let value: Value = serde_json::from_str(json)?;
    decode_block(&value)
}

/// Encode a block into its canonical wire object.
#[must_use]
pub fn encode_block(block: &Block) -> Value {
    let mut value = match block {
        Block::Paragraph { text } => json!({ "content": text }),
        Block::Code {
            language,
            content,
            executable,
            filename,
        } => {
            let mut value = json!({
                "language": language,
                "content": STANDARD.encode(content),
                "executable": executable,
            });
            if let Some(filename) = filename {
                value["filename"] = json!(filename);
            }
            value
        }
        Block::Command {
            kind,
            target,
            parameters,
        } => json!({
            "commandType": kind.as_str(),
            "target": target.as_str(),
            "parameters": encode_parameters(parameters),
        }),
        Block::List { ordered, items } => json!({
            "ordered": ordered,
            "items": items
                .iter()
                .map(|item| encode_block(&Block::paragraph(item.text.as_str())))
                .collect::<Vec<_>>(),
        }),
        Block::Heading { level, text } => json!({ "level": level, "content": text }),
        Block::Callout { style, title, text } => json!({
            "style": style,
            "title": title,
            "content": text,
        }),
    };
    value["type"] = json!(block.type_name());
    value
}

/// Determine which envelope, if any, a payload uses.
#[must_use]
pub fn classify_payload(value: &Value) -> PayloadShape {
    if value.get("schema").and_then(Value::as_str) == Some(ASSISTANT_RESPONSE_SCHEMA) {
        PayloadShape::Nested
    } else if value.get("blocks").is_some() {
        PayloadShape::Flat
    } else if value.get("type").is_some() {
        PayloadShape::Single
    } else {
        PayloadShape::Unrecognized
    }
}

/// Decode every block in a payload, failing on the first bad block.
///
/// Both envelope shapes normalize to the same ordered list.
///
/// # Errors
///
/// Returns the first [`DecodeError`] encountered.
pub fn decode_envelope(value: &Value) -> Result<Vec<Block>, DecodeError> {
    decode_payload(value)?.into_iter().collect()
}

/// Decode every block in a payload, keeping per-block failures in place.
///
/// # Errors
///
/// Fails as a whole only when the payload's outer shape is unusable.
pub fn decode_payload(value: &Value) -> Result<Vec<Result<Block, DecodeError>>, DecodeError> {
    let blocks = match classify_payload(value) {
        PayloadShape::Single => return Ok(vec![decode_block(value)]),
        PayloadShape::Flat => value
            .get("blocks")
            .and_then(Value::as_array)
            .ok_or(DecodeError::InvalidEnvelope { path: "/blocks" })?,
        PayloadShape::Nested => value
            .pointer("/response/content/blocks")
            .and_then(Value::as_array)
            .ok_or(DecodeError::InvalidEnvelope {
                path: "/response/content/blocks",
            })?,
        PayloadShape::Unrecognized => return Err(DecodeError::UnrecognizedPayload),
    };

    Ok(blocks.iter().map(decode_block).collect())
}

/// Visible stand-in for content that could not be decoded.
#[must_use]
pub fn error_notice(detail: impl Into<String>) -> Block {
    Block::Callout {
        style: NOTICE_STYLE.to_owned(),
        title: NOTICE_TITLE.to_owned(),
        text: detail.into(),
    }
}

fn fields<T: DeserializeOwned>(
    type_name: &'static str,
    value: &Value,
) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|source| DecodeError::InvalidBlock { type_name, source })
}

fn decode_command(value: &Value) -> Result<Block, DecodeError> {
    let wire: CommandWire = fields("command", value)?;
    let kind = parse_kind(&wire.command_type).ok_or_else(|| DecodeError::InvalidField {
        type_name: "command",
        field: "commandType",
        value: wire.command_type.clone(),
    })?;
    let target = parse_target(&wire.target).ok_or_else(|| DecodeError::InvalidField {
        type_name: "command",
        field: "target",
        value: wire.target.clone(),
    })?;

    let parameters = match kind {
        CommandKind::Create => {
            let params: CreateFileWire = fields("command", &wire.parameters)?;
            CommandParameters::CreateFile {
                path: params.path,
                content: params.content,
            }
        }
        CommandKind::Execute => {
            let params: ExecuteBuildWire = fields("command", &wire.parameters)?;
            CommandParameters::ExecuteBuild {
                command: params.command,
                args: params.args.unwrap_or_default(),
            }
        }
    };

    Ok(Block::Command {
        kind,
        target,
        parameters,
    })
}

fn encode_parameters(parameters: &CommandParameters) -> Value {
    match parameters {
        CommandParameters::CreateFile { path, content } => {
            json!({ "path": path, "content": content })
        }
        CommandParameters::ExecuteBuild { command, args } => {
            json!({ "command": command, "args": args })
        }
    }
}

fn normalize_enum(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !matches!(ch, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_kind(raw: &str) -> Option<CommandKind> {
    match normalize_enum(raw).as_str() {
        "create" => Some(CommandKind::Create),
        "execute" => Some(CommandKind::Execute),
        _ => None,
    }
}

fn parse_target(raw: &str) -> Option<CommandTarget> {
    match normalize_enum(raw).as_str() {
        "file" => Some(CommandTarget::File),
        "buildtool" => Some(CommandTarget::BuildTool),
        _ => None,
    }
}

/// Base64 first; anything that is not base64-encoded UTF-8 is treated as
/// literal text with escaped line breaks.
fn decode_code_content(raw: &str) -> String {
    STANDARD
        .decode(raw)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| raw.replace("\\n", "\n").replace("\\r", "\r"))
}
