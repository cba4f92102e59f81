//! Content blocks produced by the assistant.
//!
//! The serde derives describe the persisted and FFI form of these types,
//! which mirrors the Rust field names (`text`, `kind`, a `shape` tag on
//! parameters) and keeps code content as plain text. The backend's wire
//! format differs; `tether_core::codec` is the only reader and writer of it.

use serde::{Deserialize, Serialize};

/// One structured unit of assistant output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Free-flowing prose.
    Paragraph {
        /// Paragraph text.
        text: String,
    },
    /// A code snippet, optionally runnable or bound to a file name.
    Code {
        /// Language hint for highlighting (e.g. `rust`).
        language: String,
        /// Literal source text.
        content: String,
        /// Whether the host may offer to run the snippet.
        #[serde(default)]
        executable: bool,
        /// File the snippet belongs to, if any.
        #[serde(default)]
        filename: Option<String>,
    },
    /// An action the assistant proposes to the host.
    Command {
        /// What the command does.
        kind: CommandKind,
        /// What the command acts on.
        target: CommandTarget,
        /// Kind-specific arguments.
        parameters: CommandParameters,
    },
    /// Bulleted or numbered list.
    List {
        /// Numbered when `true`.
        #[serde(default)]
        ordered: bool,
        /// Items in display order.
        #[serde(default)]
        items: Vec<Paragraph>,
    },
    /// Section heading.
    Heading {
        /// Heading depth, 1 through 6.
        level: u8,
        /// Heading text.
        text: String,
    },
    /// Highlighted aside such as a warning or tip.
    Callout {
        /// Free-form style name (`info`, `warning`, `error`, ...).
        style: String,
        /// Short title line.
        title: String,
        /// Body text.
        text: String,
    },
}

impl Block {
    /// Construct a paragraph block.
    #[must_use]
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph { text: text.into() }
    }

    /// Stable discriminator used on the wire for this block.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Paragraph { .. } => "paragraph",
            Self::Code { .. } => "code",
            Self::Command { .. } => "command",
            Self::List { .. } => "list",
            Self::Heading { .. } => "heading",
            Self::Callout { .. } => "callout",
        }
    }
}

/// A paragraph used as a list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Item text.
    pub text: String,
}

impl Paragraph {
    /// Construct a new paragraph.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<Paragraph> for Block {
    fn from(paragraph: Paragraph) -> Self {
        Self::Paragraph {
            text: paragraph.text,
        }
    }
}

/// Operation requested by a command block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Create something new (a file).
    Create,
    /// Run something (a build tool).
    Execute,
}

impl CommandKind {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Execute => "execute",
        }
    }
}

/// Object a command block acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandTarget {
    /// A file in the workspace.
    File,
    /// The project's build tool.
    BuildTool,
}

impl CommandTarget {
    /// Canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::BuildTool => "build_tool",
        }
    }
}

/// Arguments carried by a command block, shaped by its [`CommandKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum CommandParameters {
    /// Write `content` to `path`.
    CreateFile {
        /// Workspace-relative path.
        path: String,
        /// Full file contents.
        content: String,
    },
    /// Run `command` with `args`.
    ExecuteBuild {
        /// Program or build task name.
        command: String,
        /// Arguments in order.
        #[serde(default)]
        args: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_serde_round_trip() {
        let block = Block::Command {
            kind: CommandKind::Execute,
            target: CommandTarget::BuildTool,
            parameters: CommandParameters::ExecuteBuild {
                command: "cargo".into(),
                args: vec!["test".into(), "--workspace".into()],
            },
        };

        let json = serde_json::to_string(&block).expect("serialize block");
        let decoded: Block = serde_json::from_str(&json).expect("deserialize block");
        assert_eq!(block, decoded);
    }

    #[test]
    fn serde_defaults_are_applied() {
        let json = r#"{"type":"code","language":"rust","content":"fn main() {}"}"#;
        let block: Block = serde_json::from_str(json).expect("deserialize with defaults");
        assert_eq!(
            block,
            Block::Code {
                language: "rust".into(),
                content: "fn main() {}".into(),
                executable: false,
                filename: None,
            }
        );
    }

    #[test]
    fn encoded_uses_snake_case() {
        let json = serde_json::to_string(&CommandTarget::BuildTool).expect("serialize target");
        assert_eq!(json, "\"build_tool\"");
        assert_eq!(CommandTarget::BuildTool.as_str(), "build_tool");
    }

    #[test]
    fn persisted_shape_mirrors_field_names() {
        let block = Block::Command {
            kind: CommandKind::Create,
            target: CommandTarget::File,
            parameters: CommandParameters::CreateFile {
                path: "a.txt".into(),
                content: "body".into(),
            },
        };
        let value = serde_json::to_value(&block).expect("serialize block");
        assert_eq!(value["type"], "command");
        assert_eq!(value["kind"], "create");
        assert_eq!(value["parameters"]["shape"], "create_file");

        let value = serde_json::to_value(Block::paragraph("hi")).expect("serialize paragraph");
        assert_eq!(value["text"], "hi");
    }

    #[test]
    fn type_names_match_wire_discriminators() {
        assert_eq!(Block::paragraph("hi").type_name(), "paragraph");
        let list = Block::List {
            ordered: true,
            items: vec![Paragraph::new("one")],
        };
        assert_eq!(list.type_name(), "list");
    }
}
