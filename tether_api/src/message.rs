use serde::{Deserialize, Serialize};

use crate::block::Block;

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Text typed by the developer.
    User,
    /// Content produced by the assistant backend.
    Assistant,
}

/// Ordered group of blocks produced by one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced the blocks.
    pub role: Role,
    /// Blocks in delivery order.
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Message {
    /// Create an empty message for `role`.
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self {
            role,
            blocks: Vec::new(),
        }
    }
}
