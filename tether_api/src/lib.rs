//! Shared Tether data models consumed by the core library and host bindings.
//!
//! The types here are plain values: they carry no behaviour beyond small
//! constructors and are serializable via `serde` for transport and FFI.

pub mod block;
pub mod hunk;
pub mod message;

pub use block::*;
pub use hunk::*;
pub use message::*;
