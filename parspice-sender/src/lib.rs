//! Sender wire contract for ParSPICE
//!
//! A [`Sender`] encodes and decodes one fixed value shape over a byte stream.
//! The wire carries no type tags and no envelope: both ends of a connection
//! must be configured with the same sender, in the same field order. The only
//! length information on the wire is the optional element-count prefix written
//! by dynamic-length [`ArraySender`]s.
//!
//! Opt-in framing that detects a writer/reader mismatch is available through
//! [`CheckedSender`]; the plain format stays tagless.

pub mod array;
pub mod checked;
pub mod composite;
pub mod contract;
pub mod error;
pub mod primitive;

// Re-export commonly used types
pub use array::{ArraySender, MatrixSender};
pub use checked::{shape_tag, CheckedSender};
pub use composite::PairSender;
pub use contract::{BoxSender, Sender, SharedSender};
pub use error::{SenderError, SenderResult};
pub use primitive::{
    BoolSender, CharSender, F32Sender, F64Sender, I16Sender, I32Sender, I64Sender, I8Sender,
    StringSender, U16Sender, U32Sender, U64Sender, U8Sender,
};
