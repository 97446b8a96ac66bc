use thiserror::Error;

/// Failures surfaced while encoding or decoding a [`crate::node::BinaryNode`].
#[derive(Debug, Error)]
pub enum BinaryNodeError {
    #[error("unexpected end of buffer at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("invalid utf-8 in decoded string")]
    InvalidUtf8,
    #[error("attribute count {0} is odd (expected key/value pairs)")]
    OddAttributeCount(usize),
    #[error("list length {0} exceeds supported range")]
    ListTooLarge(usize),
    #[error("binary payload length {0} exceeds supported range")]
    BinaryTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, BinaryNodeError>;
