//! Sender error types

use thiserror::Error;

/// Result type for encode/decode operations
pub type SenderResult<T> = Result<T, SenderError>;

/// Errors raised while encoding or decoding a value
#[derive(Debug, Error)]
pub enum SenderError {
    /// Underlying stream failure, including a stream that ended mid-value
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A fixed-length sender was handed a value of another length
    #[error("Length mismatch: sender is configured for {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// A checked frame carried another shape tag than the reader expects
    #[error("Shape tag mismatch: expected {expected:#010x}, got {actual:#010x}")]
    TagMismatch { expected: u32, actual: u32 },

    /// Bytes that do not form a valid value of the shape
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

impl SenderError {
    /// Check if the stream ended before a complete value was read
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, SenderError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }

    /// Check if this error means the two ends disagree on the value shape
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SenderError::LengthMismatch { .. }
                | SenderError::TagMismatch { .. }
                | SenderError::InvalidValue(_)
        )
    }
}
