//! The symmetric encode/decode contract

use std::io::{Read, Write};
use std::sync::Arc;

use crate::error::{SenderError, SenderResult};

/// Encodes and decodes one fixed value shape over a byte stream.
///
/// Implementations are reusable and stateless per call. They may carry fixed
/// configuration (for example a declared array length), which must be the
/// same on the writing and the reading end: nothing on the wire identifies
/// the shape, so a mismatch silently desynchronises the stream.
pub trait Sender<T>: Send + Sync {
    /// Write `value` to the stream
    fn encode(&self, value: &T, writer: &mut dyn Write) -> SenderResult<()>;

    /// Read one value from the stream
    fn decode(&self, reader: &mut dyn Read) -> SenderResult<T>;
}

/// Owned, type-erased sender
pub type BoxSender<T> = Box<dyn Sender<T>>;

/// Shared, type-erased sender
pub type SharedSender<T> = Arc<dyn Sender<T>>;

impl<T, S> Sender<T> for Box<S>
where
    S: Sender<T> + ?Sized,
{
    fn encode(&self, value: &T, writer: &mut dyn Write) -> SenderResult<()> {
        (**self).encode(value, writer)
    }

    fn decode(&self, reader: &mut dyn Read) -> SenderResult<T> {
        (**self).decode(reader)
    }
}

impl<T, S> Sender<T> for Arc<S>
where
    S: Sender<T> + ?Sized,
{
    fn encode(&self, value: &T, writer: &mut dyn Write) -> SenderResult<()> {
        (**self).encode(value, writer)
    }

    fn decode(&self, reader: &mut dyn Read) -> SenderResult<T> {
        (**self).decode(reader)
    }
}

/// Write an element-count prefix (big-endian `u32`)
pub(crate) fn write_len(len: usize, writer: &mut dyn Write) -> SenderResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| SenderError::InvalidValue(format!("length {} does not fit in u32", len)))?;
    writer.write_all(&len.to_be_bytes())?;
    Ok(())
}

/// Read an element-count prefix (big-endian `u32`)
pub(crate) fn read_len(reader: &mut dyn Read) -> SenderResult<usize> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf) as usize)
}
