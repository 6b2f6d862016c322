//! Opt-in shape checking
//!
//! The plain wire format cannot tell a writer/reader configuration mismatch
//! apart from valid data. [`CheckedSender`] prefixes every value with a 4-byte
//! shape tag so the reading end fails with [`SenderError::TagMismatch`]
//! instead of decoding garbage. Both ends must opt in.

use std::io::{Read, Write};

use crate::contract::Sender;
use crate::error::{SenderError, SenderResult};

/// Derive a stable shape tag from a shape name (32-bit FNV-1a)
pub fn shape_tag(name: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    name.bytes().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(PRIME)
    })
}

/// Wraps a sender with a per-value shape tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedSender<S> {
    inner: S,
    tag: u32,
}

impl<S> CheckedSender<S> {
    pub fn new(inner: S, tag: u32) -> Self {
        Self { inner, tag }
    }

    /// Tag derived from `shape_name` with [`shape_tag`]
    pub fn named(inner: S, shape_name: &str) -> Self {
        Self::new(inner, shape_tag(shape_name))
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }
}

impl<T, S> Sender<T> for CheckedSender<S>
where
    S: Sender<T>,
{
    fn encode(&self, value: &T, writer: &mut dyn Write) -> SenderResult<()> {
        writer.write_all(&self.tag.to_be_bytes())?;
        self.inner.encode(value, writer)
    }

    fn decode(&self, reader: &mut dyn Read) -> SenderResult<T> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        let actual = u32::from_be_bytes(buf);
        if actual != self.tag {
            return Err(SenderError::TagMismatch {
                expected: self.tag,
                actual,
            });
        }
        self.inner.decode(reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArraySender;
    use crate::primitive::{F64Sender, I32Sender};
    use std::io::Cursor;

    #[test]
    fn test_shape_tag_is_stable() {
        assert_eq!(shape_tag(""), 0x811c_9dc5);
        assert_eq!(shape_tag("a"), 0xe40c_292c);
        assert_ne!(shape_tag("f64[3]"), shape_tag("f64[2]"));
    }

    #[test]
    fn test_checked_roundtrip() {
        let sender = CheckedSender::named(ArraySender::fixed(F64Sender, 3), "f64[3]");
        let mut buf = Vec::new();
        sender.encode(&vec![1.0, 2.0, 3.0], &mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 24);

        let decoded: Vec<f64> = sender.decode(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_checked_over_empty_value() {
        let sender = CheckedSender::named(ArraySender::dynamic(I32Sender), "i32[]");
        let mut buf = Vec::new();
        sender.encode(&Vec::<i32>::new(), &mut buf).unwrap();
        // tag plus a zero count
        assert_eq!(buf.len(), 4 + 4);

        let decoded: Vec<i32> = sender.decode(&mut Cursor::new(buf)).unwrap();
        assert!(decoded.is_empty());

        let fixed = CheckedSender::named(ArraySender::fixed(F64Sender, 0), "f64[0]");
        let mut buf = Vec::new();
        fixed.encode(&Vec::<f64>::new(), &mut buf).unwrap();
        assert_eq!(buf, shape_tag("f64[0]").to_be_bytes().to_vec());
        let decoded: Vec<f64> = fixed.decode(&mut Cursor::new(buf)).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_checked_detects_configuration_mismatch() {
        let writer = CheckedSender::named(ArraySender::fixed(I32Sender, 3), "i32[3]");
        let reader = CheckedSender::named(ArraySender::fixed(I32Sender, 2), "i32[2]");

        let mut buf = Vec::new();
        writer.encode(&vec![1, 2, 3], &mut buf).unwrap();

        let result: SenderResult<Vec<i32>> = reader.decode(&mut Cursor::new(buf));
        match result {
            Err(SenderError::TagMismatch { expected, actual }) => {
                assert_eq!(expected, shape_tag("i32[2]"));
                assert_eq!(actual, shape_tag("i32[3]"));
            }
            other => panic!("expected tag mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_checked_detects_desync_on_following_value() {
        // Tags line up for the first value but the inner shapes differ, so the
        // next frame starts mid-value and its tag no longer matches.
        let writer = CheckedSender::new(ArraySender::fixed(I32Sender, 3), 7);
        let reader = CheckedSender::new(ArraySender::fixed(I32Sender, 2), 7);

        let mut buf = Vec::new();
        writer.encode(&vec![1, 2, 3], &mut buf).unwrap();
        writer.encode(&vec![4, 5, 6], &mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let first: Vec<i32> = reader.decode(&mut cursor).unwrap();
        assert_eq!(first, vec![1, 2]);
        let second: SenderResult<Vec<i32>> = reader.decode(&mut cursor);
        assert!(matches!(second, Err(SenderError::TagMismatch { expected: 7, actual: 3 })));
    }
}
