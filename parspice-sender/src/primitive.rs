//! Senders for scalar values
//!
//! Numbers are written big-endian at their natural width, `bool` as a single
//! `0`/`1` byte, `char` as its UTF-32 code point and `String` as a `u32`
//! byte-length prefix followed by UTF-8.

use std::io::{Read, Write};

use crate::contract::{read_len, write_len, Sender};
use crate::error::{SenderError, SenderResult};

macro_rules! numeric_sender {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl Sender<$ty> for $name {
            fn encode(&self, value: &$ty, writer: &mut dyn Write) -> SenderResult<()> {
                writer.write_all(&value.to_be_bytes())?;
                Ok(())
            }

            fn decode(&self, reader: &mut dyn Read) -> SenderResult<$ty> {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                reader.read_exact(&mut buf)?;
                Ok(<$ty>::from_be_bytes(buf))
            }
        }
    };
}

numeric_sender!(
    /// Sender for `i8`
    I8Sender, i8
);
numeric_sender!(
    /// Sender for `i16`
    I16Sender, i16
);
numeric_sender!(
    /// Sender for `i32`
    I32Sender, i32
);
numeric_sender!(
    /// Sender for `i64`
    I64Sender, i64
);
numeric_sender!(
    /// Sender for `u8`
    U8Sender, u8
);
numeric_sender!(
    /// Sender for `u16`
    U16Sender, u16
);
numeric_sender!(
    /// Sender for `u32`
    U32Sender, u32
);
numeric_sender!(
    /// Sender for `u64`
    U64Sender, u64
);
numeric_sender!(
    /// Sender for `f32`
    F32Sender, f32
);
numeric_sender!(
    /// Sender for `f64`
    F64Sender, f64
);

/// Sender for `bool`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoolSender;

impl Sender<bool> for BoolSender {
    fn encode(&self, value: &bool, writer: &mut dyn Write) -> SenderResult<()> {
        writer.write_all(&[u8::from(*value)])?;
        Ok(())
    }

    fn decode(&self, reader: &mut dyn Read) -> SenderResult<bool> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        match buf[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SenderError::InvalidValue(format!(
                "byte {:#04x} is not a bool",
                other
            ))),
        }
    }
}

/// Sender for `char`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharSender;

impl Sender<char> for CharSender {
    fn encode(&self, value: &char, writer: &mut dyn Write) -> SenderResult<()> {
        writer.write_all(&u32::from(*value).to_be_bytes())?;
        Ok(())
    }

    fn decode(&self, reader: &mut dyn Read) -> SenderResult<char> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        let code = u32::from_be_bytes(buf);
        char::from_u32(code)
            .ok_or_else(|| SenderError::InvalidValue(format!("{:#x} is not a char", code)))
    }
}

/// Sender for `String`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StringSender;

impl Sender<String> for StringSender {
    fn encode(&self, value: &String, writer: &mut dyn Write) -> SenderResult<()> {
        write_len(value.len(), writer)?;
        writer.write_all(value.as_bytes())?;
        Ok(())
    }

    fn decode(&self, reader: &mut dyn Read) -> SenderResult<String> {
        let len = read_len(reader)?;
        let mut bytes = Vec::new();
        reader.take(len as u64).read_to_end(&mut bytes)?;
        if bytes.len() != len {
            return Err(SenderError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("string truncated after {} of {} bytes", bytes.len(), len),
            )));
        }
        String::from_utf8(bytes).map_err(|e| SenderError::InvalidValue(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;
    use std::io::Cursor;

    /// Encode `values` back to back, check the width, and decode them again
    fn assert_boundaries<T, S>(sender: S, values: &[T], width: usize)
    where
        T: PartialEq + Debug,
        S: Sender<T>,
    {
        let mut buf = Vec::new();
        for value in values {
            sender.encode(value, &mut buf).unwrap();
        }
        assert_eq!(buf.len(), values.len() * width);

        let mut cursor = Cursor::new(buf);
        for value in values {
            assert_eq!(&sender.decode(&mut cursor).unwrap(), value);
        }
    }

    #[test]
    fn test_numeric_widths_and_byte_order() {
        let mut buf = Vec::new();
        I32Sender.encode(&1, &mut buf).unwrap();
        assert_eq!(buf, vec![0, 0, 0, 1]);

        buf.clear();
        I16Sender.encode(&-2, &mut buf).unwrap();
        assert_eq!(buf, vec![0xff, 0xfe]);

        buf.clear();
        F64Sender.encode(&1.5, &mut buf).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(F64Sender.decode(&mut Cursor::new(buf)).unwrap(), 1.5);
    }

    #[test]
    fn test_numeric_boundaries() {
        let mut buf = Vec::new();
        for value in [i64::MIN, -1, 0, 1, i64::MAX] {
            I64Sender.encode(&value, &mut buf).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        for value in [i64::MIN, -1, 0, 1, i64::MAX] {
            assert_eq!(I64Sender.decode(&mut cursor).unwrap(), value);
        }
    }

    #[test]
    fn test_every_numeric_width_at_its_limits() {
        assert_boundaries(I8Sender, &[i8::MIN, -1, 0, i8::MAX], 1);
        assert_boundaries(I16Sender, &[i16::MIN, 0, i16::MAX], 2);
        assert_boundaries(I32Sender, &[i32::MIN, 0, i32::MAX], 4);
        assert_boundaries(U8Sender, &[u8::MIN, 0x80, u8::MAX], 1);
        assert_boundaries(U16Sender, &[u16::MIN, 0x0102, u16::MAX], 2);
        assert_boundaries(U32Sender, &[u32::MIN, 0x0102_0304, u32::MAX], 4);
        assert_boundaries(U64Sender, &[u64::MIN, 1 << 40, u64::MAX], 8);
        assert_boundaries(
            F32Sender,
            &[f32::MIN, -0.0, f32::MIN_POSITIVE, f32::MAX, f32::INFINITY],
            4,
        );
        assert_boundaries(F64Sender, &[f64::MIN, f64::EPSILON, f64::NEG_INFINITY], 8);
    }

    #[test]
    fn test_unsigned_byte_order() {
        let mut buf = Vec::new();
        U16Sender.encode(&0x0102, &mut buf).unwrap();
        U32Sender.encode(&0x0304_0506, &mut buf).unwrap();
        assert_eq!(buf, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_bool_rejects_other_bytes() {
        assert!(BoolSender.decode(&mut Cursor::new(vec![1])).unwrap());
        assert!(!BoolSender.decode(&mut Cursor::new(vec![0])).unwrap());
        let err = BoolSender.decode(&mut Cursor::new(vec![7])).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_char_roundtrip_and_invalid_code_point() {
        let mut buf = Vec::new();
        CharSender.encode(&'λ', &mut buf).unwrap();
        assert_eq!(CharSender.decode(&mut Cursor::new(buf)).unwrap(), 'λ');

        let surrogate = 0xD800u32.to_be_bytes().to_vec();
        assert!(CharSender.decode(&mut Cursor::new(surrogate)).is_err());
    }

    #[test]
    fn test_string_empty_and_unicode() {
        let mut buf = Vec::new();
        StringSender.encode(&String::new(), &mut buf).unwrap();
        StringSender.encode(&"ephemeris ☉".to_string(), &mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(StringSender.decode(&mut cursor).unwrap(), "");
        assert_eq!(StringSender.decode(&mut cursor).unwrap(), "ephemeris ☉");
    }

    #[test]
    fn test_truncated_stream_is_end_of_stream() {
        let err = I64Sender.decode(&mut Cursor::new(vec![0, 0, 0])).unwrap_err();
        assert!(err.is_end_of_stream());

        let mut buf = Vec::new();
        write_len(10, &mut buf).unwrap();
        buf.extend_from_slice(b"abc");
        let err = StringSender.decode(&mut Cursor::new(buf)).unwrap_err();
        assert!(err.is_end_of_stream());
    }
}
