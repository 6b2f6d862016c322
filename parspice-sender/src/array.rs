//! Array and matrix senders
//!
//! An [`ArraySender`] works in one of two modes:
//!
//! * **fixed-length**: the length is declared identically on both ends and is
//!   never transmitted. Encoding a value of any other length is rejected; the
//!   reading end has no way to notice such a mismatch.
//! * **dynamic-length**: every value is prefixed with its element count as a
//!   big-endian `u32`, trading four bytes per value for flexibility.
//!
//! Matrices are arrays of arrays, so each dimension picks its own mode.

use std::io::{Read, Write};

use crate::contract::{read_len, write_len, Sender};
use crate::error::{SenderError, SenderResult};

/// Upper bound on capacity reserved from an untrusted length prefix
const PREALLOC_LIMIT: usize = 4096;

/// Sender for `Vec<T>` built on an element sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArraySender<S> {
    element: S,
    length: Option<usize>,
}

/// Sender for nested vectors (rows of elements)
pub type MatrixSender<S> = ArraySender<ArraySender<S>>;

impl<S> ArraySender<S> {
    /// Arrays of exactly `length` elements; no length goes on the wire
    pub fn fixed(element: S, length: usize) -> Self {
        Self {
            element,
            length: Some(length),
        }
    }

    /// Arrays of any length, each prefixed by its element count
    pub fn dynamic(element: S) -> Self {
        Self {
            element,
            length: None,
        }
    }

    /// Declared length, if this sender is fixed-length
    pub fn length(&self) -> Option<usize> {
        self.length
    }

    pub fn is_fixed(&self) -> bool {
        self.length.is_some()
    }

    /// Sender used for each element
    pub fn element(&self) -> &S {
        &self.element
    }
}

impl<S: Clone> ArraySender<ArraySender<S>> {
    /// `rows` x `cols` matrix with no length information on the wire
    pub fn fixed_matrix(element: S, rows: usize, cols: usize) -> Self {
        ArraySender::fixed(ArraySender::fixed(element, cols), rows)
    }

    /// Fixed number of rows, each row carrying its own length prefix
    pub fn fixed_rows(element: S, rows: usize) -> Self {
        ArraySender::fixed(ArraySender::dynamic(element), rows)
    }

    /// Both dimensions transmitted; rows may be ragged
    pub fn dynamic_matrix(element: S) -> Self {
        ArraySender::dynamic(ArraySender::dynamic(element))
    }
}

impl<T, S> Sender<Vec<T>> for ArraySender<S>
where
    S: Sender<T>,
{
    fn encode(&self, value: &Vec<T>, writer: &mut dyn Write) -> SenderResult<()> {
        match self.length {
            Some(expected) if expected != value.len() => {
                return Err(SenderError::LengthMismatch {
                    expected,
                    actual: value.len(),
                });
            }
            Some(_) => {}
            None => write_len(value.len(), writer)?,
        }

        for item in value {
            self.element.encode(item, writer)?;
        }
        Ok(())
    }

    fn decode(&self, reader: &mut dyn Read) -> SenderResult<Vec<T>> {
        let len = match self.length {
            Some(len) => len,
            None => read_len(reader)?,
        };

        let mut values = Vec::with_capacity(len.min(PREALLOC_LIMIT));
        for _ in 0..len {
            values.push(self.element.decode(reader)?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{BoolSender, F64Sender, I32Sender, I64Sender};
    use proptest::prelude::*;
    use std::io::Cursor;

    fn roundtrip<T, S: Sender<T>>(sender: &S, value: &T) -> (T, usize) {
        let mut buf = Vec::new();
        sender.encode(value, &mut buf).unwrap();
        let written = buf.len();
        let mut cursor = Cursor::new(buf);
        let decoded = sender.decode(&mut cursor).unwrap();
        assert_eq!(cursor.position() as usize, written, "sender left unread bytes");
        (decoded, written)
    }

    #[test]
    fn test_fixed_array_sends_no_length() {
        let sender = ArraySender::fixed(I32Sender, 3);
        let (decoded, written) = roundtrip(&sender, &vec![1, -2, 3]);
        assert_eq!(decoded, vec![1, -2, 3]);
        assert_eq!(written, 12);
    }

    #[test]
    fn test_fixed_array_of_length_zero() {
        let sender = ArraySender::fixed(I32Sender, 0);
        let (decoded, written) = roundtrip(&sender, &Vec::<i32>::new());
        assert!(decoded.is_empty());
        assert_eq!(written, 0);
    }

    #[test]
    fn test_fixed_array_rejects_other_lengths() {
        let sender = ArraySender::fixed(I32Sender, 3);
        let mut buf = Vec::new();

        let err = sender.encode(&vec![1, 2], &mut buf).unwrap_err();
        assert!(matches!(err, SenderError::LengthMismatch { expected: 3, actual: 2 }));
        assert!(buf.is_empty(), "nothing may be written for a rejected value");

        assert!(sender.encode(&vec![1, 2, 3, 4], &mut buf).is_err());
    }

    #[test]
    fn test_dynamic_array_empty_and_single() {
        let sender = ArraySender::dynamic(BoolSender);

        let (decoded, written) = roundtrip(&sender, &Vec::<bool>::new());
        assert!(decoded.is_empty());
        assert_eq!(written, 4);

        let (decoded, written) = roundtrip(&sender, &vec![true]);
        assert_eq!(decoded, vec![true]);
        assert_eq!(written, 5);
    }

    #[test]
    fn test_dynamic_arrays_share_one_stream() {
        let sender = ArraySender::dynamic(I64Sender);
        let mut buf = Vec::new();
        sender.encode(&vec![1i64, 2, 3], &mut buf).unwrap();
        sender.encode(&Vec::<i64>::new(), &mut buf).unwrap();
        sender.encode(&vec![42i64], &mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let first: Vec<i64> = sender.decode(&mut cursor).unwrap();
        let second: Vec<i64> = sender.decode(&mut cursor).unwrap();
        let third: Vec<i64> = sender.decode(&mut cursor).unwrap();
        assert_eq!(first, vec![1, 2, 3]);
        assert!(second.is_empty());
        assert_eq!(third, vec![42]);
    }

    #[test]
    fn test_fixed_matrix() {
        let sender = MatrixSender::fixed_matrix(F64Sender, 2, 2);
        let matrix = vec![vec![1.1, 2.2], vec![1.1, 2.2]];
        let (decoded, written) = roundtrip(&sender, &matrix);
        assert_eq!(decoded, matrix);
        assert_eq!(written, 32);
    }

    #[test]
    fn test_fixed_matrix_rejects_bad_row() {
        let sender = MatrixSender::fixed_matrix(F64Sender, 2, 2);
        let mut buf = Vec::new();
        let err = sender
            .encode(&vec![vec![1.0, 2.0], vec![3.0]], &mut buf)
            .unwrap_err();
        assert!(matches!(err, SenderError::LengthMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_ragged_dynamic_matrix() {
        let sender = MatrixSender::dynamic_matrix(I32Sender);
        let matrix = vec![vec![], vec![1], vec![2, 3, 4]];
        let (decoded, _) = roundtrip(&sender, &matrix);
        assert_eq!(decoded, matrix);
    }

    #[test]
    fn test_dynamic_matrix_with_zero_rows() {
        let sender = MatrixSender::dynamic_matrix(I32Sender);
        let (decoded, written) = roundtrip(&sender, &Vec::<Vec<i32>>::new());
        assert!(decoded.is_empty());
        // only the row count
        assert_eq!(written, 4);
    }

    #[test]
    fn test_fixed_rows_with_empty_rows() {
        let sender = MatrixSender::fixed_rows(I32Sender, 3);
        let matrix: Vec<Vec<i32>> = vec![vec![], vec![], vec![]];
        let (decoded, written) = roundtrip(&sender, &matrix);
        assert_eq!(decoded, matrix);
        // one zero prefix per row
        assert_eq!(written, 3 * 4);
    }

    #[test]
    fn test_fixed_rows_dynamic_cols() {
        let sender = MatrixSender::fixed_rows(I32Sender, 2);
        let (decoded, written) = roundtrip(&sender, &vec![vec![7], vec![8, 9]]);
        assert_eq!(decoded, vec![vec![7], vec![8, 9]]);
        // two row prefixes, three elements
        assert_eq!(written, 2 * 4 + 3 * 4);
    }

    #[test]
    fn test_truncated_dynamic_array() {
        let sender = ArraySender::dynamic(I32Sender);
        let mut buf = Vec::new();
        sender.encode(&vec![1i32, 2, 3], &mut buf).unwrap();
        buf.truncate(buf.len() - 2);
        let result: SenderResult<Vec<i32>> = sender.decode(&mut Cursor::new(buf));
        assert!(result.unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_mismatched_fixed_lengths_desynchronise() {
        // Writer and reader disagree on the declared length: the reader still
        // "succeeds", it just reads the wrong values.
        let writer = ArraySender::fixed(I32Sender, 3);
        let reader = ArraySender::fixed(I32Sender, 2);

        let mut buf = Vec::new();
        writer.encode(&vec![1, 2, 3], &mut buf).unwrap();
        writer.encode(&vec![4, 5, 6], &mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let first: Vec<i32> = reader.decode(&mut cursor).unwrap();
        let second: Vec<i32> = reader.decode(&mut cursor).unwrap();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![3, 4]);
    }

    proptest! {
        #[test]
        fn prop_dynamic_array_roundtrip(values in proptest::collection::vec(any::<i64>(), 0..64)) {
            let sender = ArraySender::dynamic(I64Sender);
            let mut buf = Vec::new();
            sender.encode(&values, &mut buf).unwrap();
            prop_assert_eq!(buf.len(), 4 + 8 * values.len());
            let decoded: Vec<i64> = sender.decode(&mut Cursor::new(buf)).unwrap();
            prop_assert_eq!(decoded, values);
        }
    }
}
