//! Composite value shapes
//!
//! Composite shapes are sequences of primitive encode/decode calls in a fixed
//! field order. There is no schema negotiation: a reader that visits the
//! fields in another order than the writer desynchronises the stream without
//! any error.
//!
//! ```
//! use std::io::{Read, Write};
//! use parspice_sender::{F64Sender, I32Sender, Sender, SenderResult};
//!
//! struct StateVector {
//!     epoch: i32,
//!     position: f64,
//! }
//!
//! struct StateVectorSender;
//!
//! impl Sender<StateVector> for StateVectorSender {
//!     fn encode(&self, value: &StateVector, writer: &mut dyn Write) -> SenderResult<()> {
//!         I32Sender.encode(&value.epoch, writer)?;
//!         F64Sender.encode(&value.position, writer)
//!     }
//!
//!     fn decode(&self, reader: &mut dyn Read) -> SenderResult<StateVector> {
//!         let epoch = I32Sender.decode(reader)?;
//!         let position = F64Sender.decode(reader)?;
//!         Ok(StateVector { epoch, position })
//!     }
//! }
//! ```

use std::io::{Read, Write};

use crate::contract::Sender;
use crate::error::SenderResult;

/// Sender for a two-field tuple, first field first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairSender<A, B> {
    first: A,
    second: B,
}

impl<A, B> PairSender<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<TA, TB, A, B> Sender<(TA, TB)> for PairSender<A, B>
where
    A: Sender<TA>,
    B: Sender<TB>,
{
    fn encode(&self, value: &(TA, TB), writer: &mut dyn Write) -> SenderResult<()> {
        self.first.encode(&value.0, writer)?;
        self.second.encode(&value.1, writer)
    }

    fn decode(&self, reader: &mut dyn Read) -> SenderResult<(TA, TB)> {
        let first = self.first.decode(reader)?;
        let second = self.second.decode(reader)?;
        Ok((first, second))
    }
}
