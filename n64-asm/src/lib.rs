//! Instruction decoding for the MIPS R4300i family.
//!
//! The decoder is pure: it classifies a 32-bit big-endian instruction word
//! into an [`Op`], and [`Instruction`] exposes the operand fields of the
//! word. Neither touches any global state; the only configuration is the
//! explicit [`DecoderConfig`] passed to [`Decoder`].

#![warn(missing_docs)]

mod instruction;
mod op;

pub mod reg;

pub use instruction::{Instruction, RawInstruction, RegisterId};
pub use op::{BranchKind, Decoder, DecoderConfig, Op};
