//! Behavioral reference for the RSP vector unit.
//!
//! [`Vpu`] models the coprocessor state: thirty-two 128-bit registers split
//! into eight 16-bit lanes, the per-lane 48-bit accumulator, the VCO/VCC/VCE
//! flag registers and the divide unit. Every vector operation is a method
//! taking the lane selector `e` as a runtime parameter.
//!
//! The methods on [`Vpu`] are the scalar reference. The [`simd`] module
//! provides an SSE4.1 fast path for the ALU subset; it is required to match
//! the reference bit-for-bit and the test suite holds it to that.

mod mem;
mod tables;
mod v128;
mod vpu;

#[cfg(target_arch = "x86_64")]
pub mod simd;

pub use v128::{LaneMask, V128};
pub use vpu::{Acc, Vpu};

/// Size in bytes of the RSP data memory addressed by the vector load/store
/// operations. Effective addresses wrap at this boundary.
pub const DMEM_SIZE: usize = 4096;
