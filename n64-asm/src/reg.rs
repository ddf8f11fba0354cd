//! Conventional names for the MIPS general-purpose registers.

#![allow(missing_docs)]

use crate::RegisterId;

pub const ZERO: RegisterId = 0;
pub const AT: RegisterId = 1;
pub const V0: RegisterId = 2;
pub const V1: RegisterId = 3;
pub const A0: RegisterId = 4;
pub const A1: RegisterId = 5;
pub const A2: RegisterId = 6;
pub const A3: RegisterId = 7;
pub const T0: RegisterId = 8;
pub const T1: RegisterId = 9;
pub const T2: RegisterId = 10;
pub const T3: RegisterId = 11;
pub const T4: RegisterId = 12;
pub const T5: RegisterId = 13;
pub const T6: RegisterId = 14;
pub const T7: RegisterId = 15;
pub const S0: RegisterId = 16;
pub const S1: RegisterId = 17;
pub const S2: RegisterId = 18;
pub const S3: RegisterId = 19;
pub const S4: RegisterId = 20;
pub const S5: RegisterId = 21;
pub const S6: RegisterId = 22;
pub const S7: RegisterId = 23;
pub const T8: RegisterId = 24;
pub const T9: RegisterId = 25;
pub const K0: RegisterId = 26;
pub const K1: RegisterId = 27;
pub const GP: RegisterId = 28;
pub const SP: RegisterId = 29;
pub const FP: RegisterId = 30;
pub const RA: RegisterId = 31;
