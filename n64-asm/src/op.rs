use crate::{reg, Instruction, RawInstruction};

/// Operation classification of an instruction word.
///
/// Covers the integer R4300i set the recompiler consumes. Floating-point
/// and coprocessor-2 words classify as [`Op::Invalid`]; the emitter lowers
/// those to the runtime trap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum Op {
    // SPECIAL
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Syscall,
    Break,
    Sync,
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Dsllv,
    Dsrlv,
    Dsrav,
    Mult,
    Multu,
    Div,
    Divu,
    Dmult,
    Dmultu,
    Ddiv,
    Ddivu,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Dadd,
    Daddu,
    Dsub,
    Dsubu,
    Dsll,
    Dsrl,
    Dsra,
    Dsll32,
    Dsrl32,
    Dsra32,
    // REGIMM
    Bltz,
    Bgez,
    Bltzl,
    Bgezl,
    Bltzal,
    Bgezal,
    Bltzall,
    Bgezall,
    // jumps and branches
    J,
    Jal,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Beql,
    Bnel,
    Blezl,
    Bgtzl,
    // immediate arithmetic
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Daddi,
    Daddiu,
    // loads and stores
    Lb,
    Lh,
    Lwl,
    Lw,
    Lbu,
    Lhu,
    Lwr,
    Lwu,
    Sb,
    Sh,
    Swl,
    Sw,
    Swr,
    Ld,
    Sd,
    Cache,
    // coprocessor 0
    Mfc0,
    Mtc0,
    Eret,
    // pseudo-instructions, reported only when the decoder enables them
    Nop,
    Move,
    Not,
    Beqz,
    Bnez,
    Bal,
    /// Word outside the covered set.
    Invalid,
}

/// Control-flow category of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchKind {
    /// Straight-line instruction.
    None,
    /// Conditional branch whose delay slot always executes.
    Conditional,
    /// Branch-likely: the delay slot executes only when taken.
    Likely,
    /// `j`: unconditional immediate jump.
    JumpImm,
    /// `jr`: jump through a register.
    JumpReg,
    /// `jal`: immediate call.
    JalImm,
    /// `jalr`: call through a register.
    Jalr,
    /// `eret`: return from exception, no delay slot.
    Eret,
    /// `break`.
    Break,
    /// `syscall`.
    Syscall,
}

impl Op {
    /// The control-flow category of this operation.
    pub const fn branch_kind(self) -> BranchKind {
        match self {
            Op::Beq | Op::Bne | Op::Blez | Op::Bgtz | Op::Bltz | Op::Bgez
            | Op::Bltzal | Op::Bgezal | Op::Beqz | Op::Bnez => BranchKind::Conditional,
            Op::Beql | Op::Bnel | Op::Blezl | Op::Bgtzl | Op::Bltzl | Op::Bgezl
            | Op::Bltzall | Op::Bgezall => BranchKind::Likely,
            Op::J => BranchKind::JumpImm,
            Op::Jr => BranchKind::JumpReg,
            Op::Jal | Op::Bal => BranchKind::JalImm,
            Op::Jalr => BranchKind::Jalr,
            Op::Eret => BranchKind::Eret,
            Op::Break => BranchKind::Break,
            Op::Syscall => BranchKind::Syscall,
            _ => BranchKind::None,
        }
    }

    /// Whether this operation has a delay slot.
    pub const fn has_delay_slot(self) -> bool {
        !matches!(
            self.branch_kind(),
            BranchKind::None | BranchKind::Eret | BranchKind::Break | BranchKind::Syscall
        )
    }

    /// Whether this branch links the return address (`*al*` forms).
    pub const fn is_link(self) -> bool {
        matches!(
            self,
            Op::Jal | Op::Jalr | Op::Bal | Op::Bltzal | Op::Bgezal | Op::Bltzall | Op::Bgezall
        )
    }
}

/// Decoder configuration.
///
/// Replaces the process-wide toggles of disassembler libraries with an
/// explicit value carried by the [`Decoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Report `move`/`not`/`beqz`/`bnez`/`bal` pseudo-forms instead of the
    /// underlying operations. The recompiler disables this so every word
    /// lowers through its base operation.
    pub pseudo_ops: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { pseudo_ops: true }
    }
}

/// Pure instruction classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// A decoder with the given configuration.
    pub const fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Classifies a raw word.
    pub fn decode(&self, word: RawInstruction) -> Op {
        if word == 0 {
            return Op::Nop;
        }
        let instr = Instruction::new(word);
        let op = match instr.opcode() {
            0x00 => decode_special(instr),
            0x01 => decode_regimm(instr),
            0x02 => Op::J,
            0x03 => Op::Jal,
            0x04 => Op::Beq,
            0x05 => Op::Bne,
            0x06 => Op::Blez,
            0x07 => Op::Bgtz,
            0x08 => Op::Addi,
            0x09 => Op::Addiu,
            0x0a => Op::Slti,
            0x0b => Op::Sltiu,
            0x0c => Op::Andi,
            0x0d => Op::Ori,
            0x0e => Op::Xori,
            0x0f => Op::Lui,
            0x10 => decode_cop0(instr),
            0x14 => Op::Beql,
            0x15 => Op::Bnel,
            0x16 => Op::Blezl,
            0x17 => Op::Bgtzl,
            0x18 => Op::Daddi,
            0x19 => Op::Daddiu,
            0x20 => Op::Lb,
            0x21 => Op::Lh,
            0x22 => Op::Lwl,
            0x23 => Op::Lw,
            0x24 => Op::Lbu,
            0x25 => Op::Lhu,
            0x26 => Op::Lwr,
            0x27 => Op::Lwu,
            0x28 => Op::Sb,
            0x29 => Op::Sh,
            0x2a => Op::Swl,
            0x2b => Op::Sw,
            0x2e => Op::Swr,
            0x2f => Op::Cache,
            0x37 => Op::Ld,
            0x3f => Op::Sd,
            _ => Op::Invalid,
        };
        if self.config.pseudo_ops {
            return promote_pseudo(op, instr);
        }
        op
    }
}

fn decode_special(instr: Instruction) -> Op {
    match instr.funct() {
        0x00 => Op::Sll,
        0x02 => Op::Srl,
        0x03 => Op::Sra,
        0x04 => Op::Sllv,
        0x06 => Op::Srlv,
        0x07 => Op::Srav,
        0x08 => Op::Jr,
        0x09 => Op::Jalr,
        0x0c => Op::Syscall,
        0x0d => Op::Break,
        0x0f => Op::Sync,
        0x10 => Op::Mfhi,
        0x11 => Op::Mthi,
        0x12 => Op::Mflo,
        0x13 => Op::Mtlo,
        0x14 => Op::Dsllv,
        0x16 => Op::Dsrlv,
        0x17 => Op::Dsrav,
        0x18 => Op::Mult,
        0x19 => Op::Multu,
        0x1a => Op::Div,
        0x1b => Op::Divu,
        0x1c => Op::Dmult,
        0x1d => Op::Dmultu,
        0x1e => Op::Ddiv,
        0x1f => Op::Ddivu,
        0x20 => Op::Add,
        0x21 => Op::Addu,
        0x22 => Op::Sub,
        0x23 => Op::Subu,
        0x24 => Op::And,
        0x25 => Op::Or,
        0x26 => Op::Xor,
        0x27 => Op::Nor,
        0x2a => Op::Slt,
        0x2b => Op::Sltu,
        0x2c => Op::Dadd,
        0x2d => Op::Daddu,
        0x2e => Op::Dsub,
        0x2f => Op::Dsubu,
        0x38 => Op::Dsll,
        0x3a => Op::Dsrl,
        0x3b => Op::Dsra,
        0x3c => Op::Dsll32,
        0x3e => Op::Dsrl32,
        0x3f => Op::Dsra32,
        _ => Op::Invalid,
    }
}

fn decode_regimm(instr: Instruction) -> Op {
    match instr.rt() {
        0x00 => Op::Bltz,
        0x01 => Op::Bgez,
        0x02 => Op::Bltzl,
        0x03 => Op::Bgezl,
        0x10 => Op::Bltzal,
        0x11 => Op::Bgezal,
        0x12 => Op::Bltzall,
        0x13 => Op::Bgezall,
        _ => Op::Invalid,
    }
}

fn decode_cop0(instr: Instruction) -> Op {
    match instr.rs() {
        0x00 => Op::Mfc0,
        0x04 => Op::Mtc0,
        // CO sub-ops; only eret is representable here, the TLB ops trap.
        0x10..=0x1f => match instr.funct() {
            0x18 => Op::Eret,
            _ => Op::Invalid,
        },
        _ => Op::Invalid,
    }
}

fn promote_pseudo(op: Op, instr: Instruction) -> Op {
    match op {
        Op::Or if instr.rt() == reg::ZERO => Op::Move,
        Op::Nor if instr.rt() == reg::ZERO => Op::Not,
        Op::Beq if instr.rt() == reg::ZERO => Op::Beqz,
        Op::Bne if instr.rt() == reg::ZERO => Op::Bnez,
        Op::Bgezal if instr.rs() == reg::ZERO => Op::Bal,
        _ => op,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn plain() -> Decoder {
        Decoder::new(DecoderConfig { pseudo_ops: false })
    }

    #[rstest]
    #[case(0x2628_fffc, Op::Addiu)] // addiu $t0, $s1, -4
    #[case(0x0004_10c0, Op::Sll)] // sll $v0, $a0, 3
    #[case(0x03e0_0008, Op::Jr)] // jr $ra
    #[case(0x0c00_0120, Op::Jal)] // jal 0x80000480
    #[case(0x1109_0002, Op::Beq)] // beq $t0, $t9, +2
    #[case(0x5109_0002, Op::Beql)] // beql $t0, $t9, +2
    #[case(0x0411_0004, Op::Bgezal)] // bgezal $zero, +4
    #[case(0x3c04_8020, Op::Lui)] // lui $a0, 0x8020
    #[case(0x8d09_0008, Op::Lw)] // lw $t1, 8($t0)
    #[case(0xad09_0008, Op::Sw)] // sw $t1, 8($t0)
    #[case(0xdd09_0008, Op::Ld)] // ld $t1, 8($t0)
    #[case(0x4080_6000, Op::Mtc0)] // mtc0 $zero, $12
    #[case(0x4000_6000, Op::Mfc0)] // mfc0 $zero, $12
    #[case(0x4200_0018, Op::Eret)]
    #[case(0x0000_000d, Op::Break)]
    #[case(0x0000_000c, Op::Syscall)]
    #[case(0xbd09_0008, Op::Cache)] // cache 9, 8($t0)
    #[case(0x4600_0000, Op::Invalid)] // add.s (fpu, uncovered)
    fn classifies(#[case] word: u32, #[case] expected: Op) {
        assert_eq!(plain().decode(word), expected);
    }

    #[test]
    fn zero_word_is_nop() {
        assert_eq!(plain().decode(0), Op::Nop);
        assert_eq!(Decoder::default().decode(0), Op::Nop);
    }

    #[test]
    fn pseudo_promotion_is_opt_in() {
        // or $v0, $a0, $zero
        let word = 0x0080_1025;
        assert_eq!(plain().decode(word), Op::Or);
        assert_eq!(Decoder::default().decode(word), Op::Move);

        // bgezal $zero, +4
        let word = 0x0411_0004;
        assert_eq!(plain().decode(word), Op::Bgezal);
        assert_eq!(Decoder::default().decode(word), Op::Bal);
    }

    #[rstest]
    #[case(Op::Beq, BranchKind::Conditional)]
    #[case(Op::Bgezall, BranchKind::Likely)]
    #[case(Op::J, BranchKind::JumpImm)]
    #[case(Op::Jal, BranchKind::JalImm)]
    #[case(Op::Jr, BranchKind::JumpReg)]
    #[case(Op::Jalr, BranchKind::Jalr)]
    #[case(Op::Eret, BranchKind::Eret)]
    #[case(Op::Addu, BranchKind::None)]
    fn branch_kinds(#[case] op: Op, #[case] kind: BranchKind) {
        assert_eq!(op.branch_kind(), kind);
    }

    #[test]
    fn delay_slots_follow_branch_kind() {
        assert!(Op::Beq.has_delay_slot());
        assert!(Op::Jr.has_delay_slot());
        assert!(!Op::Eret.has_delay_slot());
        assert!(!Op::Break.has_delay_slot());
        assert!(!Op::Addu.has_delay_slot());
    }
}
