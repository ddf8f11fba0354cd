use std::io;

/// Errors surfaced while lowering a function to C.
#[derive(Debug, thiserror::Error)]
pub enum RecompError {
    /// A coprocessor-0 access to a register the runtime does not model.
    #[error("unsupported cop0 register {register} at {vram:#010x}")]
    UnsupportedCop0Register {
        /// The cop0 register number.
        register: u8,
        /// Address of the instruction.
        vram: u32,
    },
    /// A control-flow instruction sat in the delay slot of another.
    #[error("branch in delay slot at {vram:#010x}")]
    BranchInDelaySlot {
        /// Address of the delay-slot instruction.
        vram: u32,
    },
    /// A branch targeted the delay slot of another branch.
    #[error("branch into delay slot at {vram:#010x}")]
    JumpIntoDelaySlot {
        /// The targeted address.
        vram: u32,
    },
    /// A function ended in the middle of a branch/delay-slot pair.
    #[error("function {name} ends inside a delay slot")]
    TruncatedDelaySlot {
        /// Name of the offending function.
        name: String,
    },
    /// A branch or call target could not be mapped to any function.
    #[error("no function found for target {vram:#010x}")]
    UnknownTarget {
        /// The unresolved target address.
        vram: u32,
    },
    /// A reloc named a section index outside the context.
    #[error("Internal error: reloc section {section} out of range in {component}")]
    SectionOutOfRange {
        /// The offending section index.
        section: u16,
        /// Component that detected the inconsistency.
        component: &'static str,
    },
    /// The output writer failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
