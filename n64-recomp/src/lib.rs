//! Static recompiler core for N64 ROMs and mods.
//!
//! The pipeline is built around [`Context`]: a front end populates it with
//! sections, functions and relocations, [`recompile_function`] lowers one
//! function at a time to C, and the emitters in [`emit`] produce whole
//! translation units. Mods travel as a compact binary symbol container
//! ([`symbols`]) resolved against an imported reference context; two mod
//! contexts can be composed with [`merge::merge_into`].

mod context;
mod error;
mod recompiler;

pub mod emit;
pub mod merge;
pub mod symbols;

pub use context::{
    Callback, Context, DependencyEvent, EventSymbol, Function, FunctionHook,
    FunctionReplacement, HookFlags, ImportSymbol, JumpTable, ReferenceSection,
    ReferenceSymbol, Reloc, RelocType, ReplacementFlags, Section, SymbolFileError,
    ROM_NONE, SECTION_ABSOLUTE, SECTION_EVENT, SECTION_IMPORT, SECTION_NONE,
};
pub use error::RecompError;
pub use recompiler::recompile_function;
pub use symbols::{parse_mod_symbols, symbols_to_bin_v1, ModSymbolsError};
