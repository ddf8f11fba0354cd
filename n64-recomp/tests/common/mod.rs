#![allow(dead_code)]

use n64_recomp::{Context, Function, Section, SECTION_NONE};

pub const TEXT_VRAM: u32 = 0x8000_0400;
pub const TEXT_ROM: u32 = 0x1000;

pub const JR_RA: u32 = 0x03e0_0008;
pub const NOP: u32 = 0;

/// A context with a single `.text` section holding one function.
pub fn text_context(words: &[u32]) -> Context {
    let mut context = Context::new();
    context.sections.push(Section {
        rom_addr: TEXT_ROM,
        ram_addr: TEXT_VRAM,
        size: (words.len() * 4) as u32,
        name: ".text".into(),
        bss_section_index: SECTION_NONE,
        relocs: Vec::new(),
    });
    context.section_functions.push(Vec::new());
    context.add_function(Function {
        vram: TEXT_VRAM,
        rom: TEXT_ROM,
        words: words.to_vec(),
        name: "test_func".into(),
        section_index: 0,
        ..Function::default()
    });
    context
}

/// A reference context with one text section at `0x80200000`.
pub fn reference_context() -> Context {
    let mut reference = Context::new();
    reference.sections.push(Section {
        rom_addr: 0x2000,
        ram_addr: 0x8020_0000,
        size: 0x100,
        name: ".text".into(),
        bss_section_index: SECTION_NONE,
        relocs: Vec::new(),
    });
    reference.section_functions.push(Vec::new());
    reference.add_function(Function {
        vram: 0x8020_0010,
        rom: 0x2010,
        words: vec![JR_RA, NOP],
        name: "func_80200010".into(),
        section_index: 0,
        ..Function::default()
    });
    reference
}

pub fn recompile(context: &Context, func_index: usize, is_mod: bool) -> String {
    let mut out = Vec::new();
    let mut statics = vec![Vec::new(); context.sections.len()];
    n64_recomp::recompile_function(context, func_index, &mut out, &mut statics, is_mod)
        .expect("recompilation succeeds");
    String::from_utf8(out).expect("emitted C is utf-8")
}

/// Index of `needle` in `haystack`, with a readable failure.
pub fn offset_of(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("emitted C is missing {needle:?}:\n{haystack}"))
}
