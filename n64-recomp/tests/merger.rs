//! Merger laws: identity, index shifting, dedupe.

mod common;

use common::*;
use n64_recomp::{
    merge::merge_into, Callback, Context, DependencyEvent, EventSymbol, Function,
    FunctionReplacement, ImportSymbol, Reloc, RelocType, ReplacementFlags, Section,
    SECTION_EVENT, SECTION_IMPORT, SECTION_NONE,
};

fn mod_context(import_name: &str) -> Context {
    let mut context = Context::new();
    context.rom = [JR_RA, NOP]
        .iter()
        .flat_map(|word| word.to_be_bytes())
        .collect();
    context.sections.push(Section {
        rom_addr: 0,
        ram_addr: 0x8040_0000,
        size: 8,
        name: String::new(),
        bss_section_index: SECTION_NONE,
        relocs: vec![
            Reloc {
                offset: 0,
                target_section: SECTION_IMPORT,
                target_section_offset: 0,
                symbol_index: 0,
                reloc_type: RelocType::Mips26,
                reference_symbol: false,
            },
            Reloc {
                offset: 4,
                target_section: 0,
                target_section_offset: 0,
                symbol_index: 0,
                reloc_type: RelocType::MipsHi16,
                reference_symbol: false,
            },
            Reloc {
                offset: 4,
                target_section: SECTION_EVENT,
                target_section_offset: 0,
                symbol_index: 0,
                reloc_type: RelocType::Mips26,
                reference_symbol: false,
            },
        ],
    });
    context.section_functions.push(Vec::new());
    context.add_function(Function {
        vram: 0x8040_0000,
        rom: 0,
        words: vec![JR_RA, NOP],
        name: String::new(),
        section_index: 0,
        ..Function::default()
    });
    context.add_dependency("core");
    context.import_symbols.push(ImportSymbol {
        name: import_name.into(),
        dependency_index: 0,
    });
    context.dependency_events.push(DependencyEvent {
        dependency_index: 0,
        event_name: "tick".into(),
    });
    context.event_symbols.push(EventSymbol {
        name: "ev".into(),
    });
    context.callbacks.push(Callback {
        function_index: 0,
        dependency_event_index: 0,
    });
    context.replacements.push(FunctionReplacement {
        func_index: 0,
        target_vram: 0x8002_0000,
        flags: ReplacementFlags::empty(),
    });
    context
}

#[test]
fn merging_an_empty_context_is_the_identity() {
    let mut merged = Context::new();
    merged.import_reference_context(reference_context());
    let snapshot = merged.clone();
    merge_into(&mut merged, &Context::new());
    assert_eq!(merged, snapshot);
}

#[test]
fn merge_shifts_sections_functions_and_rom() {
    let mut merged = Context::new();
    merged.import_reference_context(reference_context());
    let mod1 = mod_context("import_foo");
    let mod2 = mod_context("import_foo");
    merge_into(&mut merged, &mod1);
    merge_into(&mut merged, &mod2);

    assert_eq!(merged.sections.len(), 2);
    assert_eq!(merged.functions.len(), 2);
    assert_eq!(merged.dependencies.len(), 1);
    assert_eq!(merged.import_symbols.len(), 1);

    assert_eq!(merged.functions[0].section_index, 0);
    assert_eq!(merged.functions[1].section_index, 1);
    assert_eq!(merged.functions[1].rom, mod1.rom.len() as u32);
    assert_eq!(merged.rom.len(), mod1.rom.len() + mod2.rom.len());
    assert_eq!(merged.sections[1].rom_addr, mod1.rom.len() as u32);

    // both functions start at the same vram; overlays keep duplicates
    assert_eq!(merged.functions_by_vram[&0x8040_0000], vec![0, 1]);
    assert_eq!(merged.section_functions[0], vec![0]);
    assert_eq!(merged.section_functions[1], vec![1]);
}

#[test]
fn merge_rewrites_reloc_indices() {
    let mut merged = Context::new();
    merged.import_reference_context(reference_context());
    merge_into(&mut merged, &mod_context("import_foo"));
    merge_into(&mut merged, &mod_context("import_bar"));

    // different import names survive as distinct symbols
    assert_eq!(merged.import_symbols.len(), 2);

    let second = &merged.sections[1];
    // the import reloc follows the remapped import table
    assert_eq!(second.relocs[0].target_section, SECTION_IMPORT);
    assert_eq!(second.relocs[0].symbol_index, 1);
    // the regular reloc shifts with the section table
    assert_eq!(second.relocs[1].target_section, 1);
    // the event reloc shifts by the first mod's event count
    assert_eq!(second.relocs[2].target_section, SECTION_EVENT);
    assert_eq!(second.relocs[2].symbol_index, 1);
    assert_eq!(merged.event_symbols.len(), 2);
}

#[test]
fn merge_rewrites_function_and_event_tables() {
    let mut merged = Context::new();
    merged.import_reference_context(reference_context());
    merge_into(&mut merged, &mod_context("import_foo"));
    merge_into(&mut merged, &mod_context("import_foo"));

    assert_eq!(merged.replacements.len(), 2);
    assert_eq!(merged.replacements[0].func_index, 0);
    assert_eq!(merged.replacements[1].func_index, 1);

    // "core"/"tick" dedupes to one dependency event; both callbacks use it
    assert_eq!(merged.dependency_events.len(), 1);
    assert_eq!(merged.callbacks.len(), 2);
    assert_eq!(merged.callbacks[1].function_index, 1);
    assert_eq!(merged.callbacks[1].dependency_event_index, 0);
}

#[test]
fn merged_output_round_trips_through_the_codec() {
    let mut merged = Context::new();
    merged.import_reference_context(reference_context());
    merge_into(&mut merged, &mod_context("import_foo"));
    merge_into(&mut merged, &mod_context("import_bar"));

    let data = n64_recomp::symbols_to_bin_v1(&merged);
    let mut sections_by_rom = std::collections::HashMap::new();
    sections_by_rom.insert(0x2000, 0);
    let mut parsed = Context::new();
    n64_recomp::parse_mod_symbols(&data, &merged.rom, &sections_by_rom, &mut parsed).unwrap();

    assert_eq!(parsed.sections, merged.sections);
    assert_eq!(parsed.import_symbols, merged.import_symbols);
    assert_eq!(parsed.event_symbols, merged.event_symbols);
    assert_eq!(parsed.callbacks, merged.callbacks);
    assert_eq!(parsed.replacements, merged.replacements);
}
