//! Composition of two mod contexts.
//!
//! The merge is additive and index-remapping: the input's tables are
//! appended to the output's, with section, function, import, dependency and
//! event indices rewritten so that every index stored in the merged context
//! resolves within that context alone.

use crate::context::{Context, DependencyEvent, ImportSymbol, SECTION_ABSOLUTE, SECTION_EVENT, SECTION_IMPORT};

/// Appends `input` to `out`, remapping indices.
pub fn merge_into(out: &mut Context, input: &Context) {
    let rom_offset = out.rom.len() as u32;
    let section_offset = out.sections.len() as u16;
    let function_offset = out.functions.len();
    let event_offset = out.event_symbols.len() as u32;

    out.rom.extend_from_slice(&input.rom);

    // Dependencies dedupe by name.
    let dependency_remap: Vec<usize> = input
        .dependencies
        .iter()
        .map(|name| out.add_dependency(name))
        .collect();

    // Imports dedupe on (remapped dependency, name).
    let mut import_remap = Vec::with_capacity(input.import_symbols.len());
    for import in &input.import_symbols {
        let dependency_index = dependency_remap[import.dependency_index];
        let existing = out
            .import_symbols
            .iter()
            .position(|sym| sym.dependency_index == dependency_index && sym.name == import.name);
        import_remap.push(existing.unwrap_or_else(|| {
            out.import_symbols.push(ImportSymbol {
                name: import.name.clone(),
                dependency_index,
            });
            out.import_symbols.len() - 1
        }));
    }

    // Dependency events dedupe on (remapped dependency, name).
    let mut dependency_event_remap = Vec::with_capacity(input.dependency_events.len());
    for event in &input.dependency_events {
        let dependency_index = dependency_remap[event.dependency_index];
        let existing = out.dependency_events.iter().position(|out_event| {
            out_event.dependency_index == dependency_index
                && out_event.event_name == event.event_name
        });
        dependency_event_remap.push(existing.unwrap_or_else(|| {
            out.dependency_events.push(DependencyEvent {
                dependency_index,
                event_name: event.event_name.clone(),
            });
            out.dependency_events.len() - 1
        }));
    }

    // Sections shift into the merged ROM; their relocs are rewritten in
    // place. The merged section names are meaningless, so they are cleared.
    for (section_index, section) in input.sections.iter().enumerate() {
        let mut section = section.clone();
        section.rom_addr = section.rom_addr.wrapping_add(rom_offset);
        section.name.clear();

        for reloc in &mut section.relocs {
            if reloc.target_section == SECTION_ABSOLUTE {
                tracing::warn!(
                    section = section_index,
                    "Internal error: merger saw a reloc against an absolute symbol that \
                     should have been resolved already"
                );
                // nothing to rewrite for absolute relocs
            } else if reloc.target_section == SECTION_IMPORT {
                reloc.symbol_index = import_remap[reloc.symbol_index as usize] as u32;
            } else if reloc.target_section == SECTION_EVENT {
                reloc.symbol_index += event_offset;
            } else if reloc.reference_symbol {
                // reference section indices are shared between the inputs
            } else {
                reloc.target_section += section_offset;
            }
        }
        out.sections.push(section);
        out.section_functions.push(Vec::new());
    }

    for function in &input.functions {
        let mut function = function.clone();
        function.section_index += section_offset;
        function.rom += rom_offset;
        out.add_function(function);
    }

    for replacement in &input.replacements {
        let mut replacement = *replacement;
        replacement.func_index += function_offset;
        out.replacements.push(replacement);
    }

    for hook in &input.hooks {
        let mut hook = *hook;
        hook.func_index += function_offset;
        out.hooks.push(hook);
    }

    for callback in &input.callbacks {
        let mut callback = *callback;
        callback.function_index += function_offset;
        callback.dependency_event_index = dependency_event_remap[callback.dependency_event_index];
        out.callbacks.push(callback);
    }

    for &exported in &input.exported_funcs {
        out.exported_funcs.push(exported + function_offset);
    }

    out.event_symbols.extend(input.event_symbols.iter().cloned());
}
