//! Whole-ROM and mod translation-unit emitters.
//!
//! Both emitters are two-pass: pass one assigns every unnamed (or
//! non-exported) function its emitted identifier and writes prototypes, so
//! pass two can emit call sites against a consistent namespace.

use std::collections::HashSet;
use std::io::Write;

use itertools::Itertools;

use crate::context::{Context, RelocType};
use crate::recompiler::recompile_function;
use crate::RecompError;

/// Emits a loadable mod translation unit.
///
/// The prelude exports the API version and the tables the runtime fills in
/// at load time: imported function slots, reference symbol slots, section
/// address tables, the event index base, and the runtime service pointers.
/// Non-exported functions are renamed `mod_func_<index>` in pass one.
pub fn write_mod_unit(context: &mut Context, writer: &mut dyn Write) -> Result<(), RecompError> {
    writeln!(writer, "#include \"mod_recomp.h\"")?;
    writeln!(writer)?;
    writeln!(writer, "RECOMP_EXPORT uint32_t recomp_api_version = 1;")?;
    writeln!(writer)?;
    writeln!(writer, "// Values populated by the runtime:")?;
    writeln!(writer)?;

    // Imported function slots, aliased by name.
    writeln!(
        writer,
        "// Array of pointers to imported functions with defines to alias their names."
    )?;
    let num_imports = context.import_symbols.len();
    for (import_index, import) in context.import_symbols.iter().enumerate() {
        writeln!(writer, "#define {} imported_funcs[{import_index}]", import.name)?;
    }
    writeln!(
        writer,
        "RECOMP_EXPORT recomp_func_t* imported_funcs[{}] = {{0}};",
        num_imports.max(1)
    )?;
    writeln!(writer)?;

    // Reference symbol slots. Every R_MIPS_26 reference reloc gets a slot;
    // only the first slot of a repeated name is aliased, the later ones are
    // reached through it.
    writeln!(
        writer,
        "// Array of pointers to functions from the original ROM with defines to alias their names."
    )?;
    let mut written_names: HashSet<&str> = HashSet::new();
    let mut num_reference_symbols = 0usize;
    for section in &context.sections {
        for reloc in &section.relocs {
            if reloc.reloc_type == RelocType::Mips26
                && reloc.reference_symbol
                && context.is_regular_reference_section(reloc.target_section)
            {
                let symbol = context.reference_symbol(reloc.symbol_index);
                if written_names.insert(symbol.name.as_str()) {
                    writeln!(
                        writer,
                        "#define {} reference_symbol_funcs[{num_reference_symbols}]",
                        symbol.name
                    )?;
                }
                num_reference_symbols += 1;
            }
        }
    }
    writeln!(
        writer,
        "RECOMP_EXPORT recomp_func_t* reference_symbol_funcs[{}] = {{0}};",
        num_reference_symbols.max(1)
    )?;
    writeln!(writer)?;

    writeln!(writer, "// Base global event index for this mod's events.")?;
    writeln!(writer, "RECOMP_EXPORT uint32_t base_event_index;")?;
    writeln!(writer)?;
    writeln!(writer, "// Pointer to the runtime function for triggering events.")?;
    writeln!(
        writer,
        "RECOMP_EXPORT void (*recomp_trigger_event)(uint8_t* rdram, recomp_context* ctx, uint32_t) = NULL;"
    )?;
    writeln!(writer)?;
    writeln!(
        writer,
        "// Pointer to the runtime function for looking up functions from vram address."
    )?;
    writeln!(
        writer,
        "RECOMP_EXPORT recomp_func_t* (*get_function)(int32_t vram) = NULL;"
    )?;
    writeln!(writer)?;
    writeln!(
        writer,
        "// Pointer to the runtime function for performing a cop0 status register write."
    )?;
    writeln!(
        writer,
        "RECOMP_EXPORT void (*cop0_status_write)(recomp_context* ctx, gpr value) = NULL;"
    )?;
    writeln!(writer)?;
    writeln!(
        writer,
        "// Pointer to the runtime function for performing a cop0 status register read."
    )?;
    writeln!(
        writer,
        "RECOMP_EXPORT gpr (*cop0_status_read)(recomp_context* ctx) = NULL;"
    )?;
    writeln!(writer)?;
    writeln!(writer, "// Pointer to the runtime function for reporting switch case errors.")?;
    writeln!(
        writer,
        "RECOMP_EXPORT void (*switch_error)(const char* func, uint32_t vram, uint32_t jtbl) = NULL;"
    )?;
    writeln!(writer)?;
    writeln!(writer, "// Pointer to the runtime function for handling the break instruction.")?;
    writeln!(writer, "RECOMP_EXPORT void (*do_break)(uint32_t vram) = NULL;")?;
    writeln!(writer)?;
    writeln!(
        writer,
        "// Pointer to the runtime's array of loaded section addresses for the base ROM."
    )?;
    writeln!(
        writer,
        "RECOMP_EXPORT int32_t* reference_section_addresses = NULL;"
    )?;
    writeln!(writer)?;
    writeln!(writer, "// Array of this mod's loaded section addresses.")?;
    writeln!(
        writer,
        "RECOMP_EXPORT int32_t section_addresses[{}] = {{0}};",
        context.sections.len().max(1)
    )?;
    writeln!(writer)?;

    // Pass one: name everything, emit prototypes. Exports keep the names
    // the symbol file gave them.
    let export_indices: HashSet<usize> = context.exported_funcs.iter().copied().collect();
    writeln!(writer, "// Function prototypes.")?;
    for func_index in 0..context.functions.len() {
        if !export_indices.contains(&func_index) {
            context.functions[func_index].name = format!("mod_func_{func_index}");
        }
        writeln!(
            writer,
            "RECOMP_FUNC void {}(uint8_t* rdram, recomp_context* ctx);",
            context.functions[func_index].name
        )?;
    }
    writeln!(writer)?;

    // Pass two: bodies.
    let mut static_funcs_by_section = vec![Vec::new(); context.sections.len()];
    for func_index in 0..context.functions.len() {
        let func = &context.functions[func_index];
        if func.ignored || func.reimplemented {
            continue;
        }
        recompile_function(context, func_index, writer, &mut static_funcs_by_section, true)?;
    }

    Ok(())
}

/// Emits a whole-ROM translation unit with statically folded addressing.
pub fn write_rom_unit(context: &mut Context, writer: &mut dyn Write) -> Result<(), RecompError> {
    writeln!(writer, "#include \"recomp.h\"")?;
    writeln!(writer)?;

    // Pass one: make sure every function has an identifier.
    writeln!(writer, "// Function prototypes.")?;
    for function in &mut context.functions {
        if function.name.is_empty() {
            function.name = format!("func_{:08X}", function.vram);
        }
        writeln!(
            writer,
            "void {}(uint8_t* rdram, recomp_context* ctx);",
            function.name
        )?;
    }
    writeln!(writer)?;

    // Pass two: bodies, then any statics the bodies called into.
    let mut static_funcs_by_section = vec![Vec::new(); context.sections.len()];
    for func_index in 0..context.functions.len() {
        let func = &context.functions[func_index];
        if func.ignored || func.reimplemented {
            continue;
        }
        recompile_function(context, func_index, writer, &mut static_funcs_by_section, false)?;
    }

    for (section_index, statics) in static_funcs_by_section.iter().enumerate() {
        for vram in statics.iter().copied().sorted().dedup() {
            tracing::warn!(
                section = section_index,
                "call target {vram:#010x} resolved to no known function"
            );
        }
    }

    Ok(())
}
