//! Merges two mod symbol containers into one, against a shared reference
//! symbol file.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

use n64_recomp::{merge, parse_mod_symbols, symbols_to_bin_v1, Context};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 8 {
        println!(
            "Usage: {} <function symbol toml> <symbol file 1> <binary 1> <symbol file 2> <binary 2> <output symbol file> <output binary file>",
            args[0]
        );
        return ExitCode::SUCCESS;
    }

    let Some(sym_file_1) = read_input(&args[2]) else {
        return ExitCode::FAILURE;
    };
    let Some(binary_1) = read_input(&args[3]) else {
        return ExitCode::FAILURE;
    };
    let Some(sym_file_2) = read_input(&args[4]) else {
        return ExitCode::FAILURE;
    };
    let Some(binary_2) = read_input(&args[5]) else {
        return ExitCode::FAILURE;
    };

    let reference_context = match Context::from_symbol_file(Path::new(&args[1]), Vec::new()) {
        Ok(context) => context,
        Err(error) => {
            eprintln!("Failed to load provided function reference symbol file: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut sections_by_rom: HashMap<u32, u16> = HashMap::new();
    for (section_index, section) in reference_context.sections.iter().enumerate() {
        sections_by_rom.insert(section.rom_addr, section_index as u16);
    }

    let mut context1 = Context::new();
    if let Err(error) = parse_mod_symbols(&sym_file_1, &binary_1, &sections_by_rom, &mut context1) {
        eprintln!("Error parsing mod symbols {}: {error}", args[2]);
        return ExitCode::FAILURE;
    }
    context1.rom = binary_1;

    let mut context2 = Context::new();
    if let Err(error) = parse_mod_symbols(&sym_file_2, &binary_2, &sections_by_rom, &mut context2) {
        eprintln!("Error parsing mod symbols {}: {error}", args[4]);
        return ExitCode::FAILURE;
    }
    context2.rom = binary_2;

    let mut merged = Context::new();
    merged.import_reference_context(reference_context);
    merge::merge_into(&mut merged, &context1);
    merge::merge_into(&mut merged, &context2);

    let syms_out = symbols_to_bin_v1(&merged);

    if fs::write(&args[6], syms_out).is_err() {
        eprintln!("Failed to write symbol file to {}", args[6]);
        return ExitCode::FAILURE;
    }
    if fs::write(&args[7], &merged.rom).is_err() {
        eprintln!("Failed to write binary file to {}", args[7]);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn read_input(path: &str) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Some(data),
        Err(_) => {
            eprintln!("Error reading file {path}");
            None
        }
    }
}
