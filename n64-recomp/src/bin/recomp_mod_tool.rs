//! Offline mod recompiler: turns a mod symbol file and binary into a
//! loadable C translation unit resolved against the base ROM's symbols.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::process::ExitCode;

use n64_recomp::{emit, parse_mod_symbols, Context};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 5 {
        println!(
            "Usage: {} [mod symbol file] [mod binary file] [recomp symbols file] [output C file]",
            args[0]
        );
        return ExitCode::SUCCESS;
    }

    let symbol_data = match fs::read(&args[1]) {
        Ok(data) => data,
        Err(_) => {
            eprintln!("Failed to open symbol file");
            return ExitCode::FAILURE;
        }
    };
    let rom_data = match fs::read(&args[2]) {
        Ok(data) => data,
        Err(_) => {
            eprintln!("Failed to open ROM");
            return ExitCode::FAILURE;
        }
    };

    let reference_context = match Context::from_symbol_file(Path::new(&args[3]), Vec::new()) {
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

    let mut mod_context = Context::new();
    if let Err(error) = parse_mod_symbols(&symbol_data, &rom_data, &sections_by_rom, &mut mod_context)
    {
        eprintln!("Error parsing mod symbols: {error}");
        return ExitCode::FAILURE;
    }

    mod_context.import_reference_context(reference_context);
    if let Err(error) = mod_context.bind_reference_relocs() {
        eprintln!("Error resolving mod relocations: {error}");
        return ExitCode::FAILURE;
    }
    mod_context.rom = rom_data;

    let output_path = Path::new(&args[4]);
    let output_file = match File::create(output_path) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("Failed to create output file");
            return ExitCode::FAILURE;
        }
    };
    let mut writer = BufWriter::new(output_file);

    if let Err(error) = emit::write_mod_unit(&mut mod_context, &mut writer) {
        eprintln!("Error recompiling mod: {error}");
        drop(writer);
        // a half-written unit must not reach the build that consumes it
        let _ = fs::remove_file(output_path);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
