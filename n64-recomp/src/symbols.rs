//! Mod symbol container, binary format v1.
//!
//! The container records the mod-specific tables plus per-section
//! relocations, indexed against the reference context, the import table, or
//! the event table. All multi-byte fields are little-endian. Layout:
//!
//! ```text
//! magic   u32 = "NSYM"            version u32 = 1
//! counts  u32 x 9                 sections, dependencies, imports,
//!                                 dependency events, events, callbacks,
//!                                 exports, replacements, hooks
//! section rom u32, vram u32, size u32, funcs u32, relocs u32
//!   func  section_offset u32, size u32
//!   reloc section_offset u32, type u8, flags u8 (bit 0 = reference),
//!         target_section u16, target_rom u32, target_section_offset u32,
//!         symbol_index u32
//! dependency       name
//! import           dependency u32, name
//! dependency event dependency u32, name
//! event            name
//! callback         dependency_event u32, function u32
//! export           function u32, name
//! replacement      function u32, target_vram u32, flags u32
//! hook             function u32, target_vram u32, flags u32
//! ```
//!
//! Strings are a `u32` length followed by UTF-8 bytes. Reference relocs
//! carry the ROM address of their reference section; the reader maps it
//! back through the caller's `sections_by_rom` table. Parsing is a single
//! pass and every offset is validated against the buffer before use.

use std::collections::{HashMap, HashSet};

use crate::context::{
    Callback, Context, DependencyEvent, EventSymbol, Function, FunctionHook,
    FunctionReplacement, HookFlags, ImportSymbol, Reloc, RelocType, ReplacementFlags, Section,
    ROM_NONE, SECTION_ABSOLUTE, SECTION_EVENT, SECTION_IMPORT, SECTION_NONE,
};

const MAGIC: u32 = u32::from_le_bytes(*b"NSYM");
const VERSION: u32 = 1;

const RELOC_FLAG_REFERENCE: u8 = 1 << 0;

/// Failure modes of the symbol container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModSymbolsError {
    /// The magic or the fixed header is damaged.
    #[error("malformed mod symbol header")]
    MalformedHeader,
    /// The container uses a format version this reader does not know.
    #[error("unknown mod symbol format version")]
    UnknownVersion,
    /// A reloc named a section absent from this mod or the reference.
    #[error("unknown section in mod symbol data")]
    UnknownSection,
    /// A reloc carried an unknown relocation type.
    #[error("unknown relocation type in mod symbol data")]
    UnknownRelocType,
    /// A function index points outside the function table.
    #[error("unknown symbol in mod symbol data")]
    UnknownSymbol,
    /// An import index points outside the import table.
    #[error("unknown import in mod symbol data")]
    UnknownImport,
    /// An event index points outside the event tables.
    #[error("unknown event in mod symbol data")]
    UnknownEvent,
    /// A dependency index points outside the dependency table.
    #[error("unknown dependency in mod symbol data")]
    UnknownDependency,
    /// A reference symbol could not be resolved against the base ROM.
    #[error("unresolved reference symbol")]
    UnresolvedReference,
    /// A function was exported twice.
    #[error("duplicate exported function")]
    DuplicateExport,
    /// The buffer ended before the recorded tables did.
    #[error("truncated mod symbol data")]
    Truncated,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ModSymbolsError> {
        let end = self.pos.checked_add(len).ok_or(ModSymbolsError::Truncated)?;
        if end > self.data.len() {
            return Err(ModSymbolsError::Truncated);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ModSymbolsError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ModSymbolsError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, ModSymbolsError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self) -> Result<String, ModSymbolsError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ModSymbolsError::MalformedHeader)
    }
}

struct Counts {
    sections: u32,
    dependencies: u32,
    imports: u32,
    dependency_events: u32,
    events: u32,
    callbacks: u32,
    exports: u32,
    replacements: u32,
    hooks: u32,
}

/// Parses a v1 symbol container into `context`.
///
/// `rom` is the mod binary the function words are copied from and
/// `sections_by_rom` maps reference-section ROM addresses to reference
/// section indices (built from the reference context by the caller).
pub fn parse_mod_symbols(
    data: &[u8],
    rom: &[u8],
    sections_by_rom: &HashMap<u32, u16>,
    context: &mut Context,
) -> Result<(), ModSymbolsError> {
    if data.len() < 8 {
        return Err(ModSymbolsError::MalformedHeader);
    }
    let mut reader = Reader::new(data);
    if reader.u32()? != MAGIC {
        return Err(ModSymbolsError::MalformedHeader);
    }
    if reader.u32()? != VERSION {
        return Err(ModSymbolsError::UnknownVersion);
    }

    let counts = Counts {
        sections: reader.u32()?,
        dependencies: reader.u32()?,
        imports: reader.u32()?,
        dependency_events: reader.u32()?,
        events: reader.u32()?,
        callbacks: reader.u32()?,
        exports: reader.u32()?,
        replacements: reader.u32()?,
        hooks: reader.u32()?,
    };

    for section_index in 0..counts.sections {
        let rom_addr = reader.u32()?;
        let ram_addr = reader.u32()?;
        let size = reader.u32()?;
        let func_count = reader.u32()?;
        let reloc_count = reader.u32()?;

        let mut section = Section {
            rom_addr,
            ram_addr,
            size,
            name: String::new(),
            bss_section_index: SECTION_NONE,
            relocs: Vec::new(),
        };

        let mut functions = Vec::with_capacity(func_count as usize);
        for _ in 0..func_count {
            let section_offset = reader.u32()?;
            let func_size = reader.u32()?;
            if func_size % 4 != 0 {
                return Err(ModSymbolsError::MalformedHeader);
            }
            let func_rom = rom_addr.wrapping_add(section_offset);
            let words = if rom_addr == ROM_NONE {
                Vec::new()
            } else {
                let start = func_rom as usize;
                let end = start
                    .checked_add(func_size as usize)
                    .ok_or(ModSymbolsError::Truncated)?;
                if end > rom.len() {
                    return Err(ModSymbolsError::Truncated);
                }
                rom[start..end]
                    .chunks_exact(4)
                    .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .collect()
            };
            functions.push(Function {
                vram: ram_addr.wrapping_add(section_offset),
                rom: func_rom,
                words,
                name: String::new(),
                section_index: section_index as u16,
                ..Function::default()
            });
        }

        for _ in 0..reloc_count {
            let section_offset = reader.u32()?;
            let raw_type = reader.u8()?;
            let flags = reader.u8()?;
            let stored_section = reader.u16()?;
            let target_rom = reader.u32()?;
            let target_section_offset = reader.u32()?;
            let symbol_index = reader.u32()?;

            let reloc_type =
                RelocType::from_u8(raw_type).ok_or(ModSymbolsError::UnknownRelocType)?;
            let reference_symbol = flags & RELOC_FLAG_REFERENCE != 0;

            let target_section = if reference_symbol {
                *sections_by_rom
                    .get(&target_rom)
                    .ok_or(ModSymbolsError::UnknownSection)?
            } else {
                match stored_section {
                    SECTION_ABSOLUTE | SECTION_IMPORT | SECTION_EVENT => stored_section,
                    index if (index as u32) < counts.sections => index,
                    _ => return Err(ModSymbolsError::UnknownSection),
                }
            };
            if target_section == SECTION_IMPORT && symbol_index >= counts.imports {
                return Err(ModSymbolsError::UnknownImport);
            }
            if target_section == SECTION_EVENT && symbol_index >= counts.events {
                return Err(ModSymbolsError::UnknownEvent);
            }

            section.relocs.push(Reloc {
                offset: section_offset,
                target_section,
                target_section_offset,
                symbol_index,
                reloc_type,
                reference_symbol,
            });
        }

        context.sections.push(section);
        context.section_functions.push(Vec::new());
        for function in functions {
            context.add_function(function);
        }
    }
    let num_functions = context.functions.len();

    for _ in 0..counts.dependencies {
        let name = reader.string()?;
        context.add_dependency(&name);
    }

    for _ in 0..counts.imports {
        let dependency_index = reader.u32()?;
        if dependency_index >= counts.dependencies {
            return Err(ModSymbolsError::UnknownDependency);
        }
        let name = reader.string()?;
        context.import_symbols.push(ImportSymbol {
            name,
            dependency_index: dependency_index as usize,
        });
    }

    for _ in 0..counts.dependency_events {
        let dependency_index = reader.u32()?;
        if dependency_index >= counts.dependencies {
            return Err(ModSymbolsError::UnknownDependency);
        }
        let event_name = reader.string()?;
        context.dependency_events.push(DependencyEvent {
            dependency_index: dependency_index as usize,
            event_name,
        });
    }

    for _ in 0..counts.events {
        let name = reader.string()?;
        context.event_symbols.push(EventSymbol { name });
    }

    for _ in 0..counts.callbacks {
        let dependency_event_index = reader.u32()?;
        if dependency_event_index >= counts.dependency_events {
            return Err(ModSymbolsError::UnknownEvent);
        }
        let function_index = reader.u32()?;
        if function_index as usize >= num_functions {
            return Err(ModSymbolsError::UnknownSymbol);
        }
        context.callbacks.push(Callback {
            function_index: function_index as usize,
            dependency_event_index: dependency_event_index as usize,
        });
    }

    let mut exported: HashSet<usize> = HashSet::new();
    for _ in 0..counts.exports {
        let function_index = reader.u32()? as usize;
        if function_index >= num_functions {
            return Err(ModSymbolsError::UnknownSymbol);
        }
        let name = reader.string()?;
        if !exported.insert(function_index) || context.functions_by_name.contains_key(&name) {
            return Err(ModSymbolsError::DuplicateExport);
        }
        context.functions[function_index].name = name.clone();
        context.functions_by_name.insert(name, function_index);
        context.exported_funcs.push(function_index);
    }

    for _ in 0..counts.replacements {
        let func_index = reader.u32()? as usize;
        if func_index >= num_functions {
            return Err(ModSymbolsError::UnknownSymbol);
        }
        let target_vram = reader.u32()?;
        let flags = reader.u32()?;
        context.replacements.push(FunctionReplacement {
            func_index,
            target_vram,
            flags: ReplacementFlags::from_bits_truncate(flags),
        });
    }

    for _ in 0..counts.hooks {
        let func_index = reader.u32()? as usize;
        if func_index >= num_functions {
            return Err(ModSymbolsError::UnknownSymbol);
        }
        let target_vram = reader.u32()?;
        let flags = reader.u32()?;
        context.hooks.push(FunctionHook {
            func_index,
            target_vram,
            flags: HookFlags::from_bits_truncate(flags),
        });
    }

    Ok(())
}

struct Writer {
    buffer: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    fn string(&mut self, value: &str) {
        self.u32(value.len() as u32);
        self.buffer.extend_from_slice(value.as_bytes());
    }
}

/// Serializes `context`'s mod tables into a v1 container.
///
/// Re-parsing the result against the same reference context yields an
/// equivalent context; the functions are written grouped by section, so a
/// remap table keeps the recorded function indices consistent with the
/// order a reader will assign.
pub fn symbols_to_bin_v1(context: &Context) -> Vec<u8> {
    let mut writer = Writer { buffer: Vec::new() };
    writer.u32(MAGIC);
    writer.u32(VERSION);

    // file-order index of every function, section-major
    let mut file_index = vec![0u32; context.functions.len()];
    let mut next = 0u32;
    for funcs in &context.section_functions {
        for &func in funcs {
            file_index[func] = next;
            next += 1;
        }
    }

    writer.u32(context.sections.len() as u32);
    writer.u32(context.dependencies.len() as u32);
    writer.u32(context.import_symbols.len() as u32);
    writer.u32(context.dependency_events.len() as u32);
    writer.u32(context.event_symbols.len() as u32);
    writer.u32(context.callbacks.len() as u32);
    writer.u32(context.exported_funcs.len() as u32);
    writer.u32(context.replacements.len() as u32);
    writer.u32(context.hooks.len() as u32);

    for (section_index, section) in context.sections.iter().enumerate() {
        writer.u32(section.rom_addr);
        writer.u32(section.ram_addr);
        writer.u32(section.size);
        let funcs = context
            .section_functions
            .get(section_index)
            .map(Vec::as_slice)
            .unwrap_or_default();
        writer.u32(funcs.len() as u32);
        writer.u32(section.relocs.len() as u32);

        for &func_index in funcs {
            let function = &context.functions[func_index];
            writer.u32(function.vram - section.ram_addr);
            writer.u32((function.words.len() * 4) as u32);
        }

        for reloc in &section.relocs {
            writer.u32(reloc.offset);
            writer.u8(reloc.reloc_type as u8);
            writer.u8(if reloc.reference_symbol {
                RELOC_FLAG_REFERENCE
            } else {
                0
            });
            let (stored_section, target_rom) = if reloc.reference_symbol {
                (
                    0,
                    context.reference_sections[reloc.target_section as usize].rom_addr,
                )
            } else {
                (reloc.target_section, 0)
            };
            writer.u16(stored_section);
            writer.u32(target_rom);
            writer.u32(reloc.target_section_offset);
            writer.u32(reloc.symbol_index);
        }
    }

    for dependency in &context.dependencies {
        writer.string(dependency);
    }
    for import in &context.import_symbols {
        writer.u32(import.dependency_index as u32);
        writer.string(&import.name);
    }
    for event in &context.dependency_events {
        writer.u32(event.dependency_index as u32);
        writer.string(&event.event_name);
    }
    for event in &context.event_symbols {
        writer.string(&event.name);
    }
    for callback in &context.callbacks {
        writer.u32(callback.dependency_event_index as u32);
        writer.u32(file_index[callback.function_index]);
    }
    for &export in &context.exported_funcs {
        writer.u32(file_index[export]);
        writer.string(&context.functions[export].name);
    }
    for replacement in &context.replacements {
        writer.u32(file_index[replacement.func_index]);
        writer.u32(replacement.target_vram);
        writer.u32(replacement.flags.bits());
    }
    for hook in &context.hooks {
        writer.u32(file_index[hook.func_index]);
        writer.u32(hook.target_vram);
        writer.u32(hook.flags.bits());
    }

    writer.buffer
}
