use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::symbols::ModSymbolsError;

/// Sentinel for an absent section index (e.g. an unpaired `.bss`).
pub const SECTION_NONE: u16 = u16::MAX;
/// Sentinel target section for relocs against absolute symbols.
pub const SECTION_ABSOLUTE: u16 = 0xfffe;
/// Sentinel target section for relocs against imported symbols.
pub const SECTION_IMPORT: u16 = 0xfffd;
/// Sentinel target section for relocs against event symbols.
pub const SECTION_EVENT: u16 = 0xfffc;
/// Sentinel for a section with no ROM image (`.bss`).
pub const ROM_NONE: u32 = u32::MAX;

/// Relocation kinds carried through from the object format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RelocType {
    /// No relocation.
    None = 0,
    /// 16-bit immediate.
    Mips16 = 1,
    /// Full 32-bit word (data only).
    Mips32 = 2,
    /// 26-bit jump target.
    Mips26 = 4,
    /// High half of a HI16/LO16 pair.
    MipsHi16 = 5,
    /// Low half of a HI16/LO16 pair.
    MipsLo16 = 6,
}

impl RelocType {
    /// Decodes the on-disk representation.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Mips16),
            2 => Some(Self::Mips32),
            4 => Some(Self::Mips26),
            5 => Some(Self::MipsHi16),
            6 => Some(Self::MipsLo16),
            _ => None,
        }
    }
}

/// A relocation within a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reloc {
    /// Byte offset of the patched instruction from the section start.
    pub offset: u32,
    /// Target section index, or one of the sentinel sections.
    pub target_section: u16,
    /// Byte offset of the target symbol within its section.
    pub target_section_offset: u32,
    /// Symbol index; meaning depends on the target section
    /// (imports, events, or reference symbols).
    pub symbol_index: u32,
    /// Relocation kind.
    pub reloc_type: RelocType,
    /// Whether the target lives in the imported reference context.
    pub reference_symbol: bool,
}

/// A contiguous VRAM/ROM region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    /// ROM address, or [`ROM_NONE`] for `.bss`.
    pub rom_addr: u32,
    /// Load address.
    pub ram_addr: u32,
    /// Size in bytes.
    pub size: u32,
    /// Section name; cleared by the merger.
    pub name: String,
    /// Paired `.bss` section, or [`SECTION_NONE`].
    pub bss_section_index: u16,
    /// Relocations applying to this section.
    pub relocs: Vec<Reloc>,
}

/// A statically discovered jump table feeding an indirect jump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTable {
    /// Address of the `jr` this table feeds.
    pub jr_vram: u32,
    /// Address of the table itself.
    pub table_vram: u32,
    /// The branch targets stored in the table.
    pub entries: Vec<u32>,
}

/// A function extracted from a section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Function {
    /// Entry address.
    pub vram: u32,
    /// ROM address of the first word.
    pub rom: u32,
    /// Big-endian instruction words.
    pub words: Vec<u32>,
    /// Function name; the emitters rename unnamed functions.
    pub name: String,
    /// Owning section.
    pub section_index: u16,
    /// Excluded from emission entirely.
    pub ignored: bool,
    /// Provided by the runtime; not emitted.
    pub reimplemented: bool,
    /// Emitted as an empty body.
    pub stubbed: bool,
    /// Switch tables discovered by external analysis.
    pub jump_tables: Vec<JumpTable>,
}

/// A section of the imported reference context, copied by value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceSection {
    /// ROM address in the base image.
    pub rom_addr: u32,
    /// Load address in the base image.
    pub ram_addr: u32,
    /// Size in bytes.
    pub size: u32,
}

/// A symbol of the imported reference context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSymbol {
    /// Symbol name.
    pub name: String,
    /// Owning reference section.
    pub section_index: u16,
    /// Byte offset within the section.
    pub section_offset: u32,
    /// Size in bytes.
    pub size: u32,
    /// Whether the symbol is callable.
    pub is_function: bool,
}

/// A symbol the mod expects a dependency to provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSymbol {
    /// Imported name.
    pub name: String,
    /// Index into [`Context::dependencies`].
    pub dependency_index: usize,
}

/// A named broadcast point exported by this mod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSymbol {
    /// Event name.
    pub name: String,
}

/// An event belonging to a dependency that this mod attaches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEvent {
    /// Index into [`Context::dependencies`].
    pub dependency_index: usize,
    /// Name of the event within that dependency.
    pub event_name: String,
}

/// A function registered against a dependency event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Callback {
    /// The attached function.
    pub function_index: usize,
    /// Index into [`Context::dependency_events`].
    pub dependency_event_index: usize,
}

bitflags::bitflags! {
    /// Behavior flags of a function replacement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ReplacementFlags: u32 {
        /// Replace even when the base function was patched already.
        const FORCE = 1;
    }
}

bitflags::bitflags! {
    /// Placement flags of a function hook.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HookFlags: u32 {
        /// Run at function return instead of entry.
        const AT_RETURN = 1;
    }
}

/// A mod function supplanting a base-ROM function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionReplacement {
    /// The replacing function.
    pub func_index: usize,
    /// Entry address of the replaced base function.
    pub target_vram: u32,
    /// Behavior flags.
    pub flags: ReplacementFlags,
}

/// Code injected at the entry or return of a base function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionHook {
    /// The hook function.
    pub func_index: usize,
    /// Entry address of the hooked base function.
    pub target_vram: u32,
    /// Placement flags.
    pub flags: HookFlags,
}

/// Failures loading the TOML reference symbol file.
#[derive(Debug, thiserror::Error)]
pub enum SymbolFileError {
    /// The file could not be read.
    #[error("failed to read symbol file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML or misses required fields.
    #[error("failed to parse symbol file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct SymbolFile {
    #[serde(default)]
    sections: Vec<SymbolFileSection>,
}

#[derive(Debug, Deserialize)]
struct SymbolFileSection {
    #[serde(default)]
    name: String,
    rom: u32,
    vram: u32,
    size: u32,
    #[serde(default)]
    functions: Vec<SymbolFileFunction>,
}

#[derive(Debug, Deserialize)]
struct SymbolFileFunction {
    name: String,
    vram: u32,
    size: u32,
}

/// The central data model of the pipeline.
///
/// A `Context` owns the ROM bytes, the section and function tables with
/// their lookup maps, the mod-specific tables, and (after
/// [`import_reference_context`](Self::import_reference_context)) a
/// value-copied snapshot of the reference context. Relocs point at
/// reference symbols through `(section, index)` pairs, never pointers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    /// The ROM image.
    pub rom: Vec<u8>,
    /// Sections of this context.
    pub sections: Vec<Section>,
    /// Functions of this context.
    pub functions: Vec<Function>,
    /// Function indices per section.
    pub section_functions: Vec<Vec<usize>>,
    /// Function indices by entry address; overlays allow duplicates.
    pub functions_by_vram: HashMap<u32, Vec<usize>>,
    /// Function indices by name.
    pub functions_by_name: HashMap<String, usize>,
    /// Sections of the imported reference context.
    pub reference_sections: Vec<ReferenceSection>,
    /// Regular symbols of the imported reference context.
    pub reference_symbols: Vec<ReferenceSymbol>,
    /// Dependency identifiers.
    pub dependencies: Vec<String>,
    /// Dependency index by name.
    pub dependencies_by_name: HashMap<String, usize>,
    /// Imported symbols.
    pub import_symbols: Vec<ImportSymbol>,
    /// Events of dependencies this mod attaches to.
    pub dependency_events: Vec<DependencyEvent>,
    /// Events this mod provides.
    pub event_symbols: Vec<EventSymbol>,
    /// Callback registrations.
    pub callbacks: Vec<Callback>,
    /// Indices of exported functions.
    pub exported_funcs: Vec<usize>,
    /// Function replacements.
    pub replacements: Vec<FunctionReplacement>,
    /// Function hooks.
    pub hooks: Vec<FunctionHook>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a function, keeping the lookup tables in sync.
    pub fn add_function(&mut self, function: Function) -> usize {
        let index = self.functions.len();
        if self.section_functions.len() <= function.section_index as usize {
            self.section_functions
                .resize(function.section_index as usize + 1, Vec::new());
        }
        self.section_functions[function.section_index as usize].push(index);
        self.functions_by_vram
            .entry(function.vram)
            .or_default()
            .push(index);
        if !function.name.is_empty() {
            self.functions_by_name.insert(function.name.clone(), index);
        }
        self.functions.push(function);
        index
    }

    /// Interns a dependency name, returning its index.
    pub fn add_dependency(&mut self, name: &str) -> usize {
        if let Some(&index) = self.dependencies_by_name.get(name) {
            return index;
        }
        let index = self.dependencies.len();
        self.dependencies_by_name.insert(name.to_owned(), index);
        self.dependencies.push(name.to_owned());
        index
    }

    /// Whether `section` is a regular (non-sentinel) reference section.
    pub fn is_regular_reference_section(&self, section: u16) -> bool {
        (section as usize) < self.reference_sections.len()
    }

    /// Load address of a reference section.
    pub fn reference_section_vram(&self, section: u16) -> u32 {
        self.reference_sections[section as usize].ram_addr
    }

    /// Number of regular reference symbols.
    pub fn num_reference_symbols(&self) -> usize {
        self.reference_symbols.len()
    }

    /// The reference symbol a reloc resolved to.
    pub fn reference_symbol(&self, index: u32) -> &ReferenceSymbol {
        &self.reference_symbols[index as usize]
    }

    /// Loads a reference symbol file.
    ///
    /// The file is the TOML data source the rest of the pipeline treats as
    /// external: sections with `rom`/`vram`/`size` and function lists. When
    /// `rom` bytes are provided the function words are copied out of them.
    pub fn from_symbol_file(path: &Path, rom: Vec<u8>) -> Result<Self, SymbolFileError> {
        let text = std::fs::read_to_string(path)?;
        let file: SymbolFile = toml::from_str(&text)?;

        let mut context = Context {
            rom,
            ..Context::default()
        };
        for entry in file.sections {
            let section_index = context.sections.len() as u16;
            context.sections.push(Section {
                rom_addr: entry.rom,
                ram_addr: entry.vram,
                size: entry.size,
                name: entry.name,
                bss_section_index: SECTION_NONE,
                relocs: Vec::new(),
            });
            context.section_functions.push(Vec::new());
            for func in entry.functions {
                let rom_addr = entry.rom + (func.vram - entry.vram);
                let words = words_from_rom(&context.rom, rom_addr, func.size);
                context.add_function(Function {
                    vram: func.vram,
                    rom: rom_addr,
                    words,
                    name: func.name,
                    section_index,
                    ..Function::default()
                });
            }
        }
        Ok(context)
    }

    /// Absorbs `reference` as reference data.
    ///
    /// Sections are value-copied into [`reference_sections`](Self::reference_sections)
    /// and every function becomes an addressable [`ReferenceSymbol`]. The
    /// reference context is consumed; nothing in `self` points back into it.
    pub fn import_reference_context(&mut self, reference: Context) {
        for section in &reference.sections {
            self.reference_sections.push(ReferenceSection {
                rom_addr: section.rom_addr,
                ram_addr: section.ram_addr,
                size: section.size,
            });
        }
        for function in reference.functions {
            self.reference_symbols.push(ReferenceSymbol {
                section_offset: function.vram
                    - reference.sections[function.section_index as usize].ram_addr,
                name: function.name,
                section_index: function.section_index,
                size: (function.words.len() * 4) as u32,
                is_function: true,
            });
        }
    }

    /// Binds every `R_MIPS_26` reference reloc to a reference symbol.
    ///
    /// Builds a `vram -> symbols` map over the regular reference symbols and
    /// points each reloc's `symbol_index` at the first symbol in the reloc's
    /// target section with the matching address. Failing to find one is
    /// fatal for the pipeline.
    pub fn bind_reference_relocs(&mut self) -> Result<(), ModSymbolsError> {
        let mut symbols_by_vram: HashMap<u32, Vec<usize>> = HashMap::new();
        for (symbol_index, symbol) in self.reference_symbols.iter().enumerate() {
            if symbol.section_index != SECTION_ABSOLUTE {
                let vram = self.reference_sections[symbol.section_index as usize].ram_addr
                    + symbol.section_offset;
                symbols_by_vram.entry(vram).or_default().push(symbol_index);
            }
        }

        for section in &mut self.sections {
            for reloc in &mut section.relocs {
                if reloc.reloc_type != RelocType::Mips26 || !reloc.reference_symbol {
                    continue;
                }
                if (reloc.target_section as usize) >= self.reference_sections.len() {
                    continue;
                }
                let section_vram =
                    self.reference_sections[reloc.target_section as usize].ram_addr;
                let target_vram = section_vram + reloc.target_section_offset;

                let bound = symbols_by_vram
                    .get(&target_vram)
                    .into_iter()
                    .flatten()
                    .find(|&&index| {
                        self.reference_symbols[index].section_index == reloc.target_section
                    });
                match bound {
                    Some(&index) => reloc.symbol_index = index as u32,
                    None => {
                        tracing::error!(
                            section = reloc.target_section,
                            "failed to find R_MIPS_26 relocation target at {target_vram:#010x}"
                        );
                        return Err(ModSymbolsError::UnresolvedReference);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Copies a big-endian word range out of the ROM; absent ranges yield no
/// words (reference contexts are loaded without an image).
fn words_from_rom(rom: &[u8], rom_addr: u32, size: u32) -> Vec<u32> {
    let start = rom_addr as usize;
    let end = start + size as usize;
    if rom.len() < end {
        return Vec::new();
    }
    rom[start..end]
        .chunks_exact(4)
        .map(|chunk| u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_context() -> Context {
        let mut reference = Context::new();
        reference.sections.push(Section {
            rom_addr: 0x1000,
            ram_addr: 0x8020_0000,
            size: 0x100,
            name: ".text".into(),
            bss_section_index: SECTION_NONE,
            relocs: Vec::new(),
        });
        reference.section_functions.push(Vec::new());
        reference.add_function(Function {
            vram: 0x8020_0010,
            rom: 0x1010,
            words: vec![0x03e0_0008, 0],
            name: "ref_func".into(),
            section_index: 0,
            ..Function::default()
        });
        reference
    }

    #[test]
    fn import_copies_symbols_by_value() {
        let mut context = Context::new();
        context.import_reference_context(reference_context());
        assert_eq!(context.reference_sections.len(), 1);
        assert_eq!(context.num_reference_symbols(), 1);
        let sym = context.reference_symbol(0);
        assert_eq!(sym.name, "ref_func");
        assert_eq!(sym.section_index, 0);
        assert_eq!(sym.section_offset, 0x10);
        assert!(sym.is_function);
    }

    #[test]
    fn binding_points_at_the_matching_section_symbol() {
        let mut context = Context::new();
        context.sections.push(Section {
            rom_addr: 0,
            ram_addr: 0x8040_0000,
            size: 0x10,
            name: String::new(),
            bss_section_index: SECTION_NONE,
            relocs: vec![Reloc {
                offset: 0,
                target_section: 0,
                target_section_offset: 0x10,
                symbol_index: u32::MAX,
                reloc_type: RelocType::Mips26,
                reference_symbol: true,
            }],
        });
        context.import_reference_context(reference_context());
        context.bind_reference_relocs().unwrap();
        let reloc = &context.sections[0].relocs[0];
        assert_eq!(reloc.symbol_index, 0);
        let sym = context.reference_symbol(reloc.symbol_index);
        assert_eq!(sym.section_index, reloc.target_section);
    }

    #[test]
    fn binding_fails_without_a_matching_symbol() {
        let mut context = Context::new();
        context.sections.push(Section {
            rom_addr: 0,
            ram_addr: 0x8040_0000,
            size: 0x10,
            name: String::new(),
            bss_section_index: SECTION_NONE,
            relocs: vec![Reloc {
                offset: 0,
                target_section: 0,
                target_section_offset: 0x44,
                symbol_index: u32::MAX,
                reloc_type: RelocType::Mips26,
                reference_symbol: true,
            }],
        });
        context.import_reference_context(reference_context());
        assert_eq!(
            context.bind_reference_relocs(),
            Err(ModSymbolsError::UnresolvedReference)
        );
    }

    #[test]
    fn dependencies_deduplicate_by_name() {
        let mut context = Context::new();
        assert_eq!(context.add_dependency("core"), 0);
        assert_eq!(context.add_dependency("audio"), 1);
        assert_eq!(context.add_dependency("core"), 0);
        assert_eq!(context.dependencies.len(), 2);
    }
}
