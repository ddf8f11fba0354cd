//! Translation-unit emitters: prelude tables, two-pass naming.

mod common;

use common::*;
use n64_recomp::{
    emit, Context, Function, ImportSymbol, Reloc, RelocType, Section, SECTION_IMPORT,
    SECTION_NONE,
};

fn mod_unit_context() -> Context {
    let mut context = Context::new();
    context.sections.push(Section {
        rom_addr: 0,
        ram_addr: 0x8040_0000,
        size: 0x20,
        name: String::new(),
        bss_section_index: SECTION_NONE,
        relocs: vec![
            // func 0 calls an import
            Reloc {
                offset: 0,
                target_section: SECTION_IMPORT,
                target_section_offset: 0,
                symbol_index: 0,
                reloc_type: RelocType::Mips26,
                reference_symbol: false,
            },
            // func 1 calls into the base ROM
            Reloc {
                offset: 16,
                target_section: 0,
                target_section_offset: 0x10,
                symbol_index: 0,
                reloc_type: RelocType::Mips26,
                reference_symbol: true,
            },
        ],
    });
    context.section_functions.push(Vec::new());
    // jal import; nop; jr $ra; nop
    context.add_function(Function {
        vram: 0x8040_0000,
        rom: 0,
        words: vec![0x0c00_0000, NOP, JR_RA, NOP],
        name: "mod_export".into(),
        section_index: 0,
        ..Function::default()
    });
    // jal reference func; nop; jr $ra; nop
    context.add_function(Function {
        vram: 0x8040_0010,
        rom: 16,
        words: vec![0x0c00_0000, NOP, JR_RA, NOP],
        name: String::new(),
        section_index: 0,
        ..Function::default()
    });
    context.add_dependency("core");
    context.import_symbols.push(ImportSymbol {
        name: "import_foo".into(),
        dependency_index: 0,
    });
    context.exported_funcs.push(0);

    context.import_reference_context(reference_context());
    context.bind_reference_relocs().unwrap();
    context
}

#[test]
fn mod_unit_exports_the_runtime_binding_tables() {
    let mut context = mod_unit_context();
    let mut out = Vec::new();
    emit::write_mod_unit(&mut context, &mut out).unwrap();
    let output = String::from_utf8(out).unwrap();

    offset_of(&output, "#include \"mod_recomp.h\"");
    offset_of(&output, "RECOMP_EXPORT uint32_t recomp_api_version = 1;");
    offset_of(&output, "#define import_foo imported_funcs[0]");
    offset_of(&output, "RECOMP_EXPORT recomp_func_t* imported_funcs[1] = {0};");
    offset_of(&output, "#define func_80200010 reference_symbol_funcs[0]");
    offset_of(&output, "RECOMP_EXPORT recomp_func_t* reference_symbol_funcs[1] = {0};");
    offset_of(&output, "RECOMP_EXPORT uint32_t base_event_index;");
    offset_of(&output, "RECOMP_EXPORT int32_t* reference_section_addresses = NULL;");
    offset_of(&output, "RECOMP_EXPORT int32_t section_addresses[1] = {0};");
    offset_of(&output, "RECOMP_EXPORT void (*do_break)(uint32_t vram) = NULL;");
}

#[test]
fn mod_unit_renames_in_pass_one_and_calls_in_pass_two() {
    let mut context = mod_unit_context();
    let mut out = Vec::new();
    emit::write_mod_unit(&mut context, &mut out).unwrap();
    let output = String::from_utf8(out).unwrap();

    // exports keep their symbol-file name, everything else gets an index name
    offset_of(
        &output,
        "RECOMP_FUNC void mod_export(uint8_t* rdram, recomp_context* ctx);",
    );
    offset_of(
        &output,
        "RECOMP_FUNC void mod_func_1(uint8_t* rdram, recomp_context* ctx);",
    );

    offset_of(&output, "import_foo(rdram, ctx);");
    offset_of(&output, "func_80200010(rdram, ctx);");
}

#[test]
fn empty_mod_unit_still_has_one_element_arrays() {
    let mut context = Context::new();
    let mut out = Vec::new();
    emit::write_mod_unit(&mut context, &mut out).unwrap();
    let output = String::from_utf8(out).unwrap();

    offset_of(&output, "RECOMP_EXPORT recomp_func_t* imported_funcs[1] = {0};");
    offset_of(&output, "RECOMP_EXPORT recomp_func_t* reference_symbol_funcs[1] = {0};");
    offset_of(&output, "RECOMP_EXPORT int32_t section_addresses[1] = {0};");
}

#[test]
fn rom_unit_names_unnamed_functions_by_vram() {
    let mut context = text_context(&[0x2408_0001, JR_RA, NOP]);
    context.functions[0].name = String::new();
    let mut out = Vec::new();
    emit::write_rom_unit(&mut context, &mut out).unwrap();
    let output = String::from_utf8(out).unwrap();

    offset_of(&output, "#include \"recomp.h\"");
    offset_of(&output, "void func_80000400(uint8_t* rdram, recomp_context* ctx);");
    offset_of(&output, "void func_80000400(uint8_t* rdram, recomp_context* ctx) {");
    offset_of(&output, "ctx->r[8] = (int32_t)1;");
}

#[test]
fn ignored_functions_are_not_emitted() {
    let mut context = text_context(&[0x2408_0001, JR_RA, NOP]);
    context.functions[0].ignored = true;
    let mut out = Vec::new();
    emit::write_rom_unit(&mut context, &mut out).unwrap();
    let output = String::from_utf8(out).unwrap();

    // prototype only, no body
    offset_of(&output, "void test_func(uint8_t* rdram, recomp_context* ctx);");
    assert!(!output.contains("ctx->r[8]"));
}
