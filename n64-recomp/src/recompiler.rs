//! Per-function C emission.
//!
//! The emitter walks the instruction words once, pairing every control-flow
//! instruction with its delay slot. Conditional branches compute their
//! condition into a temporary before the delay slot runs; branch-likely
//! forms run the delay slot inside the taken arm only. General-purpose
//! registers live in `ctx->r[N]` and writes to `$zero` are dropped at
//! emission time.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;

use n64_asm::{reg, BranchKind, Decoder, DecoderConfig, Instruction, Op};

use crate::context::{
    Context, Function, JumpTable, Reloc, RelocType, Section, SECTION_ABSOLUTE, SECTION_EVENT,
    SECTION_IMPORT,
};
use crate::RecompError;

/// Lowers one function of `context` to C.
///
/// `static_funcs_by_section` collects call targets that resolved to no known
/// function; the whole-ROM emitter recompiles those afterwards. `is_mod`
/// selects runtime-relocated addressing (`section_addresses[]` tables)
/// instead of statically folded addresses.
pub fn recompile_function(
    context: &Context,
    func_index: usize,
    writer: &mut dyn Write,
    static_funcs_by_section: &mut [Vec<u32>],
    is_mod: bool,
) -> Result<(), RecompError> {
    let func = &context.functions[func_index];
    let section = &context.sections[func.section_index as usize];

    let linkage = if is_mod { "RECOMP_FUNC " } else { "" };
    writeln!(
        writer,
        "{linkage}void {}(uint8_t* rdram, recomp_context* ctx) {{",
        func.name
    )?;
    if func.stubbed {
        writeln!(writer, "    return;")?;
        writeln!(writer, "}}")?;
        writeln!(writer)?;
        return Ok(());
    }

    let emitter = Emitter::new(context, func, section, is_mod);
    emitter.emit_body(writer, static_funcs_by_section)?;

    writeln!(writer, "}}")?;
    writeln!(writer)?;
    Ok(())
}

enum AddrExpr {
    Fixed(u32),
    Runtime(String),
}

enum CallTarget {
    Named(String),
    Event(u32),
    Lookup(u32),
}

struct Emitter<'a> {
    context: &'a Context,
    func: &'a Function,
    decoder: Decoder,
    is_mod: bool,
    relocs: HashMap<u32, &'a Reloc>,
    labels: BTreeSet<u32>,
    jump_tables: HashMap<u32, &'a JumpTable>,
}

impl<'a> Emitter<'a> {
    fn new(context: &'a Context, func: &'a Function, section: &'a Section, is_mod: bool) -> Self {
        let decoder = Decoder::new(DecoderConfig { pseudo_ops: false });

        // relocs keyed by instruction index within the function
        let start = func.vram - section.ram_addr;
        let end = start + (func.words.len() * 4) as u32;
        let relocs = section
            .relocs
            .iter()
            .filter(|reloc| reloc.offset >= start && reloc.offset < end)
            .map(|reloc| ((reloc.offset - start) / 4, reloc))
            .collect();

        let jump_tables: HashMap<u32, &JumpTable> = func
            .jump_tables
            .iter()
            .map(|table| (table.jr_vram, table))
            .collect();

        let mut labels = BTreeSet::new();
        for (i, &word) in func.words.iter().enumerate() {
            let vram = func.vram + (i as u32) * 4;
            let instr = Instruction::new(word);
            let target = match decoder.decode(word).branch_kind() {
                BranchKind::Conditional | BranchKind::Likely => instr.branch_target(vram),
                BranchKind::JumpImm => instr.jump_target(vram),
                _ => continue,
            };
            if func.contains(target) {
                labels.insert(target);
            }
        }
        for table in &func.jump_tables {
            for &entry in &table.entries {
                if func.contains(entry) {
                    labels.insert(entry);
                }
            }
        }

        Self {
            context,
            func,
            decoder,
            is_mod,
            relocs,
            labels,
            jump_tables,
        }
    }

    fn vram_of(&self, i: usize) -> u32 {
        self.func.vram + (i as u32) * 4
    }

    fn emit_body(
        &self,
        w: &mut dyn Write,
        static_funcs: &mut [Vec<u32>],
    ) -> Result<(), RecompError> {
        let mut i = 0;
        while i < self.func.words.len() {
            let vram = self.vram_of(i);
            if self.labels.contains(&vram) {
                writeln!(w, "L_{vram:08X}:")?;
            }
            let word = self.func.words[i];
            let op = self.decoder.decode(word);
            if !op.has_delay_slot() {
                match op.branch_kind() {
                    BranchKind::Eret => writeln!(w, "    return;")?,
                    BranchKind::Break | BranchKind::Syscall => {
                        writeln!(w, "    do_break(0x{vram:X});")?;
                        writeln!(w, "    return;")?;
                    }
                    _ => self.emit_simple(w, i, 4)?,
                }
                i += 1;
                continue;
            }

            let slot = i + 1;
            if slot >= self.func.words.len() {
                return Err(RecompError::TruncatedDelaySlot {
                    name: self.func.name.clone(),
                });
            }
            if self.decoder.decode(self.func.words[slot]).has_delay_slot() {
                return Err(RecompError::BranchInDelaySlot {
                    vram: self.vram_of(slot),
                });
            }
            if self.labels.contains(&self.vram_of(slot)) {
                return Err(RecompError::JumpIntoDelaySlot {
                    vram: self.vram_of(slot),
                });
            }
            self.emit_branch(w, i, op, static_funcs)?;
            i += 2;
        }
        Ok(())
    }

    fn emit_branch(
        &self,
        w: &mut dyn Write,
        i: usize,
        op: Op,
        static_funcs: &mut [Vec<u32>],
    ) -> Result<(), RecompError> {
        let vram = self.vram_of(i);
        let instr = Instruction::new(self.func.words[i]);
        let slot = i + 1;

        match op.branch_kind() {
            BranchKind::Conditional => {
                writeln!(w, "    {{")?;
                writeln!(w, "        int branch_taken = {};", self.condition(op, instr))?;
                self.emit_simple(w, slot, 8)?;
                writeln!(w, "        if (branch_taken) {{")?;
                self.emit_taken_arm(w, i, op, instr, 12, static_funcs)?;
                writeln!(w, "        }}")?;
                writeln!(w, "    }}")?;
            }
            BranchKind::Likely => {
                writeln!(w, "    if ({}) {{", self.condition(op, instr))?;
                self.emit_simple(w, slot, 8)?;
                self.emit_taken_arm(w, i, op, instr, 8, static_funcs)?;
                writeln!(w, "    }}")?;
            }
            BranchKind::JumpImm => {
                let target = instr.jump_target(vram);
                writeln!(w, "    {{")?;
                self.emit_simple(w, slot, 8)?;
                if self.func.contains(target) {
                    writeln!(w, "        goto L_{target:08X};")?;
                } else {
                    let callee = self.call_target(i, target, static_funcs)?;
                    self.emit_call(w, &callee, 8)?;
                    writeln!(w, "        return;")?;
                }
                writeln!(w, "    }}")?;
            }
            BranchKind::JalImm => {
                // `bal` is a relative branch-and-link, not a 26-bit jump
                let target = if op == Op::Bal {
                    instr.branch_target(vram)
                } else {
                    instr.jump_target(vram)
                };
                let callee = self.call_target(i, target, static_funcs)?;
                writeln!(w, "    {{")?;
                self.emit_simple(w, slot, 8)?;
                self.emit_call(w, &callee, 8)?;
                writeln!(w, "    }}")?;
            }
            BranchKind::JumpReg => {
                writeln!(w, "    {{")?;
                self.emit_simple(w, slot, 8)?;
                if instr.rs() == reg::RA {
                    writeln!(w, "        return;")?;
                } else if let Some(table) = self.jump_tables.get(&vram) {
                    self.emit_switch(w, instr, table, vram)?;
                } else {
                    writeln!(
                        w,
                        "        get_function((int32_t)ctx->r[{}])(rdram, ctx);",
                        instr.rs()
                    )?;
                    writeln!(w, "        return;")?;
                }
                writeln!(w, "    }}")?;
            }
            BranchKind::Jalr => {
                writeln!(w, "    {{")?;
                self.emit_simple(w, slot, 8)?;
                writeln!(
                    w,
                    "        get_function((int32_t)ctx->r[{}])(rdram, ctx);",
                    instr.rs()
                )?;
                writeln!(w, "    }}")?;
            }
            _ => unreachable!("emit_branch called without a delay slot"),
        }
        Ok(())
    }

    /// The taken side of a conditional or likely branch: a local goto, a
    /// linked call, or a conditional tail call out of the function.
    fn emit_taken_arm(
        &self,
        w: &mut dyn Write,
        i: usize,
        op: Op,
        instr: Instruction,
        indent: usize,
        static_funcs: &mut [Vec<u32>],
    ) -> Result<(), RecompError> {
        let pad = " ".repeat(indent);
        let target = instr.branch_target(self.vram_of(i));
        if op.is_link() {
            let callee = self.call_target(i, target, static_funcs)?;
            self.emit_call(w, &callee, indent)?;
        } else if self.func.contains(target) {
            writeln!(w, "{pad}goto L_{target:08X};")?;
        } else {
            let callee = self.call_target(i, target, static_funcs)?;
            self.emit_call(w, &callee, indent)?;
            writeln!(w, "{pad}return;")?;
        }
        Ok(())
    }

    fn emit_call(
        &self,
        w: &mut dyn Write,
        callee: &CallTarget,
        indent: usize,
    ) -> Result<(), RecompError> {
        let pad = " ".repeat(indent);
        match callee {
            CallTarget::Named(name) => writeln!(w, "{pad}{name}(rdram, ctx);")?,
            CallTarget::Event(index) => writeln!(
                w,
                "{pad}recomp_trigger_event(rdram, ctx, base_event_index + {index});"
            )?,
            CallTarget::Lookup(vram) => writeln!(
                w,
                "{pad}get_function((int32_t)0x{vram:X})(rdram, ctx);"
            )?,
        }
        Ok(())
    }

    fn emit_switch(
        &self,
        w: &mut dyn Write,
        instr: Instruction,
        table: &JumpTable,
        vram: u32,
    ) -> Result<(), RecompError> {
        writeln!(w, "        switch ((uint32_t)ctx->r[{}]) {{", instr.rs())?;
        for &entry in &table.entries {
            writeln!(w, "            case 0x{entry:X}U: goto L_{entry:08X};")?;
        }
        writeln!(w, "            default:")?;
        writeln!(
            w,
            "                switch_error(__func__, 0x{vram:X}, 0x{:X});",
            table.table_vram
        )?;
        writeln!(w, "                return;")?;
        writeln!(w, "        }}")?;
        Ok(())
    }

    /// Resolves a call/jump target to something nameable, preferring the
    /// reloc bound to the instruction over a plain address lookup.
    fn call_target(
        &self,
        i: usize,
        target: u32,
        static_funcs: &mut [Vec<u32>],
    ) -> Result<CallTarget, RecompError> {
        if let Some(reloc) = self.relocs.get(&(i as u32)) {
            if reloc.reloc_type == RelocType::Mips26 {
                return self.reloc_call_target(reloc);
            }
        }
        if let Some(name) = self.function_at(target) {
            return Ok(CallTarget::Named(name.to_owned()));
        }
        static_funcs[self.func.section_index as usize].push(target);
        Ok(CallTarget::Named(format!("static_func_{target:08X}")))
    }

    fn reloc_call_target(&self, reloc: &Reloc) -> Result<CallTarget, RecompError> {
        match reloc.target_section {
            SECTION_IMPORT => {
                let import = &self.context.import_symbols[reloc.symbol_index as usize];
                Ok(CallTarget::Named(import.name.clone()))
            }
            SECTION_EVENT => Ok(CallTarget::Event(reloc.symbol_index)),
            SECTION_ABSOLUTE => Ok(CallTarget::Lookup(reloc.target_section_offset)),
            section if reloc.reference_symbol => {
                if !self.context.is_regular_reference_section(section) {
                    return Err(RecompError::SectionOutOfRange {
                        section,
                        component: "recompiler",
                    });
                }
                let symbol = self.context.reference_symbol(reloc.symbol_index);
                Ok(CallTarget::Named(symbol.name.clone()))
            }
            section => {
                let target_section = self
                    .context
                    .sections
                    .get(section as usize)
                    .ok_or(RecompError::SectionOutOfRange {
                        section,
                        component: "recompiler",
                    })?;
                let vram = target_section.ram_addr + reloc.target_section_offset;
                self.function_at(vram)
                    .map(|name| CallTarget::Named(name.to_owned()))
                    .ok_or(RecompError::UnknownTarget { vram })
            }
        }
    }

    fn function_at(&self, vram: u32) -> Option<&str> {
        let candidates = self.context.functions_by_vram.get(&vram)?;
        let same_section = candidates
            .iter()
            .map(|&index| &self.context.functions[index])
            .find(|func| func.section_index == self.func.section_index);
        same_section
            .or_else(|| candidates.first().map(|&index| &self.context.functions[index]))
            .map(|func| func.name.as_str())
    }

    fn condition(&self, op: Op, instr: Instruction) -> String {
        let rs = gpr(instr.rs());
        let rt = gpr(instr.rt());
        match op {
            Op::Beq | Op::Beql | Op::Beqz => format!("{rs} == {rt}"),
            Op::Bne | Op::Bnel | Op::Bnez => format!("{rs} != {rt}"),
            Op::Blez | Op::Blezl => format!("(int64_t){rs} <= 0"),
            Op::Bgtz | Op::Bgtzl => format!("(int64_t){rs} > 0"),
            Op::Bltz | Op::Bltzl | Op::Bltzal | Op::Bltzall => format!("(int64_t){rs} < 0"),
            Op::Bgez | Op::Bgezl | Op::Bgezal | Op::Bgezall | Op::Bal => {
                if instr.rs() == reg::ZERO {
                    "1".to_owned()
                } else {
                    format!("(int64_t){rs} >= 0")
                }
            }
            _ => unreachable!("not a conditional branch"),
        }
    }

    /// Emits one straight-line instruction at the given indent. Used both
    /// for normal flow and for delay slots inside branch blocks.
    fn emit_simple(&self, w: &mut dyn Write, i: usize, indent: usize) -> Result<(), RecompError> {
        let vram = self.vram_of(i);
        let word = self.func.words[i];
        let instr = Instruction::new(word);
        let op = self.decoder.decode(word);
        let pad = " ".repeat(indent);

        let rs = instr.rs();
        let rt = instr.rt();
        let rd = instr.rd();
        let sa = instr.sa();
        let simm = instr.simm16() as i32;
        let uimm = instr.imm16();

        macro_rules! set {
            ($dest:expr, $($value:tt)*) => {{
                if $dest != reg::ZERO {
                    writeln!(w, "{pad}ctx->r[{}] = {};", $dest, format!($($value)*))?;
                }
            }};
        }

        match op {
            Op::Nop | Op::Cache | Op::Sync => {}

            // shifts
            Op::Sll => set!(rd, "(int32_t)((uint32_t){} << {sa})", gpr(rt)),
            Op::Srl => set!(rd, "(int32_t)((uint32_t){} >> {sa})", gpr(rt)),
            Op::Sra => set!(rd, "(int32_t)((int32_t){} >> {sa})", gpr(rt)),
            Op::Sllv => set!(rd, "(int32_t)((uint32_t){} << ({} & 31))", gpr(rt), gpr(rs)),
            Op::Srlv => set!(rd, "(int32_t)((uint32_t){} >> ({} & 31))", gpr(rt), gpr(rs)),
            Op::Srav => set!(rd, "(int32_t)((int32_t){} >> ({} & 31))", gpr(rt), gpr(rs)),
            Op::Dsll => set!(rd, "{} << {sa}", gpr(rt)),
            Op::Dsrl => set!(rd, "{} >> {sa}", gpr(rt)),
            Op::Dsra => set!(rd, "(int64_t){} >> {sa}", gpr(rt)),
            Op::Dsll32 => set!(rd, "{} << {}", gpr(rt), sa as u32 + 32),
            Op::Dsrl32 => set!(rd, "{} >> {}", gpr(rt), sa as u32 + 32),
            Op::Dsra32 => set!(rd, "(int64_t){} >> {}", gpr(rt), sa as u32 + 32),
            Op::Dsllv => set!(rd, "{} << ({} & 63)", gpr(rt), gpr(rs)),
            Op::Dsrlv => set!(rd, "{} >> ({} & 63)", gpr(rt), gpr(rs)),
            Op::Dsrav => set!(rd, "(int64_t){} >> ({} & 63)", gpr(rt), gpr(rs)),

            // three-register arithmetic
            Op::Add | Op::Addu => {
                set!(rd, "(int32_t)((uint32_t){} + (uint32_t){})", gpr(rs), gpr(rt))
            }
            Op::Sub | Op::Subu => {
                set!(rd, "(int32_t)((uint32_t){} - (uint32_t){})", gpr(rs), gpr(rt))
            }
            Op::And => set!(rd, "{} & {}", gpr(rs), gpr(rt)),
            Op::Or | Op::Move => set!(rd, "{} | {}", gpr(rs), gpr(rt)),
            Op::Xor => set!(rd, "{} ^ {}", gpr(rs), gpr(rt)),
            Op::Nor | Op::Not => set!(rd, "~({} | {})", gpr(rs), gpr(rt)),
            Op::Slt => set!(rd, "((int64_t){} < (int64_t){}) ? 1 : 0", gpr(rs), gpr(rt)),
            Op::Sltu => set!(rd, "({} < {}) ? 1 : 0", gpr(rs), gpr(rt)),
            Op::Dadd | Op::Daddu => set!(rd, "{} + {}", gpr(rs), gpr(rt)),
            Op::Dsub | Op::Dsubu => set!(rd, "{} - {}", gpr(rs), gpr(rt)),

            // multiply and divide
            Op::Mult => {
                writeln!(w, "{pad}{{")?;
                writeln!(
                    w,
                    "{pad}    int64_t result = (int64_t)(int32_t){} * (int64_t)(int32_t){};",
                    gpr(rs),
                    gpr(rt)
                )?;
                writeln!(w, "{pad}    ctx->lo = (int32_t)result;")?;
                writeln!(w, "{pad}    ctx->hi = (int32_t)(result >> 32);")?;
                writeln!(w, "{pad}}}")?;
            }
            Op::Multu => {
                writeln!(w, "{pad}{{")?;
                writeln!(
                    w,
                    "{pad}    uint64_t result = (uint64_t)(uint32_t){} * (uint64_t)(uint32_t){};",
                    gpr(rs),
                    gpr(rt)
                )?;
                writeln!(w, "{pad}    ctx->lo = (int32_t)result;")?;
                writeln!(w, "{pad}    ctx->hi = (int32_t)(result >> 32);")?;
                writeln!(w, "{pad}}}")?;
            }
            Op::Div => {
                writeln!(
                    w,
                    "{pad}ctx->lo = (int32_t)((int32_t){} / (int32_t){});",
                    gpr(rs),
                    gpr(rt)
                )?;
                writeln!(
                    w,
                    "{pad}ctx->hi = (int32_t)((int32_t){} % (int32_t){});",
                    gpr(rs),
                    gpr(rt)
                )?;
            }
            Op::Divu => {
                writeln!(
                    w,
                    "{pad}ctx->lo = (int32_t)((uint32_t){} / (uint32_t){});",
                    gpr(rs),
                    gpr(rt)
                )?;
                writeln!(
                    w,
                    "{pad}ctx->hi = (int32_t)((uint32_t){} % (uint32_t){});",
                    gpr(rs),
                    gpr(rt)
                )?;
            }
            Op::Dmult => writeln!(
                w,
                "{pad}DMULT((int64_t){}, (int64_t){}, &ctx->hi, &ctx->lo);",
                gpr(rs),
                gpr(rt)
            )?,
            Op::Dmultu => writeln!(
                w,
                "{pad}DMULTU({}, {}, &ctx->hi, &ctx->lo);",
                gpr(rs),
                gpr(rt)
            )?,
            Op::Ddiv => {
                writeln!(w, "{pad}ctx->lo = (int64_t){} / (int64_t){};", gpr(rs), gpr(rt))?;
                writeln!(w, "{pad}ctx->hi = (int64_t){} % (int64_t){};", gpr(rs), gpr(rt))?;
            }
            Op::Ddivu => {
                writeln!(w, "{pad}ctx->lo = {} / {};", gpr(rs), gpr(rt))?;
                writeln!(w, "{pad}ctx->hi = {} % {};", gpr(rs), gpr(rt))?;
            }
            Op::Mfhi => set!(rd, "ctx->hi"),
            Op::Mflo => set!(rd, "ctx->lo"),
            Op::Mthi => writeln!(w, "{pad}ctx->hi = {};", gpr(rs))?,
            Op::Mtlo => writeln!(w, "{pad}ctx->lo = {};", gpr(rs))?,

            // immediates
            Op::Addi | Op::Addiu => {
                if let Some(addr) = self.lo16_addr(i) {
                    set!(rt, "(int32_t){}", full_addr(&addr));
                } else if rs == reg::ZERO {
                    set!(rt, "(int32_t){simm}");
                } else {
                    set!(rt, "(int32_t)({})", add_expr(format!("(uint32_t){}", gpr(rs)), simm));
                }
            }
            Op::Daddi | Op::Daddiu => {
                if let Some(addr) = self.lo16_addr(i) {
                    set!(rt, "(int32_t){}", full_addr(&addr));
                } else if rs == reg::ZERO {
                    set!(rt, "{simm}");
                } else {
                    set!(rt, "{}", add_expr(gpr(rs), simm));
                }
            }
            Op::Slti => set!(rt, "((int64_t){} < {simm}) ? 1 : 0", gpr(rs)),
            Op::Sltiu => set!(rt, "({} < (uint64_t)(int64_t){simm}) ? 1 : 0", gpr(rs)),
            Op::Andi => set!(rt, "{} & 0x{uimm:X}", gpr(rs)),
            Op::Ori => {
                if let Some(addr) = self.lo16_addr(i) {
                    set!(rt, "(int32_t){}", full_addr(&addr));
                } else {
                    set!(rt, "{} | 0x{uimm:X}", gpr(rs));
                }
            }
            Op::Xori => set!(rt, "{} ^ 0x{uimm:X}", gpr(rs)),
            Op::Lui => {
                if let Some(addr) = self.hi16_addr(i) {
                    set!(rt, "(int32_t){}", hi_half(&addr));
                } else {
                    set!(rt, "(int32_t)0x{:X}", (uimm as u32) << 16);
                }
            }

            // loads
            Op::Lb => set!(rt, "MEM_B({}, {})", self.mem_offset(i, simm), gpr(rs)),
            Op::Lbu => set!(rt, "MEM_BU({}, {})", self.mem_offset(i, simm), gpr(rs)),
            Op::Lh => set!(rt, "MEM_H({}, {})", self.mem_offset(i, simm), gpr(rs)),
            Op::Lhu => set!(rt, "MEM_HU({}, {})", self.mem_offset(i, simm), gpr(rs)),
            Op::Lw => set!(rt, "MEM_W({}, {})", self.mem_offset(i, simm), gpr(rs)),
            Op::Lwu => set!(rt, "MEM_WU({}, {})", self.mem_offset(i, simm), gpr(rs)),
            Op::Ld => set!(rt, "MEM_D({}, {})", self.mem_offset(i, simm), gpr(rs)),
            Op::Lwl => set!(
                rt,
                "MEM_WL({}, {}, (uint32_t){})",
                self.mem_offset(i, simm),
                gpr(rs),
                gpr(rt)
            ),
            Op::Lwr => set!(
                rt,
                "MEM_WR({}, {}, (uint32_t){})",
                self.mem_offset(i, simm),
                gpr(rs),
                gpr(rt)
            ),

            // stores
            Op::Sb => writeln!(
                w,
                "{pad}MEM_B({}, {}) = (uint8_t){};",
                self.mem_offset(i, simm),
                gpr(rs),
                gpr(rt)
            )?,
            Op::Sh => writeln!(
                w,
                "{pad}MEM_H({}, {}) = (uint16_t){};",
                self.mem_offset(i, simm),
                gpr(rs),
                gpr(rt)
            )?,
            Op::Sw => writeln!(
                w,
                "{pad}MEM_W({}, {}) = (uint32_t){};",
                self.mem_offset(i, simm),
                gpr(rs),
                gpr(rt)
            )?,
            Op::Sd => writeln!(
                w,
                "{pad}MEM_D({}, {}) = (uint64_t){};",
                self.mem_offset(i, simm),
                gpr(rs),
                gpr(rt)
            )?,
            Op::Swl => writeln!(
                w,
                "{pad}MEM_SWL({}, {}, (uint32_t){});",
                self.mem_offset(i, simm),
                gpr(rs),
                gpr(rt)
            )?,
            Op::Swr => writeln!(
                w,
                "{pad}MEM_SWR({}, {}, (uint32_t){});",
                self.mem_offset(i, simm),
                gpr(rs),
                gpr(rt)
            )?,

            // coprocessor 0: only the status register is modeled
            Op::Mfc0 => {
                if rd != 12 {
                    return Err(RecompError::UnsupportedCop0Register { register: rd, vram });
                }
                set!(rt, "cop0_status_read(ctx)");
            }
            Op::Mtc0 => {
                if rd != 12 {
                    return Err(RecompError::UnsupportedCop0Register { register: rd, vram });
                }
                writeln!(w, "{pad}cop0_status_write(ctx, {});", gpr(rt))?;
            }

            Op::Invalid => {
                writeln!(w, "{pad}do_break(0x{vram:X});")?;
                writeln!(w, "{pad}return;")?;
            }

            // control flow never reaches the straight-line emitter
            _ => unreachable!("{op} handled by the branch emitter"),
        }
        Ok(())
    }

    fn reloc_at(&self, i: usize, kind: RelocType) -> Option<&Reloc> {
        self.relocs
            .get(&(i as u32))
            .copied()
            .filter(|reloc| reloc.reloc_type == kind)
    }

    fn hi16_addr(&self, i: usize) -> Option<AddrExpr> {
        self.reloc_at(i, RelocType::MipsHi16).map(|r| self.addr_expr(r))
    }

    fn lo16_addr(&self, i: usize) -> Option<AddrExpr> {
        self.reloc_at(i, RelocType::MipsLo16).map(|r| self.addr_expr(r))
    }

    /// The full target-address expression of a reloc: a folded constant in
    /// whole-ROM mode, a section-table expression in mod mode.
    fn addr_expr(&self, reloc: &Reloc) -> AddrExpr {
        let offset = reloc.target_section_offset;
        match reloc.target_section {
            SECTION_ABSOLUTE => AddrExpr::Fixed(offset),
            section if reloc.reference_symbol => {
                if self.is_mod {
                    AddrExpr::Runtime(format!(
                        "(reference_section_addresses[{section}] + 0x{offset:X})"
                    ))
                } else {
                    AddrExpr::Fixed(
                        self.context.reference_sections[section as usize].ram_addr + offset,
                    )
                }
            }
            section => {
                if self.is_mod {
                    AddrExpr::Runtime(format!("(section_addresses[{section}] + 0x{offset:X})"))
                } else {
                    AddrExpr::Fixed(self.context.sections[section as usize].ram_addr + offset)
                }
            }
        }
    }

    /// Memory-operand offset: the reloc's sign-extended low half when one is
    /// bound, otherwise the instruction's own immediate.
    fn mem_offset(&self, i: usize, simm: i32) -> String {
        match self.lo16_addr(i) {
            Some(AddrExpr::Fixed(addr)) => fmt_simm(addr as u16 as i16 as i32),
            Some(AddrExpr::Runtime(expr)) => format!("(int16_t)({expr} & 0xFFFF)"),
            None => fmt_simm(simm),
        }
    }
}

impl Function {
    /// Whether `vram` falls within this function's body.
    pub fn contains(&self, vram: u32) -> bool {
        vram >= self.vram && vram < self.vram + (self.words.len() * 4) as u32
    }
}

fn gpr(register: u8) -> String {
    if register == reg::ZERO {
        "0".to_owned()
    } else {
        format!("ctx->r[{register}]")
    }
}

fn add_expr(base: String, imm: i32) -> String {
    if imm >= 0 {
        format!("{base} + {imm}")
    } else {
        format!("{base} - {}", -(imm as i64))
    }
}

fn fmt_simm(value: i32) -> String {
    if value < 0 {
        format!("-0x{:X}", -(value as i64))
    } else {
        format!("0x{value:X}")
    }
}

fn full_addr(addr: &AddrExpr) -> String {
    match addr {
        AddrExpr::Fixed(value) => format!("0x{value:X}"),
        AddrExpr::Runtime(expr) => expr.clone(),
    }
}

fn hi_half(addr: &AddrExpr) -> String {
    match addr {
        AddrExpr::Fixed(value) => {
            format!("0x{:X}", value.wrapping_add(0x8000) & 0xffff_0000)
        }
        AddrExpr::Runtime(expr) => format!("(({expr} + 0x8000) & ~0xFFFF)"),
    }
}
