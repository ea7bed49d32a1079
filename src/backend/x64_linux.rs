//! The x86-64/Linux concrete emitter.
//!
//! AT&T syntax, System V AMD64 ABI. Grounded line-for-line on
//! `AsmGen_x64_Linux` in `examples/original_source/bxlib/bxasmgen.py`;
//! restructured into the [`AsmBackend`] trait and given Rust-typed operands
//! instead of the source's ad hoc string formatting.

use crate::common::*;
use crate::error::CodegenError;
use crate::tac::{Address, Instruction, Operand, TACProc, TACVar, Type};

use super::emitter::{EmitterState, Slot};
use super::registry::AsmBackend;

/// Registers used for the first six integer/pointer arguments, in order,
/// per the System V AMD64 ABI.
const ARG_REGISTERS: [&str; 6] = ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"];

const PRINTF_FORMAT_LABEL: &str = ".lprintfmt";

#[derive(Default)]
pub struct X64Linux;

impl X64Linux {
    pub fn new() -> Self {
        X64Linux
    }

    /// Format a value-producing operand: an immediate, a bare label
    /// reference, or a (possibly newly slotted) temp.
    fn value_ref(&self, st: &mut EmitterState, var_sizes: &Map<Id, Type>, operand: &Operand) -> String {
        match operand {
            Operand::Int(n) => format!("${n}"),
            Operand::Label(label) => label.to_string(),
            Operand::Temp(name) => self.temp_ref(st, var_sizes, *name),
        }
    }

    /// Format a reference to a temp, allocating its slot on first mention.
    fn temp_ref(&self, st: &mut EmitterState, var_sizes: &Map<Id, Type>, name: Id) -> String {
        if name.starts_with('@') {
            return self.format_global(&name.as_str()[1..]);
        }
        let size = var_sizes.get(&name).cloned().unwrap_or(Type::Int).size();
        match st.slot_of(name, size) {
            Slot::Local(index) => self.format_temp(index),
            Slot::StackParam(index) => self.format_param(index),
        }
    }

    /// Resolve an [`Address`] to a base-register expansion, loading the base
    /// (and adding the offset, if any) into `base_reg`. Returns the register
    /// that, dereferenced, holds the addressed value.
    fn materialize_address(
        &self,
        st: &mut EmitterState,
        var_sizes: &Map<Id, Type>,
        addr: &Address,
        base_reg: &str,
        offset_reg: &str,
    ) -> Result<(), CodegenError> {
        match addr {
            Address::Base(base) => {
                let base = self.value_ref(st, var_sizes, base);
                st.emit_insn("movq", &[base.as_str(), base_reg]);
            }
            Address::BaseOffset(base, offset) => {
                let base = self.value_ref(st, var_sizes, base);
                st.emit_insn("movq", &[base.as_str(), base_reg]);
                match offset {
                    Operand::Int(n) => {
                        st.emit_insn("addq", &[format!("${n}").as_str(), base_reg]);
                    }
                    other => {
                        let offset = self.value_ref(st, var_sizes, other);
                        st.emit_insn("movq", &[offset.as_str(), offset_reg]);
                        st.emit_insn("addq", &[offset_reg, base_reg]);
                    }
                }
            }
        }
        Ok(())
    }

    fn lower_instruction(
        &self,
        st: &mut EmitterState,
        var_sizes: &Map<Id, Type>,
        instr: &Instruction,
    ) -> Result<(), CodegenError> {
        use Instruction::*;

        match instr {
            Const { value, dst } => {
                let dst = self.temp_ref(st, var_sizes, *dst);
                st.emit_insn("movq", &[format!("${value}").as_str(), dst.as_str()]);
            }
            Copy { src, dst } => {
                let src = self.value_ref(st, var_sizes, src);
                let dst = self.temp_ref(st, var_sizes, *dst);
                st.emit_insn("movq", &[src.as_str(), "%r11"]);
                st.emit_insn("movq", &["%r11", dst.as_str()]);
            }
            Neg { src, dst } => self.lower_unary(st, var_sizes, "negq", src, *dst),
            Not { src, dst } => self.lower_unary(st, var_sizes, "notq", src, *dst),
            Add { lhs, rhs, dst } => self.lower_binary(st, var_sizes, "addq", lhs, rhs, *dst),
            Sub { lhs, rhs, dst } => self.lower_binary(st, var_sizes, "subq", lhs, rhs, *dst),
            And { lhs, rhs, dst } => self.lower_binary(st, var_sizes, "andq", lhs, rhs, *dst),
            Or { lhs, rhs, dst } => self.lower_binary(st, var_sizes, "orq", lhs, rhs, *dst),
            Xor { lhs, rhs, dst } => self.lower_binary(st, var_sizes, "xorq", lhs, rhs, *dst),
            Mul { lhs, rhs, dst } => {
                let lhs = self.value_ref(st, var_sizes, lhs);
                let rhs = self.value_ref(st, var_sizes, rhs);
                let dst = self.temp_ref(st, var_sizes, *dst);
                st.emit_insn("movq", &[lhs.as_str(), "%rax"]);
                st.emit_insn("imulq", &[rhs.as_str()]);
                st.emit_insn("movq", &["%rax", dst.as_str()]);
            }
            Div { lhs, rhs, dst } => self.lower_div_mod(st, var_sizes, lhs, rhs, *dst, "%rax"),
            Mod { lhs, rhs, dst } => self.lower_div_mod(st, var_sizes, lhs, rhs, *dst, "%rdx"),
            Shl { lhs, rhs, dst } => self.lower_shift(st, var_sizes, "salq", lhs, rhs, *dst),
            Shr { lhs, rhs, dst } => self.lower_shift(st, var_sizes, "sarq", lhs, rhs, *dst),
            Print { src } => {
                let src = self.value_ref(st, var_sizes, src);
                st.emit_insn("leaq", &[format!("{PRINTF_FORMAT_LABEL}(%rip)").as_str(), "%rdi"]);
                st.emit_insn("movq", &[src.as_str(), "%rsi"]);
                st.emit_insn("xorq", &["%rax", "%rax"]);
                st.emit_insn("callq", &["printf@PLT"]);
            }
            Jmp { target } => st.emit_insn("jmp", &[target.as_str()]),
            CJmp { cond, src, target } => {
                let src = self.value_ref(st, var_sizes, src);
                st.emit_insn("cmpq", &["$0", src.as_str()]);
                st.emit_insn(format!("j{cond}").as_str(), &[target.as_str()]);
            }
            Param { index, src } => {
                st.push_param(*index, src.clone())?;
            }
            Call { target, nargs, dst } => self.lower_call(st, var_sizes, target, *nargs, dst.as_ref())?,
            Ret { src } => {
                if let Some(src) = src {
                    let src = self.value_ref(st, var_sizes, src);
                    st.emit_insn("movq", &[src.as_str(), "%rax"]);
                }
                let epilogue = st.epilogue_label().to_string();
                st.emit_insn("jmp", &[epilogue.as_str()]);
            }
            Label(name) => st.emit_label(&name.to_string()),
            MemoryAllocation { count, elem_size, dst } => {
                let count = self.value_ref(st, var_sizes, count);
                let dst = self.temp_ref(st, var_sizes, *dst);
                st.emit_insn("movq", &[format!("${}", elem_size.size()).as_str(), "%rsi"]);
                st.emit_insn("movq", &[count.as_str(), "%rdi"]);
                st.emit_insn("movq", &["$0", "%rax"]);
                st.emit_insn("callq", &["alloc"]);
                st.emit_insn("movq", &["%rax", dst.as_str()]);
            }
            MemoryInitialization { base, nbytes } => {
                let base = self.value_ref(st, var_sizes, base);
                let nbytes = self.value_ref(st, var_sizes, nbytes);
                st.emit_insn("movq", &[base.as_str(), "%rdi"]);
                st.emit_insn("movq", &[nbytes.as_str(), "%rsi"]);
                st.emit_insn("movq", &["$0", "%rax"]);
                st.emit_insn("callq", &["zero_out"]);
            }
            MemoryPointer { src, dst } => {
                let src = self.value_ref(st, var_sizes, src);
                let dst = self.temp_ref(st, var_sizes, *dst);
                st.emit_insn("leaq", &[src.as_str(), "%r12"]);
                st.emit_insn("movq", &["%r12", dst.as_str()]);
            }
            MemoryLoad { addr, dst } => {
                self.materialize_address(st, var_sizes, addr, "%r8", "%r10")?;
                let dst = self.temp_ref(st, var_sizes, *dst);
                st.emit_insn("movq", &["(%r8)", "%r9"]);
                st.emit_insn("movq", &["%r9", dst.as_str()]);
            }
            MemoryStore { src, addr } => {
                self.materialize_address(st, var_sizes, addr, "%r10", "%r12")?;
                let src = self.value_ref(st, var_sizes, src);
                st.emit_insn("movq", &[src.as_str(), "%r11"]);
                st.emit_insn("movq", &["%r11", "(%r10)"]);
            }
            MemoryArrayCopy { dst, src, nbytes } => {
                let dst = self.value_ref(st, var_sizes, dst);
                let src = self.value_ref(st, var_sizes, src);
                let nbytes = self.value_ref(st, var_sizes, nbytes);
                // dst/src/nbytes go into the argument registers copy_array
                // actually reads; see DESIGN.md on the source's bogus
                // trailing callq operands.
                st.emit_insn("movq", &[dst.as_str(), "%rdi"]);
                st.emit_insn("movq", &[src.as_str(), "%rsi"]);
                st.emit_insn("movq", &[nbytes.as_str(), "%rdx"]);
                st.emit_insn("movq", &["$0", "%rax"]);
                st.emit_insn("callq", &["copy_array"]);
            }
        }

        Ok(())
    }

    fn lower_unary(&self, st: &mut EmitterState, var_sizes: &Map<Id, Type>, opcode: &str, src: &Operand, dst: Id) {
        let src = self.value_ref(st, var_sizes, src);
        let dst = self.temp_ref(st, var_sizes, dst);
        st.emit_insn("movq", &[src.as_str(), "%r11"]);
        st.emit_insn(opcode, &["%r11"]);
        st.emit_insn("movq", &["%r11", dst.as_str()]);
    }

    fn lower_binary(
        &self,
        st: &mut EmitterState,
        var_sizes: &Map<Id, Type>,
        opcode: &str,
        lhs: &Operand,
        rhs: &Operand,
        dst: Id,
    ) {
        let lhs = self.value_ref(st, var_sizes, lhs);
        let rhs = self.value_ref(st, var_sizes, rhs);
        let dst = self.temp_ref(st, var_sizes, dst);
        st.emit_insn("movq", &[lhs.as_str(), "%r11"]);
        st.emit_insn(opcode, &[rhs.as_str(), "%r11"]);
        st.emit_insn("movq", &["%r11", dst.as_str()]);
    }

    fn lower_div_mod(
        &self,
        st: &mut EmitterState,
        var_sizes: &Map<Id, Type>,
        lhs: &Operand,
        rhs: &Operand,
        dst: Id,
        result_reg: &str,
    ) {
        let lhs = self.value_ref(st, var_sizes, lhs);
        let rhs = self.value_ref(st, var_sizes, rhs);
        let dst = self.temp_ref(st, var_sizes, dst);
        st.emit_insn("movq", &[lhs.as_str(), "%rax"]);
        st.emit_insn("cqto", &[]);
        st.emit_insn("idivq", &[rhs.as_str()]);
        st.emit_insn("movq", &[result_reg, dst.as_str()]);
    }

    fn lower_shift(
        &self,
        st: &mut EmitterState,
        var_sizes: &Map<Id, Type>,
        opcode: &str,
        lhs: &Operand,
        rhs: &Operand,
        dst: Id,
    ) {
        let lhs = self.value_ref(st, var_sizes, lhs);
        let rhs = self.value_ref(st, var_sizes, rhs);
        let dst = self.temp_ref(st, var_sizes, dst);
        st.emit_insn("movq", &[lhs.as_str(), "%r11"]);
        st.emit_insn("movq", &[rhs.as_str(), "%rcx"]);
        st.emit_insn(opcode, &["%cl", "%r11"]);
        st.emit_insn("movq", &["%r11", dst.as_str()]);
    }

    fn lower_call(
        &self,
        st: &mut EmitterState,
        var_sizes: &Map<Id, Type>,
        target: &Id,
        nargs: usize,
        dst: Option<&Id>,
    ) -> Result<(), CodegenError> {
        let params = st.take_params(nargs)?;

        for (reg, arg) in ARG_REGISTERS.iter().zip(params.iter()) {
            let arg = self.value_ref(st, var_sizes, arg);
            st.emit_insn("movq", &[arg.as_str(), reg]);
        }

        let q = nargs.saturating_sub(6);
        if q % 2 == 1 {
            st.emit_insn("subq", &["$8", "%rsp"]);
        }

        for arg in params.iter().skip(6).rev() {
            let arg = self.value_ref(st, var_sizes, arg);
            st.emit_insn("pushq", &[arg.as_str()]);
        }

        st.emit_insn("callq", &[target.as_str()]);

        if q > 0 {
            // Reclaims 8 * (q + q % 2) bytes: the alignment padding added
            // before the pushes plus the pushed arguments themselves. The
            // source constructs this as the string `q + q & 1`, which -
            // read with Python's real operator precedence - is `q + (q &
            // 1)`, matching this formula; see DESIGN.md.
            let reclaim = 8 * (q + (q % 2));
            st.emit_insn("addq", &[format!("${reclaim}").as_str(), "%rsp"]);
        }

        if let Some(dst) = dst {
            let dst = self.temp_ref(st, var_sizes, *dst);
            st.emit_insn("movq", &["%rax", dst.as_str()]);
        }

        Ok(())
    }
}

impl AsmBackend for X64Linux {
    fn name(&self) -> &'static str {
        "x64-linux"
    }

    fn format_temp(&self, index: usize) -> String {
        format!("-{}(%rbp)", 8 * (index + 1))
    }

    fn format_param(&self, index: usize) -> String {
        format!("{}(%rbp)", 8 * (index + 2))
    }

    fn format_global(&self, name: &str) -> String {
        format!("{name}(%rip)")
    }

    fn lower_proc(&self, proc: &TACProc) -> Result<Vec<String>, CodegenError> {
        let epilogue = format!(".E_{}", proc.name);
        let mut st = EmitterState::new(epilogue.as_str());

        // Spill register-passed parameters (1..=6) into freshly allocated
        // slots.
        for (i, arg) in proc.arguments.iter().take(6).enumerate() {
            let slot = self.temp_ref(&mut st, &proc.var_sizes, *arg);
            st.emit_insn("movq", &[ARG_REGISTERS[i], slot.as_str()]);
        }

        // Parameters 7.. are not spilled: they already live on the caller's
        // stack frame at a fixed positive offset.
        for (i, arg) in proc.arguments.iter().skip(6).enumerate() {
            st.declare_stack_param(*arg, i);
        }

        for instr in &proc.instructions {
            self.lower_instruction(&mut st, &proc.var_sizes, instr)?;
        }

        let nvars = st.slot_count();
        let body = st.into_lines();

        let mut out = Vec::with_capacity(body.len() + 10);
        out.push(".text".to_string());
        out.push(format!(".globl {}", proc.name));
        out.push(format!("{}:", proc.name));
        out.push("\tpushq\t%rbp".to_string());
        out.push("\tmovq\t%rsp, %rbp".to_string());
        out.push(format!("\tsubq\t${}, %rsp", 8 * nvars));
        out.extend(body);
        out.push(format!("{epilogue}:"));
        out.push("\tmovq\t%rbp, %rsp".to_string());
        out.push("\tpopq\t%rbp".to_string());
        out.push("\tretq".to_string());

        Ok(out)
    }

    fn lower_var(&self, var: &TACVar) -> Vec<String> {
        vec![
            ".data".to_string(),
            format!(".globl {}", var.name),
            format!("{}:", var.name),
            format!("\t.quad {}", var.init),
        ]
    }
}
