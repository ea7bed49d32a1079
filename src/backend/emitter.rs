//! Backend-agnostic emitter machinery: the part of `AsmGen` in the Python
//! source that is not specific to any one target (temp→slot allocation,
//! the append-line sink, the outgoing-call-argument buffer). A concrete
//! backend owns one [`EmitterState`] per item it lowers and drives it
//! through its own opcode dispatch; see `x64_linux.rs`.

use crate::common::*;
use crate::error::CodegenError;
use crate::tac::Operand;

/// Where a temp's value lives once allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// A contiguous run of stack slots starting at this index (in 8-byte
    /// units from the top of the frame). Plain scalars occupy one slot;
    /// arrays occupy `size / 8`.
    Local(usize),
    /// A stack-passed parameter, addressed relative to `%rbp` on the
    /// positive side, at position `index` counting from the 7th argument.
    StackParam(usize),
}

/// Per-item emitter state: lives for exactly one [`TACProc`](crate::tac::TACProc)
/// or [`TACVar`](crate::tac::TACVar) lowering and is never reused.
#[derive(Default)]
pub struct EmitterState {
    stack_offset: usize,
    slots: Map<Id, Slot>,
    asm: Vec<String>,
    params: Vec<Operand>,
    epilogue_label: String,
}

impl EmitterState {
    pub fn new(epilogue_label: impl Into<String>) -> Self {
        EmitterState {
            epilogue_label: epilogue_label.into(),
            ..Default::default()
        }
    }

    pub fn epilogue_label(&self) -> &str {
        &self.epilogue_label
    }

    /// Record `name` as a stack-passed parameter at `index` (counting from
    /// the 7th formal argument), without consuming a local slot.
    pub fn declare_stack_param(&mut self, name: Id, index: usize) {
        self.slots.insert(name, Slot::StackParam(index));
    }

    /// Resolve (allocating on first mention) the slot a non-global temp
    /// lives in. A temp already present in `slots` is looked up explicitly
    /// by key, never by the truthiness of its stored index — so a temp
    /// sitting at slot 0 is never mistaken for "not yet assigned" (see
    /// DESIGN.md on the source's `if not var_index` bug).
    pub fn slot_of(&mut self, name: Id, size: usize) -> Slot {
        if let Some(slot) = self.slots.get(&name) {
            return *slot;
        }
        let width = (size / 8).max(1);
        let index = self.stack_offset;
        self.stack_offset += width;
        let slot = Slot::Local(index);
        self.slots.insert(name, slot);
        slot
    }

    /// Number of 8-byte slots consumed so far, rounded up to even for
    /// 16-byte stack alignment.
    pub fn slot_count(&self) -> usize {
        self.stack_offset + (self.stack_offset & 1)
    }

    pub fn emit(&mut self, line: impl Into<String>) {
        self.asm.push(line.into());
    }

    /// Emit a tab-indented instruction line, e.g. `movq $5, -8(%rbp)`.
    pub fn emit_insn(&mut self, opcode: &str, operands: &[&str]) {
        if operands.is_empty() {
            self.emit(format!("\t{opcode}"));
        } else {
            self.emit(format!("\t{opcode}\t{}", operands.join(", ")));
        }
    }

    pub fn emit_label(&mut self, label: &str) {
        self.emit(format!("{label}:"));
    }

    /// Buffer `src` as the `index`-th (1-based) outgoing call argument.
    /// Fails if `index` skips ahead of the buffer (a parameter
    /// sequencing error).
    pub fn push_param(&mut self, index: usize, src: Operand) -> Result<(), CodegenError> {
        let expected = self.params.len() + 1;
        if index != expected {
            return Err(CodegenError::ParamSequencing { expected, actual: index });
        }
        self.params.push(src);
        Ok(())
    }

    /// Drain and return the buffered call arguments, verifying the call
    /// site's declared argument count matches what was actually buffered.
    pub fn take_params(&mut self, declared: usize) -> Result<Vec<Operand>, CodegenError> {
        if declared != self.params.len() {
            return Err(CodegenError::ArgCountMismatch { declared, buffered: self.params.len() });
        }
        Ok(std::mem::take(&mut self.params))
    }

    pub fn into_lines(self) -> Vec<String> {
        self.asm
    }
}
