//! The three-address code (TAC) intermediate representation.
//!
//! This is the IR the backend consumes. It is produced upstream by the
//! AST-to-TAC translator (out of scope here); this module only defines the
//! shape of the data and carries no translation logic.

use crate::common::*;

/// BX's closed set of value types.
///
/// `Pointer` and `Array` recurse through a boxed element type so the enum
/// stays a finite tree with no cycles, even though the type grammar itself is
/// recursive.
#[derive(Clone, Debug, PartialEq, Eq, derive_more::Display)]
pub enum Type {
    #[display("void")]
    Void,
    #[display("bool")]
    Bool,
    #[display("int")]
    Int,
    #[display("{_0}*")]
    Pointer(Box<Type>),
    #[display("{_0}[{_1}]")]
    Array(Box<Type>, usize),
}

impl Type {
    /// Size in bytes of a value of this type when held in a single stack slot
    /// or as an array element. `Void` has no storage representation.
    pub fn size(&self) -> usize {
        match self {
            Type::Void => 0,
            Type::Bool | Type::Int | Type::Pointer(_) => 8,
            Type::Array(elem, n) => elem.size() * n,
        }
    }
}

/// An operand to a TAC instruction.
///
/// Temporaries and labels share the same textual namespace in the source
/// format (a bare identifier), but are kept distinct here because the
/// generator treats them differently: a `Temp` gets a stack slot or a global
/// reference, while a `Label` is emitted as the literal target of a jump.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operand {
    /// A temp name. Names starting with `@` are globals (program-scoped
    /// storage); all others are locals or parameters of the enclosing
    /// procedure.
    Temp(Id),
    /// A label name, used as a jump/branch target.
    Label(Id),
    /// An integer literal.
    Int(i64),
}

impl Operand {
    pub fn temp(name: impl AsRef<str>) -> Operand {
        Operand::Temp(Id::new(name.as_ref().to_string()))
    }

    pub fn label(name: impl AsRef<str>) -> Operand {
        Operand::Label(Id::new(name.as_ref().to_string()))
    }

    /// Whether this operand names a global (a `Temp` whose name starts with
    /// `@`).
    pub fn is_global(&self) -> bool {
        matches!(self, Operand::Temp(name) if name.starts_with('@'))
    }
}

/// A memory address operand for the pointer/array extension: either a bare
/// base operand, or a base plus a byte offset that is itself an operand
/// (since an index can be a computed value, not just an immediate — see
/// DESIGN.md on the `AccessExpression.index` inconsistency in the source).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address {
    Base(Operand),
    BaseOffset(Operand, Operand),
}

/// Condition codes for conditional jumps.
///
/// `Display` prints the bare x86 condition suffix (`z`, `nz`, `l`, `le`,
/// `g`, `ge`), not a BX-level mnemonic, so a backend can build its jump
/// opcode as `format!("j{cond}")` instead of re-matching the variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display)]
pub enum CondCode {
    #[display("z")]
    Zero,
    #[display("nz")]
    NotZero,
    #[display("l")]
    Less,
    #[display("le")]
    LessEq,
    #[display("g")]
    Greater,
    #[display("ge")]
    GreaterEq,
}

/// One TAC instruction.
///
/// Each variant fixes its own arity and operand shape, which is what lets the
/// backend dispatch on this enum with an exhaustive `match` instead of the
/// reflective `getattr(self, f'_emit_{opcode}')` the source used (see
/// DESIGN.md: adding a variant here without teaching every
/// `AsmBackend` impl about it is a compile error, not a runtime "unknown
/// opcode".
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Const { value: i64, dst: Id },
    Copy { src: Operand, dst: Id },
    Neg { src: Operand, dst: Id },
    Not { src: Operand, dst: Id },
    Add { lhs: Operand, rhs: Operand, dst: Id },
    Sub { lhs: Operand, rhs: Operand, dst: Id },
    Mul { lhs: Operand, rhs: Operand, dst: Id },
    Div { lhs: Operand, rhs: Operand, dst: Id },
    Mod { lhs: Operand, rhs: Operand, dst: Id },
    And { lhs: Operand, rhs: Operand, dst: Id },
    Or { lhs: Operand, rhs: Operand, dst: Id },
    Xor { lhs: Operand, rhs: Operand, dst: Id },
    Shl { lhs: Operand, rhs: Operand, dst: Id },
    Shr { lhs: Operand, rhs: Operand, dst: Id },
    Print { src: Operand },
    Jmp { target: Id },
    CJmp { cond: CondCode, src: Operand, target: Id },
    /// Buffer `src` as the `index`-th (1-based) outgoing call argument.
    Param { index: usize, src: Operand },
    /// Call `target` with `nargs` previously-buffered arguments, optionally
    /// writing the return value to `dst`.
    Call { target: Id, nargs: usize, dst: Option<Id> },
    Ret { src: Option<Operand> },
    Label(Id),
    /// Allocate `count * elem_size.size()` zeroed bytes on the heap via the
    /// runtime `alloc` helper.
    MemoryAllocation { count: Operand, elem_size: Type, dst: Id },
    /// Zero `nbytes` bytes starting at `base` via the runtime `zero_out`
    /// helper.
    MemoryInitialization { base: Operand, nbytes: Operand },
    /// Take the address of a local.
    MemoryPointer { src: Operand, dst: Id },
    MemoryLoad { addr: Address, dst: Id },
    MemoryStore { src: Operand, addr: Address },
    /// Copy `nbytes` bytes from `src` to `dst` via the runtime `copy_array`
    /// helper.
    MemoryArrayCopy { dst: Operand, src: Operand, nbytes: Operand },
}

/// A procedure's worth of TAC: its name, formal parameters, body, and the
/// type of any local whose storage footprint differs from the default
/// 8-byte scalar slot (arrays, mainly).
#[derive(Clone, Debug)]
pub struct TACProc {
    pub name: Id,
    pub arguments: Vec<Id>,
    pub instructions: Vec<Instruction>,
    /// Every temp absent from this map is treated as a plain `Type::Int`
    /// scalar; a temp present here gets `Type::size()` bytes of slot space.
    pub var_sizes: Map<Id, Type>,
}

impl TACProc {
    pub fn new(name: impl AsRef<str>, arguments: Vec<Id>, instructions: Vec<Instruction>) -> Self {
        TACProc {
            name: Id::new(name.as_ref().to_string()),
            arguments,
            instructions,
            var_sizes: Map::new(),
        }
    }

    pub fn with_var_sizes(mut self, var_sizes: Map<Id, Type>) -> Self {
        self.var_sizes = var_sizes;
        self
    }
}

/// A global variable: an 8-byte cell, initialized at link time.
#[derive(Clone, Debug)]
pub struct TACVar {
    pub name: Id,
    pub init: i64,
}

impl TACVar {
    pub fn new(name: impl AsRef<str>, init: i64) -> Self {
        TACVar { name: Id::new(name.as_ref().to_string()), init }
    }
}

/// A top-level TAC item: either a procedure or a global variable.
#[derive(Clone, Debug)]
pub enum TacItem {
    Proc(TACProc),
    Var(TACVar),
}

impl From<TACProc> for TacItem {
    fn from(proc: TACProc) -> Self {
        TacItem::Proc(proc)
    }
}

impl From<TACVar> for TacItem {
    fn from(var: TACVar) -> Self {
        TacItem::Var(var)
    }
}
