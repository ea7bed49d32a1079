//! The backend registry: a process-wide, write-once mapping from backend
//! name to emitter factory. Grounded on `AsmGen.BACKENDS`/`AsmGen.get_backend`
//! in the Python source, reimplemented with an explicit lazily-initialized
//! static instead of a mutable class-level dict, since nothing here is ever
//! written to after startup.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::CodegenError;
use crate::tac::{TACProc, TACVar};

/// Implemented by every concrete code-generation target.
///
/// `format_temp`/`format_param`/`format_global` give the abstract emitter
/// machinery in `emitter.rs` a way to turn an allocated slot into the
/// backend's addressing syntax; `lower_proc`/`lower_var` are the entry
/// points `codegen.rs` calls for each top-level TAC item.
pub trait AsmBackend: Send + Sync {
    /// The name this backend is registered under (e.g. `"x64-linux"`).
    fn name(&self) -> &'static str;

    /// Format a reference to local slot `index`.
    fn format_temp(&self, index: usize) -> String;

    /// Format a reference to the stack parameter at `index` (counting from
    /// the 7th formal argument).
    fn format_param(&self, index: usize) -> String;

    /// Format a reference to the global named `name` (without its leading
    /// `@`).
    fn format_global(&self, name: &str) -> String;

    /// Lower a whole procedure, including its prologue and epilogue.
    fn lower_proc(&self, proc: &TACProc) -> Result<Vec<String>, CodegenError>;

    /// Lower a global variable's data directive.
    fn lower_var(&self, var: &TACVar) -> Vec<String>;
}

type Factory = fn() -> Box<dyn AsmBackend>;

fn registry() -> &'static BTreeMap<&'static str, Factory> {
    static REGISTRY: OnceLock<BTreeMap<&'static str, Factory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: BTreeMap<&'static str, Factory> = BTreeMap::new();
        map.insert("x64-linux", (|| Box::new(super::x64_linux::X64Linux::new()) as Box<dyn AsmBackend>) as Factory);
        map
    })
}

/// Look up a backend by name, constructing a fresh instance from its
/// factory. Fails with [`CodegenError::NoSuchBackend`] if `name` is not
/// registered.
pub fn get_backend(name: &str) -> Result<Box<dyn AsmBackend>, CodegenError> {
    registry()
        .get(name)
        .map(|factory| factory())
        .ok_or_else(|| CodegenError::NoSuchBackend(name.to_string()))
}

/// The names of every registered backend, in registration order.
pub fn backend_names() -> Vec<&'static str> {
    registry().keys().copied().collect()
}
