//! Program lowering: the entry point that walks a whole list of TAC items
//! and concatenates their assembly into one program text.
//!
//! Grounded on the `lower`/`lower1` classmethods of `AsmGen` in
//! `examples/original_source/bxlib/bxasmgen.py`.

use crate::error::CodegenError;
use crate::tac::TacItem;

use super::registry::get_backend;

/// Lower every item in `program` with the named backend and concatenate the
/// results into a single assembly text, one instruction per line,
/// terminated by a single trailing newline.
///
/// Fails immediately (with no partial output) if `backend_name` is not
/// registered, or if any item fails to lower.
pub fn lower(program: &[TacItem], backend_name: &str) -> Result<String, CodegenError> {
    let backend = get_backend(backend_name)?;

    let mut lines = Vec::new();
    for item in program {
        lines.extend(lower_item(item, backend.as_ref())?);
    }

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

fn lower_item(
    item: &TacItem,
    backend: &dyn super::registry::AsmBackend,
) -> Result<Vec<String>, CodegenError> {
    match item {
        TacItem::Proc(proc) => backend.lower_proc(proc),
        TacItem::Var(var) => Ok(backend.lower_var(var)),
    }
}

/// Lower with the default `x64-linux` backend. A convenience wrapper for the
/// overwhelmingly common case.
pub fn lower_x64_linux(program: &[TacItem]) -> Result<String, CodegenError> {
    lower(program, "x64-linux")
}
