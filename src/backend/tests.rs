//! End-to-end lowering scenarios and invariant checks.
//!
//! Scenarios mirror the literal expected snippets from the call-ABI and
//! slot-allocation design notes in DESIGN.md.

use super::*;
use crate::common::*;
use crate::error::CodegenError;
use crate::tac::*;

fn proc(name: &str, args: &[&str], instrs: Vec<Instruction>) -> TACProc {
    TACProc::new(name, args.iter().map(|a| Id::new(a.to_string())).collect(), instrs)
}

fn t(name: &str) -> Operand {
    Operand::temp(name)
}

fn id(name: &str) -> Id {
    Id::new(name.to_string())
}

#[test]
fn global_var_emits_data_directive() {
    let backend = X64Linux::new();
    let out = backend.lower_var(&TACVar::new("g", 42));
    assert_eq!(out, vec![".data", ".globl g", "g:", "\t.quad 42"]);
}

#[test]
fn single_param_copy_and_return() {
    let backend = X64Linux::new();
    let p = proc(
        "id",
        &["x"],
        vec![
            Instruction::Copy { src: t("x"), dst: id("r") },
            Instruction::Ret { src: Some(t("r")) },
        ],
    );
    let out = backend.lower_proc(&p).unwrap();

    assert_eq!(
        out,
        vec![
            ".text",
            ".globl id",
            "id:",
            "\tpushq\t%rbp",
            "\tmovq\t%rsp, %rbp",
            "\tsubq\t$16, %rsp",
            "\tmovq\t%rdi, -8(%rbp)",
            "\tmovq\t-8(%rbp), %r11",
            "\tmovq\t%r11, -16(%rbp)",
            "\tmovq\t-16(%rbp), %rax",
            "\tjmp\t.E_id",
            ".E_id:",
            "\tmovq\t%rbp, %rsp",
            "\tpopq\t%rbp",
            "\tretq",
        ]
    );
}

#[test]
fn const_add_and_return() {
    let backend = X64Linux::new();
    let p = proc(
        "addup",
        &[],
        vec![
            Instruction::Const { value: 5, dst: id("t") },
            Instruction::Const { value: 7, dst: id("u") },
            Instruction::Add { lhs: t("t"), rhs: t("u"), dst: id("v") },
            Instruction::Ret { src: Some(t("v")) },
        ],
    );
    let out = backend.lower_proc(&p).unwrap();

    let body = &out[6..out.len() - 4];
    assert_eq!(
        body,
        &[
            "\tmovq\t$5, -8(%rbp)",
            "\tmovq\t$7, -16(%rbp)",
            "\tmovq\t-8(%rbp), %r11",
            "\taddq\t-16(%rbp), %r11",
            "\tmovq\t%r11, -24(%rbp)",
            "\tmovq\t-24(%rbp), %rax",
            "\tjmp\t.E_addup",
        ]
    );
    // Three scalar locals -> 3 slots, rounded up to 4 for 16-byte alignment.
    assert_eq!(out[5], "\tsubq\t$32, %rsp");
}

#[test]
fn conditional_jump_compares_against_zero() {
    let backend = X64Linux::new();
    let p = proc(
        "branchy",
        &[],
        vec![
            Instruction::Const { value: 0, dst: id("t") },
            Instruction::CJmp { cond: CondCode::Zero, src: t("t"), target: id("L") },
            Instruction::Label(id("L")),
            Instruction::Ret { src: None },
        ],
    );
    let out = backend.lower_proc(&p).unwrap();
    assert!(out.contains(&"\tcmpq\t$0, -8(%rbp)".to_string()));
    assert!(out.contains(&"\tjz\tL".to_string()));
    assert!(out.contains(&"L:".to_string()));
}

#[test]
fn seven_argument_call_pads_stack_to_16_bytes() {
    let backend = X64Linux::new();
    let args: Vec<Instruction> = (1..=7)
        .map(|i| Instruction::Param { index: i, src: Operand::Int(i as i64) })
        .collect();
    let mut instrs = args;
    instrs.push(Instruction::Call { target: id("f"), nargs: 7, dst: Some(id("r")) });
    instrs.push(Instruction::Ret { src: Some(t("r")) });

    let p = proc("caller", &[], instrs);
    let out = backend.lower_proc(&p).unwrap();

    let call_idx = out.iter().position(|l| l == "\tcallq\tf").unwrap();
    assert_eq!(out[call_idx - 1], "\tpushq\t$7");
    assert!(out[..call_idx].contains(&"\tsubq\t$8, %rsp".to_string()));
    assert_eq!(out[call_idx + 1], "\taddq\t$16, %rsp");
    for reg in ["%rdi", "%rsi", "%rdx", "%rcx", "%r8", "%r9"] {
        assert!(out[..call_idx].iter().any(|l| l.ends_with(reg)));
    }
}

#[test]
fn six_argument_call_needs_no_stack_padding() {
    let backend = X64Linux::new();
    let instrs: Vec<Instruction> = (1..=6)
        .map(|i| Instruction::Param { index: i, src: Operand::Int(i as i64) })
        .chain(std::iter::once(Instruction::Call { target: id("f"), nargs: 6, dst: None }))
        .chain(std::iter::once(Instruction::Ret { src: None }))
        .collect();
    let p = proc("caller6", &[], instrs);
    let out = backend.lower_proc(&p).unwrap();

    assert!(!out.iter().any(|l| l.contains("subq\t$8, %rsp")));
    assert!(!out.iter().any(|l| l.starts_with("\tpushq") && l.as_str() != "\tpushq\t%rbp"));
    assert!(!out.iter().any(|l| l.contains("addq") && l.contains("%rsp")));
}

#[test]
fn array_local_reserves_consecutive_slots() {
    let backend = X64Linux::new();
    let mut var_sizes = Map::new();
    var_sizes.insert(id("arr"), Type::Array(Box::new(Type::Int), 3)); // 24 bytes
    let p = TACProc::new(
        "with_array",
        vec![],
        vec![
            Instruction::MemoryPointer { src: t("arr"), dst: id("p") },
            Instruction::Ret { src: None },
        ],
    )
    .with_var_sizes(var_sizes);

    let out = backend.lower_proc(&p).unwrap();
    // "arr" takes slots 0,1,2; "p" is the next one, slot 3 -> -32(%rbp).
    assert!(out.iter().any(|l| l.contains("leaq\t-8(%rbp), %r12")));
    assert!(out.iter().any(|l| l.contains("movq\t%r12, -32(%rbp)")));
    // 4 slots total, already even.
    assert!(out.contains(&"\tsubq\t$32, %rsp".to_string()));
}

#[test]
fn memory_allocation_lowers_to_alloc_call() {
    let backend = X64Linux::new();
    let p = proc(
        "allocator",
        &[],
        vec![
            Instruction::Const { value: 3, dst: id("n") },
            Instruction::MemoryAllocation { count: t("n"), elem_size: Type::Int, dst: id("p") },
            Instruction::Ret { src: Some(t("p")) },
        ],
    );
    let out = backend.lower_proc(&p).unwrap();
    assert!(out.contains(&"\tmovq\t$8, %rsi".to_string()));
    assert!(out.contains(&"\tmovq\t-8(%rbp), %rdi".to_string()));
    assert!(out.contains(&"\tcallq\talloc".to_string()));
}

#[test]
fn memory_load_computes_address_and_dereferences() {
    let backend = X64Linux::new();
    let p = proc(
        "loader",
        &[],
        vec![
            Instruction::MemoryLoad { addr: Address::BaseOffset(t("arr"), Operand::Int(8)), dst: id("x") },
            Instruction::Ret { src: Some(t("x")) },
        ],
    );
    let out = backend.lower_proc(&p).unwrap();
    assert!(out.contains(&"\tmovq\t-8(%rbp), %r8".to_string()));
    assert!(out.contains(&"\taddq\t$8, %r8".to_string()));
    assert!(out.contains(&"\tmovq\t(%r8), %r9".to_string()));
    assert!(out.contains(&"\tmovq\t%r9, -16(%rbp)".to_string()));
}

#[test]
fn memory_store_computes_address_and_writes_through_it() {
    let backend = X64Linux::new();
    let p = proc(
        "storer",
        &[],
        vec![
            Instruction::MemoryStore { src: Operand::Int(42), addr: Address::Base(t("p")) },
            Instruction::Ret { src: None },
        ],
    );
    let out = backend.lower_proc(&p).unwrap();
    assert!(out.contains(&"\tmovq\t-8(%rbp), %r10".to_string()));
    assert!(out.contains(&"\tmovq\t$42, %r11".to_string()));
    assert!(out.contains(&"\tmovq\t%r11, (%r10)".to_string()));
}

#[test]
fn memory_array_copy_uses_argument_registers() {
    // Regression test: dst/src/nbytes must land in %rdi/%rsi/%rdx, the
    // registers copy_array actually reads, not scratch registers left over
    // from a prior instruction.
    let backend = X64Linux::new();
    let p = proc(
        "copier",
        &[],
        vec![
            Instruction::MemoryArrayCopy { dst: t("d"), src: t("s"), nbytes: Operand::Int(24) },
            Instruction::Ret { src: None },
        ],
    );
    let out = backend.lower_proc(&p).unwrap();
    assert!(out.contains(&"\tmovq\t-8(%rbp), %rdi".to_string()));
    assert!(out.contains(&"\tmovq\t-16(%rbp), %rsi".to_string()));
    assert!(out.contains(&"\tmovq\t$24, %rdx".to_string()));
    assert!(out.contains(&"\tmovq\t$0, %rax".to_string()));
    assert!(out.contains(&"\tcallq\tcopy_array".to_string()));
    assert!(!out.iter().any(|l| l.contains("%r14") || l.contains("%r13") || l.contains("%r15")));
}

#[test]
fn slot_zero_is_not_reallocated_on_second_mention() {
    // Regression test for the source's truthiness bug (DESIGN.md): a temp
    // whose slot index is 0 must be reused, not silently re-slotted.
    let backend = X64Linux::new();
    let p = proc(
        "reuse_zero",
        &["x"],
        vec![
            Instruction::Copy { src: t("x"), dst: id("x") },
            Instruction::Ret { src: Some(t("x")) },
        ],
    );
    let out = backend.lower_proc(&p).unwrap();
    // Only one local slot used (x's own), never two; rounded up to 2 for
    // 16-byte alignment.
    assert_eq!(out[5], "\tsubq\t$16, %rsp");
}

#[test]
fn lowering_is_deterministic() {
    let backend = X64Linux::new();
    let build = || {
        proc(
            "id",
            &["x"],
            vec![
                Instruction::Copy { src: t("x"), dst: id("r") },
                Instruction::Ret { src: Some(t("r")) },
            ],
        )
    };
    let a = backend.lower_proc(&build()).unwrap();
    let b = backend.lower_proc(&build()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn unknown_backend_name_is_an_error() {
    let err = get_backend("risc-v").unwrap_err();
    assert!(matches!(err, CodegenError::NoSuchBackend(name) if name == "risc-v"));
}

#[test]
fn call_argument_count_mismatch_is_an_error() {
    let backend = X64Linux::new();
    let p = proc(
        "bad_call",
        &[],
        vec![
            Instruction::Param { index: 1, src: Operand::Int(1) },
            Instruction::Call { target: id("f"), nargs: 2, dst: None },
            Instruction::Ret { src: None },
        ],
    );
    let err = backend.lower_proc(&p).unwrap_err();
    assert!(matches!(
        err,
        CodegenError::ArgCountMismatch { declared: 2, buffered: 1 }
    ));
}

#[test]
fn out_of_sequence_param_index_is_an_error() {
    let backend = X64Linux::new();
    let p = proc(
        "bad_param",
        &[],
        vec![
            Instruction::Param { index: 2, src: Operand::Int(1) },
            Instruction::Ret { src: None },
        ],
    );
    let err = backend.lower_proc(&p).unwrap_err();
    assert!(matches!(
        err,
        CodegenError::ParamSequencing { expected: 1, actual: 2 }
    ));
}

#[test]
fn program_lowering_concatenates_items_with_trailing_newline() {
    let program = vec![
        TacItem::from(TACVar::new("g", 42)),
        TacItem::from(proc("main", &[], vec![Instruction::Ret { src: None }])),
    ];
    let asm = lower_x64_linux(&program).unwrap();
    assert!(asm.starts_with(".data\n.globl g\ng:\n\t.quad 42\n.text\n.globl main\n"));
    assert!(asm.ends_with('\n'));
    assert!(!asm.ends_with("\n\n"));
}
