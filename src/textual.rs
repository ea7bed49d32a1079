//! A minimal textual encoding for TAC, used only by the demonstration CLI
//! (`src/bin/bx-asm.rs`) to drive the backend without a real AST-to-TAC
//! translator (out of scope here). One instruction per line; see the
//! doc comment on [`parse`] for the grammar.
//!
//! Grounded on the error-reporting shape of `front/lex.rs`'s `LexError` and
//! `front/parse.rs`'s `ParseError` (a newtype around a message, `Display`
//! impl, `Debug` forwarding to it), adapted to carry a line number instead of
//! a byte offset since this format is line-oriented.

use std::fmt;

use crate::common::*;
use crate::tac::{Address, CondCode, Instruction, Operand, TACProc, TACVar, TacItem, Type};

pub struct TextualError(usize, String);

impl fmt::Display for TextualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.0, self.1)
    }
}

impl fmt::Debug for TextualError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// Parse a whole program out of its textual encoding.
///
/// Grammar, one item per top-level line group:
///
/// ```text
/// var NAME = VALUE
///
/// proc NAME(ARG, ARG, ...):
///     OPCODE OPERAND, OPERAND, ...
///     ...
/// endproc
/// ```
///
/// Blank lines and lines starting with `#` are skipped. Operands are either
/// a bare integer literal, or an identifier (a temp/label/proc name,
/// resolved by the instruction's position).
pub fn parse(input: &str) -> Result<Vec<TacItem>, TextualError> {
    let mut items = Vec::new();
    let mut lines = input.lines().enumerate().peekable();

    while let Some((lineno, raw)) = lines.next() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("var ") {
            items.push(TacItem::from(parse_var(lineno + 1, rest)?));
        } else if let Some(rest) = line.strip_prefix("proc ") {
            items.push(TacItem::from(parse_proc(lineno + 1, rest, &mut lines)?));
        } else {
            return Err(TextualError(lineno + 1, format!("expected 'var' or 'proc', got {line:?}")));
        }
    }

    Ok(items)
}

fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}

fn parse_var(lineno: usize, rest: &str) -> Result<TACVar, TextualError> {
    let (name, value) = rest
        .split_once('=')
        .ok_or_else(|| TextualError(lineno, format!("malformed var declaration: {rest:?}")))?;
    let name = name.trim();
    let value = parse_int(lineno, value.trim())?;
    Ok(TACVar::new(name, value))
}

fn parse_proc<'a, I>(
    lineno: usize,
    header: &str,
    lines: &mut std::iter::Peekable<I>,
) -> Result<TACProc, TextualError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let header = header
        .strip_suffix(':')
        .ok_or_else(|| TextualError(lineno, "procedure header must end with ':'".to_string()))?;
    let (name, arglist) = header
        .split_once('(')
        .ok_or_else(|| TextualError(lineno, "procedure header must have an argument list".to_string()))?;
    let arglist = arglist
        .strip_suffix(')')
        .ok_or_else(|| TextualError(lineno, "unterminated argument list".to_string()))?;
    let name = name.trim();
    let arguments: Vec<Id> = arglist
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Id::new(s.to_string()))
        .collect();

    let mut instructions = Vec::new();
    loop {
        let (bodyline, raw) = lines
            .next()
            .ok_or_else(|| TextualError(lineno, format!("unterminated procedure {name:?}")))?;
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }
        if line == "endproc" {
            break;
        }
        instructions.push(parse_instruction(bodyline + 1, line)?);
    }

    Ok(TACProc::new(name, arguments, instructions))
}

fn parse_instruction(lineno: usize, line: &str) -> Result<Instruction, TextualError> {
    let (mnemonic, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let args: Vec<&str> = if rest.trim().is_empty() {
        Vec::new()
    } else {
        rest.split(',').map(str::trim).collect()
    };

    let id_at = |i: usize| -> Result<Id, TextualError> { Ok(Id::new(arg(lineno, &args, i)?.to_string())) };
    let op_at = |i: usize| -> Result<Operand, TextualError> { parse_operand(lineno, arg(lineno, &args, i)?) };

    let instr = match mnemonic {
        "const" => Instruction::Const { dst: id_at(0)?, value: parse_int(lineno, arg(lineno, &args, 1)?)? },
        "copy" => Instruction::Copy { dst: id_at(0)?, src: op_at(1)? },
        "neg" => Instruction::Neg { dst: id_at(0)?, src: op_at(1)? },
        "not" => Instruction::Not { dst: id_at(0)?, src: op_at(1)? },
        "add" => Instruction::Add { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "sub" => Instruction::Sub { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "mul" => Instruction::Mul { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "div" => Instruction::Div { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "mod" => Instruction::Mod { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "and" => Instruction::And { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "or" => Instruction::Or { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "xor" => Instruction::Xor { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "shl" => Instruction::Shl { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "shr" => Instruction::Shr { dst: id_at(0)?, lhs: op_at(1)?, rhs: op_at(2)? },
        "print" => Instruction::Print { src: op_at(0)? },
        "jmp" => Instruction::Jmp { target: id_at(0)? },
        "cjmp" => Instruction::CJmp {
            cond: parse_cond(lineno, arg(lineno, &args, 0)?)?,
            src: op_at(1)?,
            target: id_at(2)?,
        },
        "param" => Instruction::Param {
            index: parse_int(lineno, arg(lineno, &args, 0)?)? as usize,
            src: op_at(1)?,
        },
        "call" => Instruction::Call {
            dst: Some(id_at(0)?),
            target: id_at(1)?,
            nargs: parse_int(lineno, arg(lineno, &args, 2)?)? as usize,
        },
        "callv" => Instruction::Call {
            dst: None,
            target: id_at(0)?,
            nargs: parse_int(lineno, arg(lineno, &args, 1)?)? as usize,
        },
        "ret" => Instruction::Ret { src: if args.is_empty() { None } else { Some(op_at(0)?) } },
        "label" => Instruction::Label(id_at(0)?),
        "alloc" => Instruction::MemoryAllocation {
            dst: id_at(0)?,
            count: op_at(1)?,
            elem_size: parse_type(lineno, arg(lineno, &args, 2)?)?,
        },
        "zero" => Instruction::MemoryInitialization { base: op_at(0)?, nbytes: op_at(1)? },
        "addr" => Instruction::MemoryPointer { dst: id_at(0)?, src: op_at(1)? },
        "load" => Instruction::MemoryLoad { dst: id_at(0)?, addr: parse_address(lineno, &args[1..])? },
        "store" => Instruction::MemoryStore { addr: parse_address(lineno, &args[..args.len() - 1])?, src: op_at(args.len() - 1)? },
        "copyarr" => Instruction::MemoryArrayCopy { dst: op_at(0)?, src: op_at(1)?, nbytes: op_at(2)? },
        other => return Err(TextualError(lineno, format!("unknown opcode {other:?}"))),
    };

    Ok(instr)
}

fn parse_address(lineno: usize, args: &[&str]) -> Result<Address, TextualError> {
    match args {
        [base] => Ok(Address::Base(parse_operand(lineno, base)?)),
        [base, offset] => Ok(Address::BaseOffset(parse_operand(lineno, base)?, parse_operand(lineno, offset)?)),
        _ => Err(TextualError(lineno, "address expects a base and an optional offset".to_string())),
    }
}

fn arg<'a>(lineno: usize, args: &[&'a str], i: usize) -> Result<&'a str, TextualError> {
    args.get(i).copied().ok_or_else(|| TextualError(lineno, format!("expected operand {}", i + 1)))
}

fn parse_operand(lineno: usize, text: &str) -> Result<Operand, TextualError> {
    if let Ok(n) = text.parse::<i64>() {
        Ok(Operand::Int(n))
    } else if !text.is_empty() {
        Ok(Operand::temp(text))
    } else {
        Err(TextualError(lineno, "expected an operand".to_string()))
    }
}

fn parse_int(lineno: usize, text: &str) -> Result<i64, TextualError> {
    text.parse::<i64>().map_err(|_| TextualError(lineno, format!("expected an integer, got {text:?}")))
}

/// Parse a type token: `void`, `bool`, `int`, `ptr:<type>`, or
/// `arr:<type>:<n>`. The recursive forms let `alloc` describe a pointer- or
/// array-typed element without a separate grammar production.
fn parse_type(lineno: usize, text: &str) -> Result<Type, TextualError> {
    match text {
        "void" => Ok(Type::Void),
        "bool" => Ok(Type::Bool),
        "int" => Ok(Type::Int),
        other => {
            if let Some(inner) = other.strip_prefix("ptr:") {
                Ok(Type::Pointer(Box::new(parse_type(lineno, inner)?)))
            } else if let Some(rest) = other.strip_prefix("arr:") {
                let (elem, n) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| TextualError(lineno, format!("malformed array type {other:?}")))?;
                let n = parse_int(lineno, n)? as usize;
                Ok(Type::Array(Box::new(parse_type(lineno, elem)?), n))
            } else {
                Err(TextualError(lineno, format!("unknown type {other:?}")))
            }
        }
    }
}

fn parse_cond(lineno: usize, text: &str) -> Result<CondCode, TextualError> {
    match text {
        "z" => Ok(CondCode::Zero),
        "nz" => Ok(CondCode::NotZero),
        "lt" => Ok(CondCode::Less),
        "le" => Ok(CondCode::LessEq),
        "gt" => Ok(CondCode::Greater),
        "ge" => Ok(CondCode::GreaterEq),
        other => Err(TextualError(lineno, format!("unknown condition code {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_global_and_a_procedure() {
        let src = "
            var g = 42

            proc id(x):
                copy r, x
                ret r
            endproc
        ";
        let items = parse(src).unwrap();
        assert_eq!(items.len(), 2);
        match &items[0] {
            TacItem::Var(v) => {
                assert_eq!(v.name.as_str(), "g");
                assert_eq!(v.init, 42);
            }
            _ => panic!("expected a var"),
        }
        match &items[1] {
            TacItem::Proc(p) => {
                assert_eq!(p.name.as_str(), "id");
                assert_eq!(p.arguments.len(), 1);
                assert_eq!(p.instructions.len(), 2);
            }
            _ => panic!("expected a proc"),
        }
    }

    #[test]
    fn rejects_unknown_opcodes() {
        let src = "proc f():\n    frobnicate x\nendproc\n";
        let err = parse(src).unwrap_err();
        assert!(err.to_string().contains("unknown opcode"));
    }

    #[test]
    fn rejects_unterminated_procedure() {
        let src = "proc f():\n    ret\n";
        let err = parse(src).unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }
}
