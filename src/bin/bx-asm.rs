//! A demonstration driver for the code generator: reads a textually-encoded
//! TAC program and prints the assembly the chosen backend lowers it to.
//!
//! This is not a BX compiler; there is no lexer, parser, type-checker, or
//! AST-to-TAC translator here, only the backend and the minimal textual TAC
//! reader in `textual.rs` that stands in for a real translator's output.
//!
//! Run with `--help` for more info.

use std::process::ExitCode;

use clap::Parser;

use bx_codegen::backend;
use bx_codegen::error::CodegenError;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input file, holding a textually-encoded TAC program
    file: String,
    /// the backend to lower to
    #[arg(short, long, default_value = "x64-linux")]
    backend: String,
}

fn run(args: &Args) -> Result<String, CodegenError> {
    let input = std::fs::read_to_string(&args.file)
        .map_err(|e| CodegenError::Textual(format!("reading {:?}: {e}", args.file)))?;
    let program = bx_codegen::textual::parse(&input).map_err(|e| CodegenError::Textual(e.to_string()))?;
    backend::lower(&program, &args.backend)
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(asm) => {
            print!("{asm}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("bx-asm: {e}");
            ExitCode::FAILURE
        }
    }
}
