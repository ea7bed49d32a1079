//! The typed fatal conditions the backend can raise while lowering TAC.
//!
//! The in-memory [`crate::tac::Instruction`] enum is closed and matched
//! exhaustively, so most of these can only come from the textual TAC encoding
//! parsed by the demonstration CLI (`src/textual.rs`) — a frontend that hands
//! the backend already-typed `Instruction` values can never trigger
//! `UnknownOpcode`, `ParamSequencing`, or `ArgCountMismatch` by construction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),

    #[error("parameter sequencing error: expected param index {expected}, got {actual}")]
    ParamSequencing { expected: usize, actual: usize },

    #[error("argument count mismatch: call declared {declared} argument(s), but {buffered} were buffered")]
    ArgCountMismatch { declared: usize, buffered: usize },

    #[error("no such backend: {0}")]
    NoSuchBackend(String),

    #[error("{0}")]
    Textual(String),
}
