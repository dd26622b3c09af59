// This module defines the error types for the optir IR using the thiserror
// crate. IrError covers the invalid-argument class of failures: malformed PHI
// nodes, struct field lookups out of range, blocks missing a terminator, and
// references to removed instructions or blocks discovered by the verifier.
// Optimization passes never produce these errors; a pass that cannot prove a
// transform safe simply reports no change. Allocation failure is fatal (Rust
// aborts on OOM) rather than silently ignored.

//! Error types for IR construction and verification.

use thiserror::Error;

/// Errors raised by IR constructors and the structural verifier.
#[derive(Error, Debug)]
pub enum IrError {
    #[error("phi has {values} incoming values but {blocks} incoming blocks")]
    PhiArity { values: usize, blocks: usize },

    #[error("phi {name} appears after a non-phi instruction")]
    PhiNotAtHead { name: String },

    #[error("field index {index} out of range for struct {name} with {count} fields")]
    FieldOutOfRange {
        index: usize,
        name: String,
        count: usize,
    },

    #[error("type is not a struct")]
    NotAStruct,

    #[error("block {label} has no terminator")]
    MissingTerminator { label: String },

    #[error("block {label} has an instruction after its terminator")]
    InstructionAfterTerminator { label: String },

    #[error("function {name} has no entry block")]
    NoEntry { name: String },

    #[error("reference to removed instruction in block {label}")]
    StaleInstruction { label: String },

    #[error("branch in block {label} targets a removed block")]
    StaleTarget { label: String },
}

/// Result type alias for IR operations.
pub type IrResult<T> = Result<T, IrError>;
