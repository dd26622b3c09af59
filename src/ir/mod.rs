// This module is the hub for the IR data model: the type system, the
// value/instruction/block/function graph with its arena storage, the
// insertion-cursor builder, derived CFG queries, the structural verifier, and
// the error types shared by all of them. The optimization passes live in the
// sibling passes module and consume everything re-exported here.

//! The typed IR: types, values, instructions, blocks, functions, modules.

pub mod builder;
pub mod cfg;
pub mod error;
pub mod function;
pub mod inst;
pub mod module;
pub mod types;
pub mod value;
pub mod verify;

pub use builder::Builder;
pub use error::{IrError, IrResult};
pub use function::{BlockData, Function};
pub use inst::{InstData, Opcode};
pub use module::{Global, Init, Linkage, Module};
pub use types::{TypeContext, TypeId, TypeKind};
pub use value::{BlockId, FuncId, GlobalId, InstId, ValueData, ValueId, ValueKind};
