//! optir - Typed IR and optimization pipeline.
//!
//! optir provides a small typed SSA-like intermediate representation and a
//! pass pipeline over it: a module holds functions, a function holds basic
//! blocks, a block holds instructions ending in one control transfer. A
//! builder appends instructions at a cursor, and a pass manager drives the
//! registered optimizations to a bounded fixpoint per optimization level.
//!
//! # Primary Usage
//!
//! ```
//! use optir::{Module, Opcode, Linkage, PassManager, Builder};
//!
//! let mut module = Module::new("demo");
//! let i32t = module.types.i32();
//! let fty = module.types.function_type(i32t, &[i32t], false);
//! let f = module.define_function("double", fty, Linkage::Public, &[i32t]);
//!
//! let func = module.function_mut(f);
//! let p = func.params[0];
//! let mut b = Builder::new(func);
//! let entry = b.create_block("entry");
//! b.position_at_end(entry);
//! let two = b.const_int(i32t, 2);
//! let prod = b.binary(Opcode::Mul, i32t, p, two);
//! b.ret(Some(prod));
//!
//! let pm = PassManager::new();
//! pm.run_module(&mut module);
//! ```
//!
//! # Architecture
//!
//! - [`ir`] - Types, values, instructions, blocks, functions, modules, the
//!   builder, derived CFG queries, and the verifier
//! - [`passes`] - The optimization passes and the pass manager that
//!   schedules them

pub mod ir;
pub mod passes;

pub use ir::{
    Builder, Function, Global, Init, IrError, IrResult, Linkage, Module, Opcode, TypeContext,
    TypeId, TypeKind,
};
pub use passes::{OptLevel, Pass, PassManager};
