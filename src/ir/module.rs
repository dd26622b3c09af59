// This module defines the top of the ownership tree: a Module owns its
// TypeContext, every Function, and every Global. A function is either a
// definition (has blocks) or a declaration (no body); globals carry a linkage
// and an optional initializer tree. Ownership is structural: dropping the
// module drops all functions, blocks, instructions and values exactly once.
// Aggregate constants (strings, arrays) live here as initializer trees rather
// than in function value arenas; passes only ever compare scalar constants.

//! Modules and globals.

use crate::ir::builder::Builder;
use crate::ir::function::Function;
use crate::ir::types::{TypeContext, TypeId};
use crate::ir::value::{FuncId, GlobalId};

/// Symbol linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    /// Defined here, visible outside the module.
    Public,
    /// Defined here, local to the module.
    Internal,
    /// Declared only; the definition lives elsewhere.
    External,
}

/// A global initializer.
#[derive(Debug, Clone, PartialEq)]
pub enum Init {
    Int(i64),
    Float(f64),
    Null,
    Str(String),
    Zero,
    Array(Vec<Init>),
}

/// A module-level variable.
#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub ty: TypeId,
    pub linkage: Linkage,
    pub init: Option<Init>,
}

/// Owns the types, functions and globals of one translation unit.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub types: TypeContext,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            types: TypeContext::new(),
            functions: Vec::new(),
            globals: Vec::new(),
        }
    }

    /// Add a function definition. Blocks are added through a [`Builder`].
    pub fn define_function(
        &mut self,
        name: &str,
        ty: TypeId,
        linkage: Linkage,
        param_types: &[TypeId],
    ) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(Function::new(name, ty, linkage, param_types));
        id
    }

    /// Add a body-less declaration.
    pub fn declare_function(&mut self, name: &str, ty: TypeId, param_types: &[TypeId]) -> FuncId {
        self.define_function(name, ty, Linkage::External, param_types)
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.0 as usize]
    }

    pub fn add_global(
        &mut self,
        name: &str,
        ty: TypeId,
        linkage: Linkage,
        init: Option<Init>,
    ) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(Global { name: name.to_owned(), ty, linkage, init });
        id
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0 as usize]
    }

    /// A builder positioned in `func`, with the type context alongside.
    pub fn builder(&mut self, func: FuncId) -> Builder<'_> {
        Builder::new(&mut self.functions[func.0 as usize])
    }
}
