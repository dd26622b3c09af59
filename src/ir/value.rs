// This module defines SSA values for the optir IR. A value is a tagged record
// stored in its owning function's value arena and addressed by a copyable
// ValueId handle; identity throughout the optimizer is ValueId equality.
// Constants are ordinary
// value records created on demand with no interning, so two ConstInt(5)
// entries may have different ids; values_equal looks through that by also
// comparing constant payloads. Param and Inst values back-reference their
// defining parameter slot or instruction; an Inst value must not be consulted
// once its instruction has been removed from the function.

//! SSA values.

use crate::ir::types::TypeId;

/// Handle to a value in a function's value arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub(crate) u32);

macro_rules! impl_index {
    ($($id:ident),*) => {
        $(impl $id {
            /// Position in the owning arena.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        })*
    };
}

impl_index!(ValueId, InstId, BlockId, FuncId, GlobalId);

/// Handle to an instruction in a function's instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstId(pub(crate) u32);

/// Handle to a basic block in a function's block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

/// Handle to a function in a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub(crate) u32);

/// Handle to a global in a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalId(pub(crate) u32);

/// What a value is: a constant, a symbol reference, or the result of a
/// parameter or instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    ConstInt(i64),
    ConstFloat(f64),
    ConstNull,
    ConstString(String),
    Global(GlobalId),
    Func(FuncId),
    /// Parameter of the owning function, by index.
    Param(u32),
    /// Result of an instruction in the owning function.
    Inst(InstId),
}

/// A value record: kind, type, and an optional display name.
#[derive(Debug, Clone)]
pub struct ValueData {
    pub kind: ValueKind,
    pub ty: TypeId,
    pub name: Option<String>,
}

impl ValueData {
    pub fn is_const(&self) -> bool {
        matches!(
            self.kind,
            ValueKind::ConstInt(_)
                | ValueKind::ConstFloat(_)
                | ValueKind::ConstNull
                | ValueKind::ConstString(_)
        )
    }

    /// Integer constant payload, if this is a `ConstInt`.
    pub fn as_const_int(&self) -> Option<i64> {
        match self.kind {
            ValueKind::ConstInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_const_float(&self) -> Option<f64> {
        match self.kind {
            ValueKind::ConstFloat(v) => Some(v),
            _ => None,
        }
    }
}
