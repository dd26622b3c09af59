// This module defines the instruction set of the optir IR: the Opcode enum
// with its predicate helpers and the InstData record stored in each function's
// instruction arena. The helpers (is_terminator, has_side_effects,
// is_commutative, ...) are the single source of truth the passes consult; no
// pass keeps its own opcode classification. An instruction is
// logically deleted by setting its dead flag; DCE and block removal later
// free the arena slot, after
// which any surviving handle to it panics on access instead of reading a
// half-dead record.

//! IR instructions.

use crate::ir::types::TypeId;
use crate::ir::value::{BlockId, ValueId};

/// Every operation the IR can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // Integer arithmetic.
    Add,
    Sub,
    Mul,
    Sdiv,
    Udiv,
    Smod,
    Umod,
    // Bitwise.
    And,
    Or,
    Xor,
    Shl,
    /// Logical (unsigned) right shift.
    Shr,
    /// Arithmetic (sign-propagating) right shift.
    Sar,
    // Unary.
    Neg,
    Not,
    // Float arithmetic.
    FAdd,
    FSub,
    FMul,
    FDiv,
    // Comparisons. Unadorned orderings are signed.
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    CmpUlt,
    CmpUle,
    CmpUgt,
    CmpUge,
    // Memory.
    Alloca,
    Load,
    Store,
    /// Struct field address: operands `[base]`, field index in `agg_field`,
    /// struct type in `agg_ty`.
    Gep,
    // Misc.
    Phi,
    Call,
    // Control transfer.
    Br,
    CondBr,
    Switch,
    Ret,
}

impl Opcode {
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Br | Opcode::CondBr | Opcode::Switch | Opcode::Ret)
    }

    /// Instructions DCE must never remove, regardless of result usage.
    pub fn has_side_effects(self) -> bool {
        matches!(
            self,
            Opcode::Store
                | Opcode::Call
                | Opcode::Br
                | Opcode::CondBr
                | Opcode::Switch
                | Opcode::Ret
        )
    }

    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Mul
                | Opcode::And
                | Opcode::Or
                | Opcode::Xor
                | Opcode::FAdd
                | Opcode::FMul
                | Opcode::CmpEq
                | Opcode::CmpNe
        )
    }

    /// Pure two-operand integer arithmetic or bitwise op.
    pub fn is_int_binary(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Sdiv
                | Opcode::Udiv
                | Opcode::Smod
                | Opcode::Umod
                | Opcode::And
                | Opcode::Or
                | Opcode::Xor
                | Opcode::Shl
                | Opcode::Shr
                | Opcode::Sar
        )
    }

    pub fn is_float_binary(self) -> bool {
        matches!(self, Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv)
    }

    pub fn is_cmp(self) -> bool {
        matches!(
            self,
            Opcode::CmpEq
                | Opcode::CmpNe
                | Opcode::CmpLt
                | Opcode::CmpLe
                | Opcode::CmpGt
                | Opcode::CmpGe
                | Opcode::CmpUlt
                | Opcode::CmpUle
                | Opcode::CmpUgt
                | Opcode::CmpUge
        )
    }

    /// Pure binary ops eligible for local value numbering.
    pub fn is_pure_binary(self) -> bool {
        self.is_int_binary() || self.is_float_binary() || self.is_cmp()
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Sdiv => "sdiv",
            Opcode::Udiv => "udiv",
            Opcode::Smod => "smod",
            Opcode::Umod => "umod",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Xor => "xor",
            Opcode::Shl => "shl",
            Opcode::Shr => "shr",
            Opcode::Sar => "sar",
            Opcode::Neg => "neg",
            Opcode::Not => "not",
            Opcode::FAdd => "fadd",
            Opcode::FSub => "fsub",
            Opcode::FMul => "fmul",
            Opcode::FDiv => "fdiv",
            Opcode::CmpEq => "cmp.eq",
            Opcode::CmpNe => "cmp.ne",
            Opcode::CmpLt => "cmp.lt",
            Opcode::CmpLe => "cmp.le",
            Opcode::CmpGt => "cmp.gt",
            Opcode::CmpGe => "cmp.ge",
            Opcode::CmpUlt => "cmp.ult",
            Opcode::CmpUle => "cmp.ule",
            Opcode::CmpUgt => "cmp.ugt",
            Opcode::CmpUge => "cmp.uge",
            Opcode::Alloca => "alloca",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::Gep => "gep",
            Opcode::Phi => "phi",
            Opcode::Call => "call",
            Opcode::Br => "br",
            Opcode::CondBr => "condbr",
            Opcode::Switch => "switch",
            Opcode::Ret => "ret",
        }
    }
}

/// One instruction in a function's arena.
///
/// Operand conventions:
/// - `Store`: `[value, pointer]`
/// - `Load`: `[pointer]`
/// - `Gep`: `[base]` with `agg_ty`/`agg_field` naming the struct field
/// - `CondBr`: `[condition]`, `targets = [on_true, on_false]`
/// - `Switch`: `[scrutinee]`, `targets = [default, case0, case1, ...]`
/// - `Phi`: operands parallel to `incoming`
/// - `Call`: `[callee, args...]`
#[derive(Debug, Clone)]
pub struct InstData {
    pub op: Opcode,
    pub operands: Vec<ValueId>,
    /// Result value, present iff the result type is non-void.
    pub result: Option<ValueId>,
    /// Result type; void for instructions without a result.
    pub ty: TypeId,
    /// Owning block.
    pub block: BlockId,
    /// Control-transfer targets; empty for non-terminators.
    pub targets: Vec<BlockId>,
    /// Phi incoming blocks, parallel to `operands`. Empty for non-phis.
    pub incoming: Vec<BlockId>,
    /// Struct type consulted for `Gep` offset lookups.
    pub agg_ty: Option<TypeId>,
    /// Field index for `Gep`.
    pub agg_field: u32,
    /// Logical-delete marker; set by passes, slot freed by cleanup.
    pub dead: bool,
}

impl InstData {
    pub fn is_terminator(&self) -> bool {
        self.op.is_terminator()
    }

    /// Phi incoming value arriving from `block`, if that edge exists.
    pub fn phi_incoming_from(&self, block: BlockId) -> Option<ValueId> {
        debug_assert_eq!(self.op, Opcode::Phi);
        self.incoming
            .iter()
            .position(|&b| b == block)
            .map(|i| self.operands[i])
    }
}
