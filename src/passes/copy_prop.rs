// This module implements copy propagation. The IR has no explicit copy
// instruction; what it does have is instructions that are identity operations
// against a constant (x + 0, x | 0, x & -1, x * 1, ...), which lowering and
// other passes produce freely. For each such instruction the non-constant
// operand is the real value: every use of the result, function wide, is
// rewritten to read that source directly. The now-unused identity instruction
// is left in place for DCE to reclaim.

//! Copy propagation.

use crate::ir::function::Function;
use crate::ir::inst::Opcode;
use crate::ir::types::TypeContext;
use crate::ir::value::ValueId;
use crate::passes::Pass;

pub struct CopyProp;

impl Pass for CopyProp {
    fn name(&self) -> &'static str {
        "copy-prop"
    }

    fn run(&self, func: &mut Function, types: &TypeContext) -> bool {
        propagate_copies(func, types)
    }
}

/// The source value of an identity operation, if the instruction is one.
fn copy_source(func: &Function, types: &TypeContext, id: crate::ir::value::InstId) -> Option<ValueId> {
    let inst = func.inst(id);
    if inst.operands.len() != 2 {
        return None;
    }
    let (lhs, rhs) = (inst.operands[0], inst.operands[1]);
    let width = types.int_width(inst.ty)?;

    let const_of = |v: ValueId| func.as_const_int(v);
    let is = |v: ValueId, want: i64| {
        const_of(v).is_some_and(|c| {
            let masked = if width >= 64 { c } else { c & ((1i64 << width) - 1) };
            let want = if width >= 64 { want } else { want & ((1i64 << width) - 1) };
            masked == want
        })
    };

    match inst.op {
        // Neutral element zero; add/or/xor accept it on either side.
        Opcode::Add | Opcode::Or | Opcode::Xor => {
            if is(rhs, 0) {
                Some(lhs)
            } else if is(lhs, 0) {
                Some(rhs)
            } else {
                None
            }
        }
        Opcode::Sub | Opcode::Shl | Opcode::Shr | Opcode::Sar => {
            if is(rhs, 0) {
                Some(lhs)
            } else {
                None
            }
        }
        Opcode::And => {
            if is(rhs, -1) {
                Some(lhs)
            } else if is(lhs, -1) {
                Some(rhs)
            } else {
                None
            }
        }
        Opcode::Mul => {
            if is(rhs, 1) {
                Some(lhs)
            } else if is(lhs, 1) {
                Some(rhs)
            } else {
                None
            }
        }
        Opcode::Sdiv | Opcode::Udiv => {
            if is(rhs, 1) {
                Some(lhs)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Rewrite uses of identity-operation results to their sources. Returns
/// whether anything changed.
pub fn propagate_copies(func: &mut Function, types: &TypeContext) -> bool {
    let mut changed = false;
    for block in func.layout().to_vec() {
        for id in func.live_insts(block) {
            let Some(result) = func.inst(id).result else { continue };
            let Some(source) = copy_source(func, types, id) else { continue };
            if source == result {
                continue;
            }
            if !func.value_is_used(result) {
                continue;
            }
            func.replace_all_uses(result, source);
            changed = true;
        }
    }
    changed
}
