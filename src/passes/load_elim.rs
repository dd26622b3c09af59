// This module implements redundant-load elimination. A load is redundant when
// an earlier load in the same block reads the identical address and nothing
// between the two may modify it. "May modify" uses the shared aliasing model:
// a store to a provably different alloca is harmless, any other store is a
// clobber, and a call may write anything. The later load's result is rewritten
// function wide to the earlier result and the load is marked dead for DCE.

//! Redundant-load elimination.

use crate::ir::function::Function;
use crate::ir::inst::Opcode;
use crate::ir::types::TypeContext;
use crate::passes::dead_store::{may_alias, same_address};
use crate::passes::Pass;

pub struct LoadElim;

impl Pass for LoadElim {
    fn name(&self) -> &'static str {
        "load-elim"
    }

    fn run(&self, func: &mut Function, _types: &TypeContext) -> bool {
        eliminate_redundant_loads(func)
    }
}

/// Merge repeated loads of an unmodified address. Returns whether anything
/// changed.
pub fn eliminate_redundant_loads(func: &mut Function) -> bool {
    let mut changed = false;
    for block in func.layout().to_vec() {
        let insts = func.live_insts(block);
        for (i, &load) in insts.iter().enumerate() {
            if func.inst(load).op != Opcode::Load || !func.inst_is_live(load) {
                continue;
            }
            let addr = func.inst(load).operands[0];
            // Walk backward to the nearest unclobbered load of the same
            // address.
            let mut earlier = None;
            for &prev in insts[..i].iter().rev() {
                if !func.inst_is_live(prev) {
                    continue;
                }
                let inst = func.inst(prev);
                match inst.op {
                    Opcode::Load if same_address(func, addr, inst.operands[0]) => {
                        earlier = inst.result;
                        break;
                    }
                    Opcode::Store if may_alias(func, inst.operands[1], addr) => break,
                    Opcode::Call => break,
                    _ => {}
                }
            }
            if let Some(earlier) = earlier {
                let result = func.inst(load).result.unwrap();
                log::debug!(
                    "load-elim: reusing earlier load in {}",
                    func.block(block).label
                );
                func.replace_all_uses(result, earlier);
                func.kill(load);
                changed = true;
            }
        }
    }
    changed
}
