// This module implements dead code elimination. Each sweep first reclaims
// instructions that earlier passes logically deleted through the dead flag,
// then removes any
// result-producing instruction whose result is read by no live instruction
// anywhere in the function; phi incoming values count as reads. Instructions
// on the side-effect list (store, call, and every terminator) are never
// removed regardless of result usage. Removing an instruction can strand the
// operands of another, so the sweep repeats until a full pass over the
// function removes nothing. The used-set is a flat bitvector indexed by value
// id: ids are dense, so this beats hashing.

//! Dead code elimination.

use crate::ir::function::Function;
use crate::ir::types::TypeContext;
use crate::passes::Pass;

pub struct Dce;

impl Pass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&self, func: &mut Function, _types: &TypeContext) -> bool {
        eliminate_dead_code(func)
    }
}

/// Remove dead instructions until a sweep finds nothing. Returns whether
/// anything was removed.
pub fn eliminate_dead_code(func: &mut Function) -> bool {
    let mut used = vec![false; func.value_count()];
    let mut changed = false;
    loop {
        used.iter_mut().for_each(|u| *u = false);
        // Re-grow in case passes added values since the last sweep.
        used.resize(func.value_count(), false);
        func.collect_used_values(&mut used);

        let mut removed = 0usize;
        for block in func.layout().to_vec() {
            for id in func.block(block).insts.clone() {
                if !func.inst_is_live(id) {
                    continue;
                }
                let inst = func.inst(id);
                if inst.dead {
                    func.remove_inst(id);
                    removed += 1;
                    continue;
                }
                if inst.op.has_side_effects() {
                    continue;
                }
                let is_dead = match inst.result {
                    Some(r) => !used[r.index()],
                    // A pure instruction without a result computes nothing.
                    None => true,
                };
                if is_dead {
                    func.remove_inst(id);
                    removed += 1;
                }
            }
        }
        if removed == 0 {
            break;
        }
        changed = true;
    }
    changed
}
