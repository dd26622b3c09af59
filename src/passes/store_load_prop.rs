// This module implements store-to-load forwarding. It looks exactly one live
// instruction past each store: when that instruction is a load from the
// identical address, the load's result is rewritten function wide to the
// stored value and the load marked dead. Removing a load can expose the next
// store/load pair, so the pass loops to a fixpoint with the same bound the
// pass manager uses.

//! Store-load propagation.

use crate::ir::function::Function;
use crate::ir::inst::Opcode;
use crate::ir::types::TypeContext;
use crate::passes::dead_store::same_address;
use crate::passes::{Pass, MAX_ITERATIONS};

pub struct StoreLoadProp;

impl Pass for StoreLoadProp {
    fn name(&self) -> &'static str {
        "store-load-prop"
    }

    fn run(&self, func: &mut Function, _types: &TypeContext) -> bool {
        propagate_stored_values(func)
    }
}

fn forward_once(func: &mut Function) -> bool {
    let mut changed = false;
    for block in func.layout().to_vec() {
        let insts = func.live_insts(block);
        for pair in insts.windows(2) {
            let (store, next) = (pair[0], pair[1]);
            if !func.inst_is_live(store) || !func.inst_is_live(next) {
                continue;
            }
            if func.inst(store).op != Opcode::Store || func.inst(next).op != Opcode::Load {
                continue;
            }
            let stored = func.inst(store).operands[0];
            let addr = func.inst(store).operands[1];
            if !same_address(func, addr, func.inst(next).operands[0]) {
                continue;
            }
            let result = func.inst(next).result.unwrap();
            log::debug!(
                "store-load-prop: forwarding stored value in {}",
                func.block(block).label
            );
            func.replace_all_uses(result, stored);
            func.kill(next);
            changed = true;
        }
    }
    changed
}

/// Forward stored values into immediately following loads of the same
/// address. Returns whether anything changed.
pub fn propagate_stored_values(func: &mut Function) -> bool {
    let mut changed = false;
    for _ in 0..MAX_ITERATIONS {
        if !forward_once(func) {
            break;
        }
        changed = true;
    }
    changed
}
