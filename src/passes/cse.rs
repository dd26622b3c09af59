// This module implements local common subexpression elimination. Within a
// single block, pure binary instructions are keyed by opcode and operand ids;
// a repeat lookup hits the table and the later instruction's result is
// rewritten to the earlier one. Commutative opcodes sort their operands before
// keying so a+b and b+a share an entry. The table resets at every store and
// call: either may clobber state the table cannot reason about. It also never
// crosses a block boundary, so no dominance reasoning is needed.

//! Local common subexpression elimination.

use hashbrown::HashMap;

use crate::ir::function::Function;
use crate::ir::inst::Opcode;
use crate::ir::types::TypeContext;
use crate::ir::value::ValueId;
use crate::passes::Pass;

pub struct Cse;

impl Pass for Cse {
    fn name(&self) -> &'static str {
        "cse"
    }

    fn run(&self, func: &mut Function, _types: &TypeContext) -> bool {
        eliminate_common_subexprs(func)
    }
}

#[derive(PartialEq, Eq, Hash)]
struct ExprKey {
    op: Opcode,
    operands: Vec<ValueId>,
}

fn key_for(func: &Function, id: crate::ir::value::InstId) -> Option<ExprKey> {
    let inst = func.inst(id);
    if !inst.op.is_pure_binary() || inst.result.is_none() {
        return None;
    }
    let mut operands = inst.operands.clone();
    if inst.op.is_commutative() {
        operands.sort_unstable_by_key(|v| v.index());
    }
    Some(ExprKey { op: inst.op, operands })
}

/// Deduplicate pure expressions and loads within each block. Returns whether
/// anything changed.
pub fn eliminate_common_subexprs(func: &mut Function) -> bool {
    let mut changed = false;
    for block in func.layout().to_vec() {
        let mut table: HashMap<ExprKey, ValueId> = HashMap::new();
        for id in func.live_insts(block) {
            let op = func.inst(id).op;
            if matches!(op, Opcode::Store | Opcode::Call) {
                table.clear();
                continue;
            }
            let Some(key) = key_for(func, id) else { continue };
            let result = func.inst(id).result.unwrap();
            match table.get(&key) {
                Some(&earlier) => {
                    func.replace_all_uses(result, earlier);
                    func.kill(id);
                    changed = true;
                }
                None => {
                    table.insert(key, result);
                }
            }
        }
    }
    changed
}
