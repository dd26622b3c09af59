// This module implements control-flow graph simplification as four
// sub-transforms run to a fixpoint: constant conditional branches become
// unconditional, forwarding blocks (only an unconditional branch) are cut out
// of their edges, a block with a single unconditional-branch predecessor is
// spliced into it, and blocks unreachable from entry are removed. Every edge
// rewrite also maintains the PHI incoming-block lists of the affected targets.
// The entry block is never removed or merged away.

//! Control-flow graph simplification.

use hashbrown::HashSet;

use crate::ir::cfg;
use crate::ir::function::Function;
use crate::ir::inst::Opcode;
use crate::ir::types::TypeContext;
use crate::ir::value::BlockId;
use crate::passes::{Pass, MAX_ITERATIONS};

pub struct SimplifyCfg;

impl Pass for SimplifyCfg {
    fn name(&self) -> &'static str {
        "simplify-cfg"
    }

    fn run(&self, func: &mut Function, _types: &TypeContext) -> bool {
        simplify_cfg(func)
    }
}

/// Drop `pred`'s incoming entries from every PHI at the head of `target`.
fn remove_phi_edges(func: &mut Function, target: BlockId, pred: BlockId) {
    for id in func.live_insts(target) {
        if func.inst(id).op != Opcode::Phi {
            break;
        }
        let inst = func.inst_mut(id);
        while let Some(pos) = inst.incoming.iter().position(|&b| b == pred) {
            inst.incoming.remove(pos);
            inst.operands.remove(pos);
        }
    }
}

/// Rewrite `old` to `new` in every PHI incoming-block list of `target`.
fn retarget_phi_edges(func: &mut Function, target: BlockId, old: BlockId, new: BlockId) {
    for id in func.live_insts(target) {
        if func.inst(id).op != Opcode::Phi {
            break;
        }
        for b in func.inst_mut(id).incoming.iter_mut() {
            if *b == old {
                *b = new;
            }
        }
    }
}

fn block_has_phis(func: &Function, b: BlockId) -> bool {
    func.live_insts(b)
        .first()
        .is_some_and(|&i| func.inst(i).op == Opcode::Phi)
}

/// (a) Turn terminators with a compile-time-known direction into plain
/// branches.
fn resolve_constant_branches(func: &mut Function) -> bool {
    let mut changed = false;
    for block in func.layout().to_vec() {
        let Some(term) = func.terminator(block) else { continue };
        let inst = func.inst(term);
        let taken = match inst.op {
            Opcode::CondBr => {
                if inst.targets[0] == inst.targets[1] {
                    Some(inst.targets[0])
                } else {
                    func.as_const_int(inst.operands[0]).map(|c| {
                        if c != 0 {
                            inst.targets[0]
                        } else {
                            inst.targets[1]
                        }
                    })
                }
            }
            _ => None,
        };
        let Some(taken) = taken else { continue };
        let abandoned: Vec<BlockId> = func
            .inst(term)
            .targets
            .iter()
            .copied()
            .filter(|&t| t != taken)
            .collect();
        let inst = func.inst_mut(term);
        inst.op = Opcode::Br;
        inst.operands.clear();
        inst.targets = vec![taken];
        for t in abandoned {
            remove_phi_edges(func, t, block);
        }
        log::debug!("simplify-cfg: constant branch in {}", func.block(block).label);
        changed = true;
    }
    changed
}

/// (b) Cut a block holding nothing but an unconditional branch out of every
/// edge through it.
fn skip_forwarding_blocks(func: &mut Function) -> bool {
    let entry = func.entry();
    let mut changed = false;
    for block in func.layout().to_vec() {
        if Some(block) == entry {
            continue;
        }
        let insts = func.live_insts(block);
        let &[only] = insts.as_slice() else { continue };
        if func.inst(only).op != Opcode::Br {
            continue;
        }
        let succ = func.inst(only).targets[0];
        if succ == block {
            continue;
        }
        let mut pred_map = cfg::predecessors(func);
        let preds: Vec<BlockId> = pred_map.remove(&block).unwrap_or_default();
        if preds.is_empty() {
            continue;
        }
        // A PHI in the successor needs one incoming per new edge; only a
        // single predecessor that does not already reach the successor keeps
        // that a pure relabel.
        if block_has_phis(func, succ) {
            let already = pred_map
                .get(&succ)
                .is_some_and(|ps| ps.contains(&preds[0]));
            if preds.len() != 1 || already {
                continue;
            }
        }
        for &pred in &preds {
            let Some(term) = func.terminator(pred) else { continue };
            for t in func.inst_mut(term).targets.iter_mut() {
                if *t == block {
                    *t = succ;
                }
            }
            retarget_phi_edges(func, succ, block, pred);
        }
        log::debug!("simplify-cfg: skipping forwarder {}", func.block(block).label);
        changed = true;
    }
    changed
}

/// (c) Splice a single-predecessor block into the unconditional branch that
/// targets it.
fn merge_into_predecessor(func: &mut Function) -> bool {
    let entry = func.entry();
    let mut changed = false;
    'outer: loop {
        let preds = cfg::predecessors(func);
        for block in func.layout().to_vec() {
            if Some(block) == entry || !func.block_is_live(block) {
                continue;
            }
            let &[pred] = preds.get(&block).map(Vec::as_slice).unwrap_or(&[]) else {
                continue;
            };
            if pred == block || block_has_phis(func, block) {
                continue;
            }
            let Some(term) = func.terminator(pred) else { continue };
            if func.inst(term).op != Opcode::Br {
                continue;
            }
            func.remove_inst(term);
            let moved = std::mem::take(&mut func.block_mut(block).insts);
            for inst in moved {
                if func.inst_is_live(inst) && !func.inst(inst).dead {
                    func.append_to_block(pred, inst);
                } else if func.inst_is_live(inst) {
                    func.remove_inst(inst);
                }
            }
            // Successor PHIs now see the edge arriving from the predecessor.
            for succ in cfg::successors(func, pred) {
                retarget_phi_edges(func, succ, block, pred);
            }
            func.remove_block(block);
            log::debug!("simplify-cfg: merged a single-predecessor block");
            changed = true;
            continue 'outer;
        }
        break;
    }
    changed
}

/// (d) Remove every block the entry cannot reach.
fn remove_unreachable_blocks(func: &mut Function) -> bool {
    let live: HashSet<BlockId> = cfg::reachable(func);
    let dead: Vec<BlockId> = func
        .layout()
        .iter()
        .copied()
        .filter(|b| !live.contains(b))
        .collect();
    if dead.is_empty() {
        return false;
    }
    for &b in &dead {
        func.remove_block(b);
    }
    for &survivor in &live {
        for &gone in &dead {
            remove_phi_edges(func, survivor, gone);
        }
    }
    log::debug!("simplify-cfg: removed {} unreachable block(s)", dead.len());
    true
}

/// Run all four sub-transforms to a fixpoint. Returns whether anything
/// changed.
pub fn simplify_cfg(func: &mut Function) -> bool {
    if func.is_declaration() {
        return false;
    }
    let mut changed = false;
    for _ in 0..MAX_ITERATIONS {
        let mut round = false;
        round |= resolve_constant_branches(func);
        round |= skip_forwarding_blocks(func);
        round |= merge_into_predecessor(func);
        round |= remove_unreachable_blocks(func);
        if !round {
            break;
        }
        changed = true;
    }
    changed
}
