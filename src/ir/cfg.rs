// This module derives control-flow edges on demand. Edges are not stored on
// blocks: every query reads the current terminators, so passes that retarget
// branches or drop blocks never have to keep an edge list coherent. The
// reachability walk is a plain DFS from the entry block; only the reachable
// set matters, not the visit order.

//! Derived CFG queries: successors, predecessors, reachability.

use hashbrown::{HashMap, HashSet};

use crate::ir::function::Function;
use crate::ir::value::BlockId;

/// Successor blocks of `b`, from its terminator. A block without a
/// terminator has no successors.
pub fn successors(func: &Function, b: BlockId) -> Vec<BlockId> {
    match func.terminator(b) {
        Some(t) => func.inst(t).targets.clone(),
        None => Vec::new(),
    }
}

/// Map from each live block to its predecessors, in layout order.
pub fn predecessors(func: &Function) -> HashMap<BlockId, Vec<BlockId>> {
    let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for &b in func.layout() {
        preds.entry(b).or_default();
    }
    for &b in func.layout() {
        for succ in successors(func, b) {
            preds.entry(succ).or_default().push(b);
        }
    }
    preds
}

/// Blocks reachable from the entry block by following terminator targets.
pub fn reachable(func: &Function) -> HashSet<BlockId> {
    let mut seen = HashSet::new();
    let Some(entry) = func.entry() else {
        return seen;
    };
    let mut stack = vec![entry];
    while let Some(b) = stack.pop() {
        if !seen.insert(b) {
            continue;
        }
        for succ in successors(func, b) {
            if !seen.contains(&succ) {
                stack.push(succ);
            }
        }
    }
    seen
}

/// Whether `from` can reach `to` without passing through `barrier`.
/// Used by loop recognition to tell the loop body from the exit.
pub fn reaches_avoiding(
    func: &Function,
    from: BlockId,
    to: &[BlockId],
    barrier: BlockId,
) -> bool {
    if to.contains(&from) {
        return true;
    }
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(b) = stack.pop() {
        if b == barrier || !seen.insert(b) {
            continue;
        }
        for succ in successors(func, b) {
            if to.contains(&succ) {
                return true;
            }
            stack.push(succ);
        }
    }
    false
}
