// This module implements unrolling of a restricted loop shape: a header that
// starts with a PHI and ends in a conditional branch, a latch whose
// unconditional branch returns to the header, a single preheader, and a body
// of at most two blocks. The induction variable is the header's first PHI;
// its start comes from the preheader edge and its step from an add feeding
// the back edge. When the start, bound and step are constants the trip count
// follows from the comparison operator, and a short loop (trip count 1..=8,
// body of at most 32 instructions) is unrolled in full: every iteration is
// cloned into the preheader through a value-substitution map, with the
// induction variable replaced by its literal per-iteration value, and the
// preheader then branches straight to the exit. PHIs and terminators are
// never cloned. Partial unrolling duplicates the body inside the latch and
// widens the step; it has no remainder epilogue, so it only runs at a
// configured factor of 2 to 4 and is off in the default pipeline.

//! Loop unrolling.

use hashbrown::HashMap;

use crate::ir::cfg;
use crate::ir::function::Function;
use crate::ir::inst::{InstData, Opcode};
use crate::ir::types::TypeContext;
use crate::ir::value::{BlockId, InstId, ValueId};
use crate::passes::Pass;

const MAX_TRIP_COUNT: i64 = 8;
const MAX_BODY_INSTS: usize = 32;
const MIN_PARTIAL_FACTOR: i64 = 2;
const MAX_PARTIAL_FACTOR: i64 = 4;

pub struct LoopUnroll {
    /// Remainder-less partial unroll factor. `None` (the default) disables
    /// partial unrolling.
    factor: Option<i64>,
}

impl LoopUnroll {
    /// A pass that also partially unrolls by `factor` copies per back edge,
    /// clamped to the supported 2..=4 range.
    pub fn with_factor(factor: i64) -> Self {
        Self {
            factor: Some(factor.clamp(MIN_PARTIAL_FACTOR, MAX_PARTIAL_FACTOR)),
        }
    }
}

impl Default for LoopUnroll {
    fn default() -> Self {
        Self { factor: None }
    }
}

impl Pass for LoopUnroll {
    fn name(&self) -> &'static str {
        "loop-unroll"
    }

    fn run(&self, func: &mut Function, _types: &TypeContext) -> bool {
        unroll_loops(func, self.factor)
    }
}

struct LoopShape {
    preheader: BlockId,
    header: BlockId,
    body: BlockId,
    latch: BlockId,
    exit: BlockId,
    iv_phi: InstId,
    /// Back-edge add; its constant operand is the step.
    advance: InstId,
    init: i64,
    step: i64,
    bound: i64,
    cmp_op: Opcode,
}

/// Trip count for `iv = init; iv cmp bound; iv += step`, when the shape
/// admits one.
fn trip_count(shape: &LoopShape) -> Option<i64> {
    let diff = shape.bound.checked_sub(shape.init)?;
    let step = shape.step;
    match shape.cmp_op {
        Opcode::CmpLt | Opcode::CmpUlt => {
            if diff <= 0 {
                Some(0)
            } else {
                Some(diff.checked_add(step - 1)?.div_euclid(step))
            }
        }
        Opcode::CmpLe | Opcode::CmpUle => {
            if diff < 0 {
                Some(0)
            } else {
                diff.div_euclid(step).checked_add(1)
            }
        }
        Opcode::CmpNe => {
            if diff >= 0 && diff % step == 0 {
                Some(diff / step)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// The constant step when `advance` is `add iv, c` or `add c, iv` with
/// `c > 0`.
fn step_of(func: &Function, advance: InstId, iv: ValueId) -> Option<i64> {
    let inst = func.inst(advance);
    if inst.op != Opcode::Add {
        return None;
    }
    let (a, b) = (inst.operands[0], inst.operands[1]);
    let step = if a == iv {
        func.as_const_int(b)?
    } else if b == iv {
        func.as_const_int(a)?
    } else {
        return None;
    };
    (step > 0).then_some(step)
}

/// The value a header phi carries around the back edge, whichever of the
/// latch or the body tags it.
fn back_edge_value(
    func: &Function,
    phi: InstId,
    latch: BlockId,
    body: BlockId,
) -> Option<ValueId> {
    let inst = func.inst(phi);
    inst.phi_incoming_from(latch)
        .or_else(|| inst.phi_incoming_from(body))
}

fn recognize(func: &Function, header: BlockId) -> Option<LoopShape> {
    let insts = func.live_insts(header);
    let &first = insts.first()?;
    if func.inst(first).op != Opcode::Phi {
        return None;
    }
    let term = func.terminator(header)?;
    if func.inst(term).op != Opcode::CondBr {
        return None;
    }

    let preds = cfg::predecessors(func);
    let header_preds = preds.get(&header)?;
    let &[p0, p1] = header_preds.as_slice() else { return None };
    // Both predecessors may end in a plain branch to the header (a preheader
    // often does); the latch is the one inside the loop, i.e. the header can
    // reach it without passing through the other predecessor.
    let back_br = |b: BlockId| {
        func.terminator(b)
            .is_some_and(|t| func.inst(t).op == Opcode::Br && func.inst(t).targets[0] == header)
    };
    let in_loop = |b: BlockId, other: BlockId| cfg::reaches_avoiding(func, header, &[b], other);
    let (preheader, latch) = match (
        back_br(p0) && in_loop(p0, p1),
        back_br(p1) && in_loop(p1, p0),
    ) {
        (true, false) => (p1, p0),
        (false, true) => (p0, p1),
        _ => return None,
    };

    // The branch's taken side must loop back through the latch; the other
    // side is the exit.
    let on_true = func.inst(term).targets[0];
    let on_false = func.inst(term).targets[1];
    let loops_back =
        |b: BlockId| b == latch || cfg::reaches_avoiding(func, b, &[latch], header);
    let (body, exit) = match (loops_back(on_true), loops_back(on_false)) {
        (true, false) => (on_true, on_false),
        _ => return None,
    };
    if body == header || exit == header {
        return None;
    }

    // Body is one block, or body then latch, with no side entries and no
    // PHIs of their own.
    if body != latch {
        let bt = func.terminator(body)?;
        if func.inst(bt).op != Opcode::Br || func.inst(bt).targets[0] != latch {
            return None;
        }
        if preds.get(&latch).map(Vec::as_slice) != Some(&[body]) {
            return None;
        }
    }
    if preds.get(&body).map(Vec::as_slice) != Some(&[header]) {
        return None;
    }
    for b in [body, latch] {
        if func
            .live_insts(b)
            .iter()
            .any(|&i| func.inst(i).op == Opcode::Phi)
        {
            return None;
        }
    }

    // Every loop-carried phi must enter from the preheader and come back
    // through the latch or the body; the cloning in unroll_full relies on
    // both edges being present.
    for &i in &insts {
        let inst = func.inst(i);
        if inst.op != Opcode::Phi {
            break;
        }
        inst.phi_incoming_from(preheader)?;
        back_edge_value(func, i, latch, body)?;
    }

    let iv_phi = first;
    let iv = func.inst(iv_phi).result?;
    let init = func.as_const_int(func.inst(iv_phi).phi_incoming_from(preheader)?)?;
    let back = back_edge_value(func, iv_phi, latch, body)?;
    let advance = func.defining_inst(back)?;
    let step = step_of(func, advance, iv)?;

    let cmp = func.defining_inst(func.inst(term).operands[0])?;
    let cmp_inst = func.inst(cmp);
    if !cmp_inst.op.is_cmp() || cmp_inst.operands[0] != iv {
        return None;
    }
    let bound = func.as_const_int(cmp_inst.operands[1])?;

    Some(LoopShape {
        preheader,
        header,
        body,
        latch,
        exit,
        iv_phi,
        advance,
        init,
        step,
        bound,
        cmp_op: cmp_inst.op,
    })
}

fn resolve(map: &HashMap<ValueId, ValueId>, v: ValueId) -> ValueId {
    *map.get(&v).unwrap_or(&v)
}

/// Clone one non-terminator instruction into the preheader, remapping its
/// operands and recording its result in `map`.
fn clone_into_preheader(
    func: &mut Function,
    map: &mut HashMap<ValueId, ValueId>,
    preheader: BlockId,
    orig: InstId,
) {
    let src = func.inst(orig);
    let data = InstData {
        op: src.op,
        operands: src.operands.iter().map(|&v| resolve(map, v)).collect(),
        result: None,
        ty: src.ty,
        block: preheader,
        targets: Vec::new(),
        incoming: Vec::new(),
        agg_ty: src.agg_ty,
        agg_field: src.agg_field,
        dead: false,
    };
    let ty = data.ty;
    let had_result = src.result;
    let new = func.push_inst(data);
    func.insert_before_terminator(preheader, new);
    if let Some(old) = had_result {
        let name = func.value(old).name.clone();
        let v = func.attach_result(new, ty, name.as_deref());
        map.insert(old, v);
    }
}

/// Fully unroll `shape`, whose trip count is `trip`.
fn unroll_full(func: &mut Function, shape: &LoopShape, trip: i64) {
    let loop_blocks = [shape.header, shape.body, shape.latch];
    let iv_ty = func.inst(shape.iv_phi).ty;

    let header_phis: Vec<InstId> = func
        .live_insts(shape.header)
        .into_iter()
        .take_while(|&i| func.inst(i).op == Opcode::Phi)
        .collect();
    let header_rest: Vec<InstId> = func
        .live_insts(shape.header)
        .into_iter()
        .filter(|&i| {
            let inst = func.inst(i);
            inst.op != Opcode::Phi && !inst.is_terminator()
        })
        .collect();
    let mut cloned_blocks = vec![shape.body];
    if shape.latch != shape.body {
        cloned_blocks.push(shape.latch);
    }

    let mut map: HashMap<ValueId, ValueId> = HashMap::new();
    for k in 0..trip {
        // Each phi enters the iteration with the previous iteration's
        // back-edge value; the induction variable gets its literal.
        let mut entering: Vec<(ValueId, ValueId)> = Vec::with_capacity(header_phis.len());
        for &phi in &header_phis {
            let result = func.inst(phi).result.unwrap();
            let value = if phi == shape.iv_phi {
                func.const_int(iv_ty, shape.init + k * shape.step)
            } else if k == 0 {
                func.inst(phi)
                    .phi_incoming_from(shape.preheader)
                    .expect("header phi edges validated during recognition")
            } else {
                resolve(
                    &map,
                    back_edge_value(func, phi, shape.latch, shape.body)
                        .expect("header phi edges validated during recognition"),
                )
            };
            entering.push((result, value));
        }
        for (result, value) in entering {
            map.insert(result, value);
        }

        for &id in &header_rest {
            clone_into_preheader(func, &mut map, shape.preheader, id);
        }
        for &block in &cloned_blocks {
            for id in func.live_insts(block) {
                if !func.inst(id).is_terminator() {
                    clone_into_preheader(func, &mut map, shape.preheader, id);
                }
            }
        }
    }

    // After the last iteration every phi holds its final back-edge value;
    // the exit (and anything else outside the loop) reads that instead.
    for &phi in &header_phis {
        let result = func.inst(phi).result.unwrap();
        let final_value = if phi == shape.iv_phi {
            func.const_int(iv_ty, shape.init + trip * shape.step)
        } else {
            resolve(
                &map,
                back_edge_value(func, phi, shape.latch, shape.body)
                    .expect("header phi edges validated during recognition"),
            )
        };
        func.replace_uses_outside(&loop_blocks, result, final_value);
    }
    let outside: Vec<(ValueId, ValueId)> = map
        .iter()
        .map(|(&old, &new)| (old, new))
        .collect();
    for (old, new) in outside {
        func.replace_uses_outside(&loop_blocks, old, new);
    }

    // Bypass the loop. The loop blocks survive, unreachable, for the CFG
    // cleanup pass to collect.
    let term = func
        .terminator(shape.preheader)
        .expect("preheader keeps its terminator during cloning");
    for t in func.inst_mut(term).targets.iter_mut() {
        if *t == shape.header {
            *t = shape.exit;
        }
    }
    // Exit phis received their edge from the header; that edge now comes
    // from the preheader, and the tag must follow or unreachable-block
    // cleanup drops the entry.
    for id in func.live_insts(shape.exit) {
        let inst = func.inst_mut(id);
        if inst.op != Opcode::Phi {
            break;
        }
        for b in inst.incoming.iter_mut() {
            if *b == shape.header {
                *b = shape.preheader;
            }
        }
    }
    log::debug!("loop-unroll: fully unrolled {} iteration(s)", trip);
}

/// Duplicate the body `factor - 1` extra times inside the latch and widen
/// the step. No remainder loop is produced, hence the divisibility demand.
fn unroll_partial(func: &mut Function, shape: &LoopShape, factor: i64) -> bool {
    if shape.body != shape.latch {
        return false;
    }
    let iv = func.inst(shape.iv_phi).result.unwrap();
    let iv_ty = func.inst(shape.iv_phi).ty;
    let body_insts: Vec<InstId> = func
        .live_insts(shape.body)
        .into_iter()
        .filter(|&i| !func.inst(i).is_terminator() && i != shape.advance)
        .collect();
    let header_phis: Vec<InstId> = func
        .live_insts(shape.header)
        .into_iter()
        .take_while(|&i| func.inst(i).op == Opcode::Phi)
        .collect();

    // A body instruction (or a loop-carried phi) reading the advanced value
    // would need the advance itself remapped per copy; decline such loops.
    let Some(advanced) = func.inst(shape.advance).result else {
        return false;
    };
    if body_insts
        .iter()
        .any(|&i| func.inst(i).operands.contains(&advanced))
    {
        return false;
    }
    if header_phis.iter().any(|&phi| {
        phi != shape.iv_phi
            && func.inst(phi).phi_incoming_from(shape.latch) == Some(advanced)
    }) {
        return false;
    }

    // One map across all copies, so loop-carried values chain through the
    // duplicated bodies.
    let mut map: HashMap<ValueId, ValueId> = HashMap::new();
    for j in 1..factor {
        // Each copy reads the previous copy's value of every loop-carried
        // phi.
        let mut entering: Vec<(ValueId, ValueId)> = Vec::new();
        for &phi in &header_phis {
            if phi == shape.iv_phi {
                continue;
            }
            let result = func.inst(phi).result.unwrap();
            let back = func.inst(phi).phi_incoming_from(shape.latch).unwrap();
            entering.push((result, resolve(&map, back)));
        }
        for (result, value) in entering {
            map.insert(result, value);
        }
        let offset = func.const_int(iv_ty, j * shape.step);
        let shifted = InstData {
            op: Opcode::Add,
            operands: vec![iv, offset],
            result: None,
            ty: iv_ty,
            block: shape.body,
            targets: Vec::new(),
            incoming: Vec::new(),
            agg_ty: None,
            agg_field: 0,
            dead: false,
        };
        let add = func.push_inst(shifted);
        func.insert_before_terminator(shape.body, add);
        let iv_j = func.attach_result(add, iv_ty, None);
        map.insert(iv, iv_j);
        for &id in &body_insts {
            let src = func.inst(id);
            let data = InstData {
                op: src.op,
                operands: src.operands.iter().map(|&v| resolve(&map, v)).collect(),
                result: None,
                ty: src.ty,
                block: shape.body,
                targets: Vec::new(),
                incoming: Vec::new(),
                agg_ty: src.agg_ty,
                agg_field: src.agg_field,
                dead: false,
            };
            let ty = data.ty;
            let had_result = src.result;
            let new = func.push_inst(data);
            func.insert_before_terminator(shape.body, new);
            if let Some(old) = had_result {
                let v = func.attach_result(new, ty, None);
                map.insert(old, v);
            }
        }
    }

    // The back edge now carries the last copy's value of each loop-carried
    // phi.
    for &phi in &header_phis {
        if phi == shape.iv_phi {
            continue;
        }
        let Some(pos) = func
            .inst(phi)
            .incoming
            .iter()
            .position(|&b| b == shape.latch)
        else {
            continue;
        };
        let back = func.inst(phi).operands[pos];
        let new = resolve(&map, back);
        if new != back {
            func.inst_mut(phi).operands[pos] = new;
        }
    }

    let wide = func.const_int(iv_ty, shape.step * factor);
    let advance = func.inst_mut(shape.advance);
    if advance.operands[0] == iv {
        advance.operands[1] = wide;
    } else {
        advance.operands[0] = wide;
    }
    log::debug!("loop-unroll: partially unrolled by factor {}", factor);
    true
}

/// Unroll every recognizable short loop, partially at `factor` when full
/// unrolling does not apply. Returns whether anything changed.
pub fn unroll_loops(func: &mut Function, factor: Option<i64>) -> bool {
    let mut changed = false;
    for header in func.layout().to_vec() {
        if !func.block_is_live(header) {
            continue;
        }
        let Some(shape) = recognize(func, header) else { continue };
        let body_len: usize = if shape.body == shape.latch {
            func.live_insts(shape.body).len()
        } else {
            func.live_insts(shape.body).len() + func.live_insts(shape.latch).len()
        };
        match trip_count(&shape) {
            Some(trip) if trip > 0 && trip <= MAX_TRIP_COUNT && body_len <= MAX_BODY_INSTS => {
                unroll_full(func, &shape, trip);
                changed = true;
            }
            trip => {
                let Some(factor) = factor else { continue };
                let divisible = match trip {
                    Some(t) => t > 0 && t % factor == 0,
                    None => true,
                };
                if divisible && body_len <= MAX_BODY_INSTS {
                    changed |= unroll_partial(func, &shape, factor);
                }
            }
        }
    }
    changed
}
