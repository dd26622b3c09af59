// This module implements constant folding. Integer evaluation is done in 128
// bits and truncated to the result width with the exact signed/unsigned
// semantics of machine arithmetic; integer and float division (and remainder)
// by zero fold to zero, which is the documented policy of this pipeline, not
// an accident. Besides full evaluation the pass applies algebraic identities
// with a single constant operand (x+0, x*1, x&-1, ...) and the same-operand
// identities (x-x, x&x, x^x), and resolves comparisons either on two constant
// operands or reflexively when both sides are the identical value. A
// successful fold never mutates operands in place: the instruction's uses are
// rewritten to the folded value function-wide and the instruction is marked
// dead for DCE to reclaim.

//! Constant folding.

use crate::ir::function::Function;
use crate::ir::inst::Opcode;
use crate::ir::types::TypeContext;
use crate::ir::value::ValueId;
use crate::passes::Pass;

pub struct ConstantFold;

impl Pass for ConstantFold {
    fn name(&self) -> &'static str {
        "constant-fold"
    }

    fn run(&self, func: &mut Function, types: &TypeContext) -> bool {
        fold_function(func, types)
    }
}

/// What an instruction folded to.
enum Fold {
    /// An existing value (identity rules).
    Value(ValueId),
    /// A fresh integer constant of the instruction's result type.
    Int(i64),
    /// A fresh float constant of the instruction's result type.
    Float(f64),
}

/// Truncate `value` to `width` bits, then sign- or zero-extend back to i64.
/// This is the canonical storage form for a constant of that type.
fn truncate(value: i128, width: u32, signed: bool) -> i64 {
    if width >= 64 {
        return value as i64;
    }
    let mask = (1u128 << width) - 1;
    let t = (value as u128) & mask;
    if signed && t & (1u128 << (width - 1)) != 0 {
        (t | !mask) as i64
    } else {
        t as i64
    }
}

/// The all-ones pattern of an integer of `width` bits, in canonical form.
fn all_ones(width: u32, signed: bool) -> i64 {
    truncate(-1, width, signed)
}

fn zero_extend(value: i64, width: u32) -> u64 {
    if width >= 64 {
        value as u64
    } else {
        (value as u64) & ((1u64 << width) - 1)
    }
}

fn sign_extend(value: i64, width: u32) -> i64 {
    truncate(value as i128, width, true)
}

/// Evaluate an integer binary op. `width`/`signed` describe the result type.
/// Division and remainder by zero produce zero.
fn eval_int_binary(op: Opcode, a: i64, b: i64, width: u32, signed: bool) -> i64 {
    let (sa, sb) = (sign_extend(a, width), sign_extend(b, width));
    let (ua, ub) = (zero_extend(a, width), zero_extend(b, width));
    // Shift amounts wrap at the operand width, as the hardware does.
    let shift = if width >= 64 { (ub & 63) as u32 } else { (ub as u32) % width.max(1) };
    let wide = match op {
        Opcode::Add => sa as i128 + sb as i128,
        Opcode::Sub => sa as i128 - sb as i128,
        Opcode::Mul => sa as i128 * sb as i128,
        Opcode::Sdiv => {
            if sb == 0 {
                0
            } else {
                (sa as i128) / (sb as i128)
            }
        }
        Opcode::Smod => {
            if sb == 0 {
                0
            } else {
                (sa as i128) % (sb as i128)
            }
        }
        Opcode::Udiv => {
            if ub == 0 {
                0
            } else {
                (ua / ub) as i128
            }
        }
        Opcode::Umod => {
            if ub == 0 {
                0
            } else {
                (ua % ub) as i128
            }
        }
        Opcode::And => (ua & ub) as i128,
        Opcode::Or => (ua | ub) as i128,
        Opcode::Xor => (ua ^ ub) as i128,
        Opcode::Shl => (ua as i128) << shift,
        Opcode::Shr => (ua >> shift) as i128,
        Opcode::Sar => (sa >> shift) as i128,
        _ => unreachable!("not an integer binary op: {op:?}"),
    };
    truncate(wide, width, signed)
}

fn eval_float_binary(op: Opcode, a: f64, b: f64) -> f64 {
    match op {
        Opcode::FAdd => a + b,
        Opcode::FSub => a - b,
        Opcode::FMul => a * b,
        // Folding a zero divisor to 0.0 instead of inf/NaN is the
        // documented policy of this pipeline.
        Opcode::FDiv => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
        _ => unreachable!("not a float binary op: {op:?}"),
    }
}

/// Evaluate a comparison of two constant integers at the operand width.
fn eval_int_cmp(op: Opcode, a: i64, b: i64, width: u32) -> bool {
    let (sa, sb) = (sign_extend(a, width), sign_extend(b, width));
    let (ua, ub) = (zero_extend(a, width), zero_extend(b, width));
    match op {
        Opcode::CmpEq => ua == ub,
        Opcode::CmpNe => ua != ub,
        Opcode::CmpLt => sa < sb,
        Opcode::CmpLe => sa <= sb,
        Opcode::CmpGt => sa > sb,
        Opcode::CmpGe => sa >= sb,
        Opcode::CmpUlt => ua < ub,
        Opcode::CmpUle => ua <= ub,
        Opcode::CmpUgt => ua > ub,
        Opcode::CmpUge => ua >= ub,
        _ => unreachable!("not a comparison: {op:?}"),
    }
}

/// A reflexive comparison (both sides are the same value) resolves without
/// evaluating anything.
fn eval_reflexive_cmp(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::CmpEq | Opcode::CmpLe | Opcode::CmpGe | Opcode::CmpUle | Opcode::CmpUge
    )
}

/// Identity rules for a binary op with exactly one constant operand, plus
/// the same-operand rules. Returns the surviving value or literal.
fn fold_identity(
    func: &Function,
    op: Opcode,
    lhs: ValueId,
    rhs: ValueId,
    width: u32,
    signed: bool,
) -> Option<Fold> {
    let lc = func.as_const_int(lhs);
    let rc = func.as_const_int(rhs);
    let ones = all_ones(width, signed);

    // Same-operand rules resolve without constants.
    if lhs == rhs {
        match op {
            Opcode::Sub | Opcode::Xor => return Some(Fold::Int(0)),
            Opcode::And | Opcode::Or => return Some(Fold::Value(lhs)),
            _ => {}
        }
    }

    let zero = |c: Option<i64>| matches!(c, Some(v) if truncate(v as i128, width, signed) == 0);
    let one = |c: Option<i64>| matches!(c, Some(v) if truncate(v as i128, width, signed) == 1);
    let all = |c: Option<i64>| matches!(c, Some(v) if truncate(v as i128, width, signed) == ones);

    match op {
        Opcode::Add => {
            if zero(rc) {
                return Some(Fold::Value(lhs));
            }
            if zero(lc) {
                return Some(Fold::Value(rhs));
            }
        }
        Opcode::Sub => {
            if zero(rc) {
                return Some(Fold::Value(lhs));
            }
        }
        Opcode::Mul => {
            if zero(rc) || zero(lc) {
                return Some(Fold::Int(0));
            }
            if one(rc) {
                return Some(Fold::Value(lhs));
            }
            if one(lc) {
                return Some(Fold::Value(rhs));
            }
        }
        Opcode::Sdiv | Opcode::Udiv => {
            if one(rc) {
                return Some(Fold::Value(lhs));
            }
        }
        Opcode::And => {
            if all(rc) {
                return Some(Fold::Value(lhs));
            }
            if all(lc) {
                return Some(Fold::Value(rhs));
            }
        }
        Opcode::Or | Opcode::Xor => {
            if zero(rc) {
                return Some(Fold::Value(lhs));
            }
            if zero(lc) {
                return Some(Fold::Value(rhs));
            }
        }
        Opcode::Shl | Opcode::Shr | Opcode::Sar => {
            if zero(rc) {
                return Some(Fold::Value(lhs));
            }
        }
        _ => {}
    }
    None
}

/// Fold one function. Returns whether anything changed. A single forward
/// sweep suffices: uses are rewritten as soon as a def folds, so chains
/// resolve within one run and a second run finds nothing (idempotence).
pub fn fold_function(func: &mut Function, types: &TypeContext) -> bool {
    let mut changed = false;
    for block in func.layout().to_vec() {
        for id in func.live_insts(block) {
            let inst = func.inst(id);
            let Some(result) = inst.result else { continue };
            let op = inst.op;

            let fold = if op.is_int_binary() {
                let (lhs, rhs) = (inst.operands[0], inst.operands[1]);
                let ty = inst.ty;
                let Some(width) = types.int_width(ty) else { continue };
                let signed = types.is_signed(ty);
                match (func.as_const_int(lhs), func.as_const_int(rhs)) {
                    (Some(a), Some(b)) => Some(Fold::Int(eval_int_binary(op, a, b, width, signed))),
                    _ => fold_identity(func, op, lhs, rhs, width, signed),
                }
            } else if op.is_float_binary() {
                let (lhs, rhs) = (inst.operands[0], inst.operands[1]);
                match (func.as_const_float(lhs), func.as_const_float(rhs)) {
                    (Some(a), Some(b)) => Some(Fold::Float(eval_float_binary(op, a, b))),
                    _ => None,
                }
            } else if op.is_cmp() {
                let (lhs, rhs) = (inst.operands[0], inst.operands[1]);
                if lhs == rhs {
                    Some(Fold::Int(eval_reflexive_cmp(op) as i64))
                } else {
                    match (func.as_const_int(lhs), func.as_const_int(rhs)) {
                        (Some(a), Some(b)) => {
                            let width = types.int_width(func.value(lhs).ty).unwrap_or(64);
                            Some(Fold::Int(eval_int_cmp(op, a, b, width) as i64))
                        }
                        _ => None,
                    }
                }
            } else if matches!(op, Opcode::Neg | Opcode::Not) {
                let x = inst.operands[0];
                let ty = inst.ty;
                let Some(width) = types.int_width(ty) else { continue };
                let signed = types.is_signed(ty);
                func.as_const_int(x).map(|v| {
                    let sv = sign_extend(v, width);
                    let folded = match op {
                        Opcode::Neg => truncate(-(sv as i128), width, signed),
                        Opcode::Not => truncate(!(sv as i128), width, signed),
                        _ => unreachable!(),
                    };
                    Fold::Int(folded)
                })
            } else {
                None
            };

            let Some(fold) = fold else { continue };
            let ty = func.inst(id).ty;
            let replacement = match fold {
                Fold::Value(v) => v,
                Fold::Int(v) => func.const_int(ty, v),
                Fold::Float(v) => func.const_float(ty, v),
            };
            func.replace_all_uses(result, replacement);
            func.kill(id);
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::Builder;
    use crate::ir::module::{Linkage, Module};

    fn fold_binary(op: Opcode, a: i64, b: i64) -> i64 {
        let mut module = Module::new("t");
        let i32t = module.types.i32();
        let fty = module.types.function_type(i32t, &[], false);
        let f = module.define_function("f", fty, Linkage::Public, &[]);

        let Module { types, functions, .. } = &mut module;
        let func = &mut functions[f.index()];
        let mut b_ = Builder::new(func);
        let entry = b_.create_block("entry");
        b_.position_at_end(entry);
        let ca = b_.const_int(i32t, a);
        let cb = b_.const_int(i32t, b);
        let r = b_.binary(op, i32t, ca, cb);
        b_.ret(Some(r));

        assert!(fold_function(func, types));
        let ret = func.terminator(entry).unwrap();
        let folded = func.inst(ret).operands[0];
        func.as_const_int(folded).expect("folded to a constant")
    }

    #[test]
    fn add_wraps_at_32_bits() {
        assert_eq!(fold_binary(Opcode::Add, 2, 3), 5);
        assert_eq!(fold_binary(Opcode::Add, i32::MAX as i64, 1), i32::MIN as i64);
        assert_eq!(
            fold_binary(Opcode::Mul, 0x10000, 0x10000),
            0 // 2^32 truncated to 32 bits
        );
    }

    #[test]
    fn division_by_zero_folds_to_zero() {
        assert_eq!(fold_binary(Opcode::Sdiv, 41, 0), 0);
        assert_eq!(fold_binary(Opcode::Udiv, 41, 0), 0);
        assert_eq!(fold_binary(Opcode::Smod, 41, 0), 0);
        assert_eq!(fold_binary(Opcode::Umod, 41, 0), 0);
    }

    #[test]
    fn signed_and_unsigned_division_differ() {
        assert_eq!(fold_binary(Opcode::Sdiv, -8, 2), -4);
        // -8 zero-extends to 0xFFFF_FFF8 at 32 bits.
        assert_eq!(fold_binary(Opcode::Udiv, -8, 1 << 31), 1);
        assert_eq!(fold_binary(Opcode::Sar, -8, 1), -4);
        assert_eq!(fold_binary(Opcode::Shr, -8, 1), 0x7FFF_FFFC);
    }

    #[test]
    fn identity_rules_survive_the_operand() {
        let mut module = Module::new("t");
        let i32t = module.types.i32();
        let fty = module.types.function_type(i32t, &[i32t], false);
        let f = module.define_function("f", fty, Linkage::Public, &[i32t]);

        let Module { types, functions, .. } = &mut module;
        let func = &mut functions[f.index()];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let zero = b.const_int(i32t, 0);
        let ones = b.const_int(i32t, -1);
        let x1 = b.binary(Opcode::Add, i32t, p, zero);
        let x2 = b.binary(Opcode::And, i32t, ones, x1);
        let x3 = b.binary(Opcode::Xor, i32t, x2, x2);
        let x4 = b.binary(Opcode::Or, i32t, x2, x3);
        b.ret(Some(x4));

        assert!(fold_function(func, types));
        // x1 -> p, x2 -> p, x3 -> 0, x4 -> p: the return reads the parameter.
        let ret = func.terminator(entry).unwrap();
        assert_eq!(func.inst(ret).operands[0], p);
    }

    #[test]
    fn reflexive_comparison_folds_without_constants() {
        let mut module = Module::new("t");
        let i32t = module.types.i32();
        let i1 = module.types.bool();
        let fty = module.types.function_type(i1, &[i32t], false);
        let f = module.define_function("f", fty, Linkage::Public, &[i32t]);

        let Module { types, functions, .. } = &mut module;
        let func = &mut functions[f.index()];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let le = b.cmp(Opcode::CmpLe, i1, p, p);
        let lt = b.cmp(Opcode::CmpLt, i1, p, p);
        let both = b.binary(Opcode::Or, i1, le, lt);
        b.ret(Some(both));

        assert!(fold_function(func, types));
        // le -> 1, lt -> 0, or(1, 0) -> 1.
        let ret = func.terminator(entry).unwrap();
        assert_eq!(func.as_const_int(func.inst(ret).operands[0]), Some(1));
    }

    #[test]
    fn folding_is_idempotent() {
        let mut module = Module::new("t");
        let i32t = module.types.i32();
        let fty = module.types.function_type(i32t, &[i32t], false);
        let f = module.define_function("f", fty, Linkage::Public, &[i32t]);

        let Module { types, functions, .. } = &mut module;
        let func = &mut functions[f.index()];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let c2 = b.const_int(i32t, 2);
        let c3 = b.const_int(i32t, 3);
        let s = b.binary(Opcode::Add, i32t, c2, c3);
        let t = b.binary(Opcode::Mul, i32t, s, p);
        b.ret(Some(t));

        assert!(fold_function(func, types));
        assert!(!fold_function(func, types));
    }

    #[test]
    fn float_division_by_zero_folds_to_zero() {
        let mut module = Module::new("t");
        let f64t = module.types.f64();
        let fty = module.types.function_type(f64t, &[], false);
        let f = module.define_function("f", fty, Linkage::Public, &[]);

        let Module { types, functions, .. } = &mut module;
        let func = &mut functions[f.index()];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let ca = b.const_float(f64t, 1.5);
        let cz = b.const_float(f64t, 0.0);
        let r = b.binary(Opcode::FDiv, f64t, ca, cz);
        b.ret(Some(r));

        assert!(fold_function(func, types));
        let ret = func.terminator(entry).unwrap();
        assert_eq!(func.as_const_float(func.inst(ret).operands[0]), Some(0.0));
    }
}
