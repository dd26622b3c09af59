// This module implements strength reduction of multiplies and unsigned
// divisions by power-of-two constants. mul becomes shl (the constant may sit
// on either side), udiv becomes shr, and umod becomes an and with the mask.
// Signed division and modulo are left untouched: a plain arithmetic shift
// rounds toward negative infinity while sdiv truncates toward zero, and this
// pass does not emit the rounding correction.

//! Strength reduction.

use crate::ir::function::Function;
use crate::ir::inst::Opcode;
use crate::ir::types::TypeContext;
use crate::ir::value::ValueId;
use crate::passes::Pass;

pub struct StrengthReduce;

impl Pass for StrengthReduce {
    fn name(&self) -> &'static str {
        "strength-reduce"
    }

    fn run(&self, func: &mut Function, types: &TypeContext) -> bool {
        reduce_strength(func, types)
    }
}

/// The exponent when `v` is a constant power of two within `width` bits.
fn power_of_two(func: &Function, v: ValueId, width: u32) -> Option<u32> {
    let c = func.as_const_int(v)?;
    let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    let u = (c as u64) & mask;
    if u != 0 && u.is_power_of_two() {
        Some(u.trailing_zeros())
    } else {
        None
    }
}

/// Rewrite mul/udiv/umod by a power of two into shifts and masks. Returns
/// whether anything changed.
pub fn reduce_strength(func: &mut Function, types: &TypeContext) -> bool {
    let mut changed = false;
    for block in func.layout().to_vec() {
        for id in func.live_insts(block) {
            let inst = func.inst(id);
            if inst.operands.len() != 2 {
                continue;
            }
            let Some(width) = types.int_width(inst.ty) else { continue };
            let ty = inst.ty;
            let (lhs, rhs) = (inst.operands[0], inst.operands[1]);
            let rewrite = match inst.op {
                Opcode::Mul => {
                    if let Some(n) = power_of_two(func, rhs, width) {
                        Some((Opcode::Shl, lhs, n as i64))
                    } else {
                        power_of_two(func, lhs, width).map(|n| (Opcode::Shl, rhs, n as i64))
                    }
                }
                Opcode::Udiv => {
                    power_of_two(func, rhs, width).map(|n| (Opcode::Shr, lhs, n as i64))
                }
                Opcode::Umod => power_of_two(func, rhs, width)
                    .map(|n| (Opcode::And, lhs, (1i64 << n).wrapping_sub(1))),
                _ => None,
            };
            let Some((op, kept, amount)) = rewrite else { continue };
            let amount = func.const_int(ty, amount);
            let inst = func.inst_mut(id);
            log::debug!("strength-reduce: {} -> {}", inst.op.mnemonic(), op.mnemonic());
            inst.op = op;
            inst.operands = vec![kept, amount];
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

    fn build(module: &mut Module) -> usize {
        let u32t = module.types.u32();
        let fty = module.types.function_type(u32t, &[u32t], false);
        module.define_function("f", fty, Linkage::Public, &[u32t]).index()
    }

    #[test]
    fn multiply_by_eight_becomes_shift() {
        let mut module = Module::new("t");
        let u32t = module.types.u32();
        let fi = build(&mut module);
        let Module { types, functions, .. } = &mut module;
        let func = &mut functions[fi];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let eight = b.const_int(u32t, 8);
        let m = b.binary(Opcode::Mul, u32t, p, eight);
        b.ret(Some(m));

        assert!(reduce_strength(func, types));
        let inst = func.inst(func.defining_inst(m).unwrap());
        assert_eq!(inst.op, Opcode::Shl);
        assert_eq!(inst.operands[0], p);
        assert_eq!(func.as_const_int(inst.operands[1]), Some(3));
    }

    #[test]
    fn constant_on_the_left_also_reduces() {
        let mut module = Module::new("t");
        let u32t = module.types.u32();
        let fi = build(&mut module);
        let Module { types, functions, .. } = &mut module;
        let func = &mut functions[fi];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let four = b.const_int(u32t, 4);
        let m = b.binary(Opcode::Mul, u32t, four, p);
        b.ret(Some(m));

        assert!(reduce_strength(func, types));
        let inst = func.inst(func.defining_inst(m).unwrap());
        assert_eq!(inst.op, Opcode::Shl);
        assert_eq!(inst.operands[0], p);
    }

    #[test]
    fn unsigned_div_and_mod_reduce() {
        let mut module = Module::new("t");
        let u32t = module.types.u32();
        let fi = build(&mut module);
        let Module { types, functions, .. } = &mut module;
        let func = &mut functions[fi];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let sixteen = b.const_int(u32t, 16);
        let q = b.binary(Opcode::Udiv, u32t, p, sixteen);
        let r = b.binary(Opcode::Umod, u32t, p, sixteen);
        let sum = b.binary(Opcode::Add, u32t, q, r);
        b.ret(Some(sum));

        assert!(reduce_strength(func, types));
        let qi = func.inst(func.defining_inst(q).unwrap());
        assert_eq!(qi.op, Opcode::Shr);
        assert_eq!(func.as_const_int(qi.operands[1]), Some(4));
        let ri = func.inst(func.defining_inst(r).unwrap());
        assert_eq!(ri.op, Opcode::And);
        assert_eq!(func.as_const_int(ri.operands[1]), Some(15));
    }

    #[test]
    fn signed_division_is_deliberately_untouched() {
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
        let four = b.const_int(i32t, 4);
        let q = b.binary(Opcode::Sdiv, i32t, p, four);
        let r = b.binary(Opcode::Smod, i32t, p, four);
        let sum = b.binary(Opcode::Add, i32t, q, r);
        b.ret(Some(sum));

        assert!(!reduce_strength(func, types));
        assert_eq!(func.inst(func.defining_inst(q).unwrap()).op, Opcode::Sdiv);
    }

    #[test]
    fn non_power_of_two_is_left_alone() {
        let mut module = Module::new("t");
        let u32t = module.types.u32();
        let fi = build(&mut module);
        let Module { types, functions, .. } = &mut module;
        let func = &mut functions[fi];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let ten = b.const_int(u32t, 10);
        let m = b.binary(Opcode::Mul, u32t, p, ten);
        b.ret(Some(m));

        assert!(!reduce_strength(func, types));
        assert_eq!(func.inst(func.defining_inst(m).unwrap()).op, Opcode::Mul);
    }

    #[test]
    fn shift_agrees_with_multiply_for_sample_inputs() {
        for n in [0u32, 1, 3, 7, 31] {
            for x in [0u32, 1, 5, 0x1234_5678, u32::MAX] {
                let product = x.wrapping_mul(1u32.wrapping_shl(n));
                let shifted = x.wrapping_shl(n);
                assert_eq!(product, shifted, "x={x} n={n}");
            }
        }
    }
}
