// This module implements local dead-store elimination, plus the small
// aliasing model it shares with the load passes. The model distinguishes only
// "provably the same address" (equal value ids or equal constants) and
// "provably different allocas" (two distinct alloca instructions). Everything
// else, including GEP results carved from the same alloca, is treated as
// worst-case aliasing. A store is dead when a later store in the same block
// overwrites the identical address before any instruction that may read it; a
// call may read anything, and the block terminator ends the scan.

//! Dead-store elimination and the shared may-alias test.

use crate::ir::function::Function;
use crate::ir::inst::Opcode;
use crate::ir::types::TypeContext;
use crate::ir::value::ValueId;
use crate::passes::Pass;

pub struct DeadStore;

impl Pass for DeadStore {
    fn name(&self) -> &'static str {
        "dead-store"
    }

    fn run(&self, func: &mut Function, _types: &TypeContext) -> bool {
        eliminate_dead_stores(func)
    }
}

/// Whether two pointers provably refer to the same location.
pub(crate) fn same_address(func: &Function, a: ValueId, b: ValueId) -> bool {
    func.values_equal(a, b)
}

/// Whether a write through `a` may be observed through `b`. Distinct allocas
/// never overlap; anything else is assumed to.
pub(crate) fn may_alias(func: &Function, a: ValueId, b: ValueId) -> bool {
    if same_address(func, a, b) {
        return true;
    }
    match (func.as_alloca(a), func.as_alloca(b)) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

/// Remove stores whose value is overwritten before any possible read. Returns
/// whether anything changed.
pub fn eliminate_dead_stores(func: &mut Function) -> bool {
    let mut changed = false;
    for block in func.layout().to_vec() {
        let insts = func.live_insts(block);
        for (i, &store) in insts.iter().enumerate() {
            if func.inst(store).op != Opcode::Store {
                continue;
            }
            let addr = func.inst(store).operands[1];
            let mut dead = false;
            for &later in &insts[i + 1..] {
                if !func.inst_is_live(later) {
                    continue;
                }
                let inst = func.inst(later);
                match inst.op {
                    Opcode::Load if may_alias(func, addr, inst.operands[0]) => break,
                    Opcode::Call => break,
                    Opcode::Store if same_address(func, addr, inst.operands[1]) => {
                        dead = true;
                        break;
                    }
                    op if op.is_terminator() => break,
                    _ => {}
                }
            }
            if dead {
                log::debug!(
                    "dead-store: removing overwritten store in {}",
                    func.block(block).label
                );
                func.kill(store);
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::Builder;
    use crate::ir::module::{Linkage, Module};

    fn slot_func(module: &mut Module) -> usize {
        let i32t = module.types.i32();
        let fty = module.types.function_type(i32t, &[i32t], false);
        module.define_function("f", fty, Linkage::Public, &[i32t]).index()
    }

    #[test]
    fn overwritten_store_is_removed() {
        let mut module = Module::new("t");
        let i32t = module.types.i32();
        let ptr = module.types.pointer_to(i32t);
        let fi = slot_func(&mut module);
        let func = &mut module.functions[fi];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let slot = b.alloca(ptr);
        let first = b.store(p, slot);
        let second = b.store(p, slot);
        let v = b.load(i32t, slot);
        b.ret(Some(v));

        assert!(eliminate_dead_stores(func));
        assert!(func.inst(first).dead);
        assert!(!func.inst(second).dead);
    }

    #[test]
    fn intervening_load_keeps_the_store() {
        let mut module = Module::new("t");
        let i32t = module.types.i32();
        let ptr = module.types.pointer_to(i32t);
        let fi = slot_func(&mut module);
        let func = &mut module.functions[fi];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let slot = b.alloca(ptr);
        b.store(p, slot);
        let v = b.load(i32t, slot);
        b.store(v, slot);
        b.ret(Some(v));

        assert!(!eliminate_dead_stores(func));
    }

    #[test]
    fn load_from_a_different_alloca_does_not_block() {
        let mut module = Module::new("t");
        let i32t = module.types.i32();
        let ptr = module.types.pointer_to(i32t);
        let fi = slot_func(&mut module);
        let func = &mut module.functions[fi];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let a = b.alloca(ptr);
        let other = b.alloca(ptr);
        let first = b.store(p, a);
        b.store(p, other);
        let v = b.load(i32t, other);
        b.store(v, a);
        let r = b.load(i32t, a);
        b.ret(Some(r));

        assert!(eliminate_dead_stores(func));
        assert!(func.inst(first).dead);
    }

    #[test]
    fn call_is_a_conservative_reader() {
        let mut module = Module::new("t");
        let i32t = module.types.i32();
        let ptr = module.types.pointer_to(i32t);
        let fty = module.types.function_type(i32t, &[], false);
        let callee = module.declare_function("ext", fty, &[]);
        let fi = slot_func(&mut module);
        let func = &mut module.functions[fi];
        let p = func.params[0];
        let callee_v =
            func.new_value(crate::ir::value::ValueKind::Func(callee), ptr, Some("ext"));
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let slot = b.alloca(ptr);
        b.store(p, slot);
        let c = b.call(i32t, callee_v, &[]).unwrap();
        b.store(c, slot);
        let v = b.load(i32t, slot);
        b.ret(Some(v));

        assert!(!eliminate_dead_stores(func));
    }

    #[test]
    fn store_surviving_to_block_end_is_kept() {
        let mut module = Module::new("t");
        let i32t = module.types.i32();
        let ptr = module.types.pointer_to(i32t);
        let fi = slot_func(&mut module);
        let func = &mut module.functions[fi];
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        let exit = b.create_block("exit");
        b.position_at_end(entry);
        let slot = b.alloca(ptr);
        b.store(p, slot);
        b.br(exit);
        b.position_at_end(exit);
        let v = b.load(i32t, slot);
        b.ret(Some(v));

        assert!(!eliminate_dead_stores(func));
    }
}
