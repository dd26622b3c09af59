// This module implements the mutable function graph at the heart of the IR:
// per-function arenas of values, instructions and basic blocks, the block
// layout order, and the use/def utilities every optimization pass leans on
// (replace_all_uses, use counting, logical delete and physical removal). The
// arenas stand in for a raw-pointer graph: an instruction or block slot is
// freed by setting it to None, so a stale handle
// panics on access instead of silently reading freed memory, and dropping the
// function releases everything exactly once. Predecessor and successor edges
// are not stored; they are derived from terminators by the cfg module, which
// is how the passes that restructure the CFG avoid keeping edge lists
// coherent.

//! Functions, basic blocks, and the instruction arena.

use crate::ir::inst::{InstData, Opcode};
use crate::ir::module::Linkage;
use crate::ir::types::TypeId;
use crate::ir::value::{BlockId, InstId, ValueData, ValueId, ValueKind};

/// A basic block: a label and an ordered list of instruction handles. The
/// last live instruction is expected to be a terminator.
#[derive(Debug, Clone)]
pub struct BlockData {
    pub label: String,
    pub insts: Vec<InstId>,
}

/// A function definition or declaration. Declarations have an empty layout.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    /// The function's own type (a `TypeKind::Function`).
    pub ty: TypeId,
    pub linkage: Linkage,
    /// Parameter values, kind `Param(i)`.
    pub params: Vec<ValueId>,
    values: Vec<ValueData>,
    insts: Vec<Option<InstData>>,
    blocks: Vec<Option<BlockData>>,
    layout: Vec<BlockId>,
}

impl Function {
    pub fn new(name: &str, ty: TypeId, linkage: Linkage, param_types: &[TypeId]) -> Self {
        let mut f = Self {
            name: name.to_owned(),
            ty,
            linkage,
            params: Vec::new(),
            values: Vec::new(),
            insts: Vec::new(),
            blocks: Vec::new(),
            layout: Vec::new(),
        };
        for (i, &pty) in param_types.iter().enumerate() {
            let v = f.new_value(ValueKind::Param(i as u32), pty, None);
            f.params.push(v);
        }
        f
    }

    pub fn is_declaration(&self) -> bool {
        self.layout.is_empty()
    }

    /// The designated entry block. It is never removed.
    pub fn entry(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    // ---- values ----

    pub fn new_value(&mut self, kind: ValueKind, ty: TypeId, name: Option<&str>) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData { kind, ty, name: name.map(str::to_owned) });
        id
    }

    pub fn const_int(&mut self, ty: TypeId, v: i64) -> ValueId {
        self.new_value(ValueKind::ConstInt(v), ty, None)
    }

    pub fn const_float(&mut self, ty: TypeId, v: f64) -> ValueId {
        self.new_value(ValueKind::ConstFloat(v), ty, None)
    }

    pub fn const_null(&mut self, ty: TypeId) -> ValueId {
        self.new_value(ValueKind::ConstNull, ty, None)
    }

    pub fn value(&self, v: ValueId) -> &ValueData {
        &self.values[v.0 as usize]
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    pub fn as_const_int(&self, v: ValueId) -> Option<i64> {
        self.value(v).as_const_int()
    }

    pub fn as_const_float(&self, v: ValueId) -> Option<f64> {
        self.value(v).as_const_float()
    }

    /// Identity, or equal constant payload of the same type.
    pub fn values_equal(&self, a: ValueId, b: ValueId) -> bool {
        if a == b {
            return true;
        }
        let (va, vb) = (self.value(a), self.value(b));
        va.is_const() && va.ty == vb.ty && va.kind == vb.kind
    }

    /// The instruction defining `v`, if `v` is an instruction result.
    pub fn defining_inst(&self, v: ValueId) -> Option<InstId> {
        match self.value(v).kind {
            ValueKind::Inst(id) => Some(id),
            _ => None,
        }
    }

    /// The `Alloca` defining `v`, if any.
    pub fn as_alloca(&self, v: ValueId) -> Option<InstId> {
        let id = self.defining_inst(v)?;
        if self.inst_is_live(id) && self.inst(id).op == Opcode::Alloca {
            Some(id)
        } else {
            None
        }
    }

    // ---- instructions ----

    /// Push a detached instruction into the arena.
    pub fn push_inst(&mut self, data: InstData) -> InstId {
        let id = InstId(self.insts.len() as u32);
        self.insts.push(Some(data));
        id
    }

    /// Create and record the result value of `inst`.
    pub fn attach_result(&mut self, inst: InstId, ty: TypeId, name: Option<&str>) -> ValueId {
        let v = self.new_value(ValueKind::Inst(inst), ty, name);
        self.inst_mut(inst).result = Some(v);
        v
    }

    pub fn inst(&self, id: InstId) -> &InstData {
        self.insts[id.0 as usize]
            .as_ref()
            .expect("stale InstId: instruction was removed")
    }

    pub fn inst_mut(&mut self, id: InstId) -> &mut InstData {
        self.insts[id.0 as usize]
            .as_mut()
            .expect("stale InstId: instruction was removed")
    }

    /// Live means the slot still exists; a dead-marked instruction is live
    /// until cleanup frees it.
    pub fn inst_is_live(&self, id: InstId) -> bool {
        self.insts[id.0 as usize].is_some()
    }

    pub fn inst_result(&self, id: InstId) -> Option<ValueId> {
        self.inst(id).result
    }

    /// Logical delete. The slot stays allocated until [`Self::remove_inst`].
    pub fn kill(&mut self, id: InstId) {
        self.inst_mut(id).dead = true;
    }

    /// Physically unlink `id` from its block and free the arena slot.
    pub fn remove_inst(&mut self, id: InstId) {
        let block = self.inst(id).block;
        if let Some(b) = self.blocks[block.0 as usize].as_mut() {
            b.insts.retain(|&i| i != id);
        }
        self.insts[id.0 as usize] = None;
    }

    // ---- blocks ----

    pub fn add_block(&mut self, label: &str) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(BlockData { label: label.to_owned(), insts: Vec::new() }));
        self.layout.push(id);
        id
    }

    pub fn block(&self, b: BlockId) -> &BlockData {
        self.blocks[b.0 as usize]
            .as_ref()
            .expect("stale BlockId: block was removed")
    }

    pub fn block_mut(&mut self, b: BlockId) -> &mut BlockData {
        self.blocks[b.0 as usize]
            .as_mut()
            .expect("stale BlockId: block was removed")
    }

    pub fn block_is_live(&self, b: BlockId) -> bool {
        self.blocks[b.0 as usize].is_some()
    }

    /// Blocks in function order.
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// Instruction handles of `b` that are neither freed nor dead-marked.
    pub fn live_insts(&self, b: BlockId) -> Vec<InstId> {
        self.block(b)
            .insts
            .iter()
            .copied()
            .filter(|&i| self.inst_is_live(i) && !self.inst(i).dead)
            .collect()
    }

    /// The block's terminator, if its last live instruction is one.
    pub fn terminator(&self, b: BlockId) -> Option<InstId> {
        let last = *self.live_insts(b).last()?;
        if self.inst(last).is_terminator() {
            Some(last)
        } else {
            None
        }
    }

    pub fn append_to_block(&mut self, b: BlockId, inst: InstId) {
        self.inst_mut(inst).block = b;
        self.block_mut(b).insts.push(inst);
    }

    /// Insert `inst` just before the block's terminator, or at the end when
    /// the block has none yet.
    pub fn insert_before_terminator(&mut self, b: BlockId, inst: InstId) {
        self.inst_mut(inst).block = b;
        let pos = match self.terminator(b) {
            Some(t) => self
                .block(b)
                .insts
                .iter()
                .position(|&i| i == t)
                .unwrap_or(self.block(b).insts.len()),
            None => self.block(b).insts.len(),
        };
        self.block_mut(b).insts.insert(pos, inst);
    }

    /// Free a block and every instruction it still holds. The entry block is
    /// never removed.
    pub fn remove_block(&mut self, b: BlockId) {
        debug_assert_ne!(Some(b), self.entry(), "entry block is never removed");
        if let Some(data) = self.blocks[b.0 as usize].take() {
            for inst in data.insts {
                self.insts[inst.0 as usize] = None;
            }
        }
        self.layout.retain(|&x| x != b);
    }

    // ---- use/def ----

    /// Replace every use of `old` with `new` across the whole function,
    /// including PHI incoming values. No-op when `old == new`.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        for slot in self.insts.iter_mut() {
            if let Some(inst) = slot {
                if inst.dead {
                    continue;
                }
                for op in inst.operands.iter_mut() {
                    if *op == old {
                        *op = new;
                    }
                }
            }
        }
    }

    /// Replace uses of `old` with `new` only in instructions outside
    /// `excluded` blocks.
    pub fn replace_uses_outside(&mut self, excluded: &[BlockId], old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        for slot in self.insts.iter_mut() {
            if let Some(inst) = slot {
                if inst.dead || excluded.contains(&inst.block) {
                    continue;
                }
                for op in inst.operands.iter_mut() {
                    if *op == old {
                        *op = new;
                    }
                }
            }
        }
    }

    /// Whether any live, non-dead instruction reads `v`.
    pub fn value_is_used(&self, v: ValueId) -> bool {
        self.insts.iter().flatten().any(|inst| {
            !inst.dead && inst.operands.contains(&v)
        })
    }

    /// Mark every value read by a live, non-dead instruction in `used`
    /// (indexed by value id). PHI incoming values count as uses.
    pub fn collect_used_values(&self, used: &mut [bool]) {
        for inst in self.insts.iter().flatten() {
            if inst.dead {
                continue;
            }
            for &op in &inst.operands {
                used[op.0 as usize] = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::Builder;
    use crate::ir::module::Module;
    use crate::ir::types::TypeKind;

    fn sample() -> (Module, crate::ir::value::FuncId) {
        let mut module = Module::new("t");
        let i32 = module.types.i32();
        let fty = module.types.function_type(i32, &[i32, i32], false);
        let f = module.define_function("sample", fty, Linkage::Public, &[i32, i32]);
        (module, f)
    }

    #[test]
    fn replace_all_uses_rewrites_operands_and_phis() {
        let (mut module, f) = sample();
        let i32 = module.types.i32();
        let func = module.function_mut(f);
        let (a, b) = (func.params[0], func.params[1]);

        let mut builder = Builder::new(func);
        let entry = builder.create_block("entry");
        let tail = builder.create_block("tail");
        builder.position_at_end(entry);
        let sum = builder.binary(Opcode::Add, i32, a, b);
        builder.br(tail);
        builder.position_at_end(tail);
        let phi = builder.phi(i32, &[(sum, entry)]);
        builder.ret(Some(phi));

        func.replace_all_uses(a, b);
        let add = func.defining_inst(sum).unwrap();
        assert_eq!(func.inst(add).operands, vec![b, b]);

        func.replace_all_uses(sum, b);
        let phi_inst = func.defining_inst(phi).unwrap();
        assert_eq!(func.inst(phi_inst).operands, vec![b]);
    }

    #[test]
    fn kill_then_remove_frees_the_slot() {
        let (mut module, f) = sample();
        let i32 = module.types.i32();
        let func = module.function_mut(f);
        let (a, b) = (func.params[0], func.params[1]);

        let mut builder = Builder::new(func);
        let entry = builder.create_block("entry");
        builder.position_at_end(entry);
        let sum = builder.binary(Opcode::Add, i32, a, b);
        builder.ret(Some(sum));

        let add = func.defining_inst(sum).unwrap();
        func.kill(add);
        assert!(func.inst(add).dead);
        assert!(func.inst_is_live(add));

        func.remove_inst(add);
        assert!(!func.inst_is_live(add));
        assert_eq!(func.live_insts(entry).len(), 1); // just the ret
    }

    #[test]
    #[should_panic(expected = "stale InstId")]
    fn stale_handle_panics() {
        let (mut module, f) = sample();
        let i32 = module.types.i32();
        let func = module.function_mut(f);
        let (a, b) = (func.params[0], func.params[1]);

        let mut builder = Builder::new(func);
        let entry = builder.create_block("entry");
        builder.position_at_end(entry);
        let sum = builder.binary(Opcode::Add, i32, a, b);
        builder.ret(Some(sum));

        let add = func.defining_inst(sum).unwrap();
        func.remove_inst(add);
        let _ = func.inst(add);
    }

    #[test]
    fn values_equal_sees_constant_payloads() {
        let (mut module, f) = sample();
        let i32 = module.types.i32();
        let i64 = module.types.i64();
        let func = module.function_mut(f);
        let c1 = func.const_int(i32, 7);
        let c2 = func.const_int(i32, 7);
        let c3 = func.const_int(i64, 7);
        assert_ne!(c1, c2);
        assert!(func.values_equal(c1, c2));
        assert!(!func.values_equal(c1, c3));
    }

    #[test]
    fn function_type_roundtrip() {
        let (module, f) = sample();
        let func = module.function(f);
        match module.types.kind(func.ty) {
            TypeKind::Function { params, variadic, .. } => {
                assert_eq!(params.len(), 2);
                assert!(!variadic);
            }
            other => panic!("expected function type, got {other:?}"),
        }
    }
}
