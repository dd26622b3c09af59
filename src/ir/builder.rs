// This module implements the stateful instruction builder. A Builder borrows
// one function and keeps a single insertion cursor: the current block, with
// appends always at the block tail. Each creator allocates the instruction in
// the function's arena, attaches a result value when the result type is
// non-void, and appends at the cursor in O(1). There is no arbitrary
// insertion point; callers lay out blocks strictly in forward order, which is
// the only construction order the pipeline's invariants assume. Struct-field
// address computation validates the field index against the type context and
// reports out-of-range indices as IrError rather than producing a partial
// instruction.

//! The insertion-cursor instruction builder.

use crate::ir::error::IrResult;
use crate::ir::function::Function;
use crate::ir::inst::{InstData, Opcode};
use crate::ir::types::{TypeContext, TypeId};
use crate::ir::value::{BlockId, InstId, ValueId};

/// Builds instructions at a cursor. Append-only at the tail of the current
/// block.
pub struct Builder<'f> {
    func: &'f mut Function,
    block: Option<BlockId>,
}

impl<'f> Builder<'f> {
    pub fn new(func: &'f mut Function) -> Self {
        Self { func, block: None }
    }

    pub fn func(&mut self) -> &mut Function {
        self.func
    }

    pub fn create_block(&mut self, label: &str) -> BlockId {
        self.func.add_block(label)
    }

    /// Move the cursor to the tail of `block`.
    pub fn position_at_end(&mut self, block: BlockId) {
        self.block = Some(block);
    }

    fn cursor(&self) -> BlockId {
        self.block.expect("builder has no insertion point")
    }

    fn detached(op: Opcode, ty: TypeId, operands: Vec<ValueId>) -> InstData {
        InstData {
            op,
            operands,
            result: None,
            ty,
            // Patched by append_to_block.
            block: BlockId(0),
            targets: Vec::new(),
            incoming: Vec::new(),
            agg_ty: None,
            agg_field: 0,
            dead: false,
        }
    }

    /// Append a detached instruction at the cursor, attaching a result value
    /// when `ty` is non-void.
    fn append(&mut self, data: InstData) -> InstId {
        let ty = data.ty;
        let id = self.func.push_inst(data);
        if ty != TypeId::VOID {
            self.func.attach_result(id, ty, None);
        }
        self.func.append_to_block(self.cursor(), id);
        id
    }

    fn append_valued(&mut self, data: InstData) -> ValueId {
        let id = self.append(data);
        self.func
            .inst_result(id)
            .expect("valued instruction must have a result")
    }

    // ---- constants ----

    pub fn const_int(&mut self, ty: TypeId, v: i64) -> ValueId {
        self.func.const_int(ty, v)
    }

    pub fn const_float(&mut self, ty: TypeId, v: f64) -> ValueId {
        self.func.const_float(ty, v)
    }

    pub fn const_null(&mut self, ty: TypeId) -> ValueId {
        self.func.const_null(ty)
    }

    // ---- computation ----

    pub fn binary(&mut self, op: Opcode, ty: TypeId, lhs: ValueId, rhs: ValueId) -> ValueId {
        debug_assert!(op.is_int_binary() || op.is_float_binary());
        self.append_valued(Self::detached(op, ty, vec![lhs, rhs]))
    }

    pub fn unary(&mut self, op: Opcode, ty: TypeId, x: ValueId) -> ValueId {
        debug_assert!(matches!(op, Opcode::Neg | Opcode::Not));
        self.append_valued(Self::detached(op, ty, vec![x]))
    }

    /// Comparison producing a `bool()`-typed result.
    pub fn cmp(&mut self, op: Opcode, ty: TypeId, lhs: ValueId, rhs: ValueId) -> ValueId {
        debug_assert!(op.is_cmp());
        self.append_valued(Self::detached(op, ty, vec![lhs, rhs]))
    }

    // ---- memory ----

    /// Reserve stack storage; `ptr_ty` is the pointer type of the result.
    pub fn alloca(&mut self, ptr_ty: TypeId) -> ValueId {
        self.append_valued(Self::detached(Opcode::Alloca, ptr_ty, Vec::new()))
    }

    pub fn load(&mut self, ty: TypeId, ptr: ValueId) -> ValueId {
        self.append_valued(Self::detached(Opcode::Load, ty, vec![ptr]))
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) -> InstId {
        self.append(Self::detached(Opcode::Store, TypeId::VOID, vec![value, ptr]))
    }

    /// Address of struct field `field` of `*base`. Fails fast on an
    /// out-of-range field index.
    pub fn gep(
        &mut self,
        types: &mut TypeContext,
        agg: TypeId,
        base: ValueId,
        field: u32,
    ) -> IrResult<ValueId> {
        // Validates the index; the offset itself is looked up at lowering.
        types.struct_field_offset(agg, field as usize)?;
        let field_ty = match types.kind(agg) {
            crate::ir::types::TypeKind::Struct { fields, .. } => fields[field as usize],
            _ => unreachable!("struct_field_offset verified the kind"),
        };
        let ptr = types.pointer_to(field_ty);
        let mut data = Self::detached(Opcode::Gep, ptr, vec![base]);
        data.agg_ty = Some(agg);
        data.agg_field = field;
        Ok(self.append_valued(data))
    }

    // ---- calls and phis ----

    pub fn call(&mut self, ret_ty: TypeId, callee: ValueId, args: &[ValueId]) -> Option<ValueId> {
        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(callee);
        operands.extend_from_slice(args);
        let id = self.append(Self::detached(Opcode::Call, ret_ty, operands));
        self.func.inst_result(id)
    }

    pub fn phi(&mut self, ty: TypeId, incoming: &[(ValueId, BlockId)]) -> ValueId {
        let mut data = Self::detached(
            Opcode::Phi,
            ty,
            incoming.iter().map(|&(v, _)| v).collect(),
        );
        data.incoming = incoming.iter().map(|&(_, b)| b).collect();
        self.append_valued(data)
    }

    /// Append one incoming edge to an existing phi. Used when the edge's
    /// source block is created after the phi.
    pub fn add_phi_incoming(&mut self, phi: ValueId, value: ValueId, block: BlockId) {
        let id = self
            .func
            .defining_inst(phi)
            .expect("add_phi_incoming target must be a phi result");
        let inst = self.func.inst_mut(id);
        debug_assert_eq!(inst.op, Opcode::Phi);
        inst.operands.push(value);
        inst.incoming.push(block);
    }

    // ---- control transfer ----

    pub fn br(&mut self, target: BlockId) -> InstId {
        let mut data = Self::detached(Opcode::Br, TypeId::VOID, Vec::new());
        data.targets = vec![target];
        self.append(data)
    }

    pub fn cond_br(&mut self, cond: ValueId, on_true: BlockId, on_false: BlockId) -> InstId {
        let mut data = Self::detached(Opcode::CondBr, TypeId::VOID, vec![cond]);
        data.targets = vec![on_true, on_false];
        self.append(data)
    }

    /// `targets[0]` is the default; the rest are the case targets.
    pub fn switch(&mut self, scrutinee: ValueId, default: BlockId, cases: &[BlockId]) -> InstId {
        let mut data = Self::detached(Opcode::Switch, TypeId::VOID, vec![scrutinee]);
        data.targets = Vec::with_capacity(cases.len() + 1);
        data.targets.push(default);
        data.targets.extend_from_slice(cases);
        self.append(data)
    }

    pub fn ret(&mut self, value: Option<ValueId>) -> InstId {
        let operands = value.into_iter().collect();
        self.append(Self::detached(Opcode::Ret, TypeId::VOID, operands))
    }

    pub fn ret_void(&mut self) -> InstId {
        self.ret(None)
    }
}
