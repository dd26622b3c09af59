// This module implements a read-only structural verifier. The graph
// invariants the builder and passes rely on are otherwise unenforced; the
// verifier makes them checkable without changing pass behavior. Tests run it
// after building IR and after pass pipelines. Checks: every block ends in
// a terminator with nothing after it, phis sit at the block head with
// matching operand/incoming arity, operands do not reference freed
// instruction slots, and branch targets are live blocks.

//! Structural IR verification.

use crate::ir::error::{IrError, IrResult};
use crate::ir::function::Function;
use crate::ir::inst::Opcode;
use crate::ir::value::ValueKind;

/// Check the structural invariants of `func`. Declarations verify trivially.
pub fn verify_function(func: &Function) -> IrResult<()> {
    if func.is_declaration() {
        return Ok(());
    }
    if func.entry().is_none() {
        return Err(IrError::NoEntry { name: func.name.clone() });
    }

    for &b in func.layout() {
        let label = || func.block(b).label.clone();
        let insts = func.live_insts(b);

        let Some(&last) = insts.last() else {
            return Err(IrError::MissingTerminator { label: label() });
        };
        if !func.inst(last).is_terminator() {
            return Err(IrError::MissingTerminator { label: label() });
        }

        let mut past_head = false;
        for (idx, &id) in insts.iter().enumerate() {
            let inst = func.inst(id);

            if inst.is_terminator() && idx + 1 != insts.len() {
                return Err(IrError::InstructionAfterTerminator { label: label() });
            }

            match inst.op {
                Opcode::Phi => {
                    if past_head {
                        let name = inst
                            .result
                            .and_then(|r| func.value(r).name.clone())
                            .unwrap_or_else(|| "<unnamed>".to_owned());
                        return Err(IrError::PhiNotAtHead { name });
                    }
                    if inst.operands.len() != inst.incoming.len() {
                        return Err(IrError::PhiArity {
                            values: inst.operands.len(),
                            blocks: inst.incoming.len(),
                        });
                    }
                }
                _ => past_head = true,
            }

            for &op in &inst.operands {
                if let ValueKind::Inst(def) = func.value(op).kind {
                    if !func.inst_is_live(def) {
                        return Err(IrError::StaleInstruction { label: label() });
                    }
                }
            }
            for &target in &inst.targets {
                if !func.block_is_live(target) {
                    return Err(IrError::StaleTarget { label: label() });
                }
            }
        }
    }
    Ok(())
}
