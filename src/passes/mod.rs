// This module implements the pass pipeline: the Pass trait every optimization
// implements, the optimization-level gating, and the PassManager that drives
// fixpoint iteration. The manager owns a registry of built-in passes, each
// tagged with the minimum level that enables it; set_level flips the enabled
// bits wholesale, set_enabled adjusts a single pass for fine-grained
// pipelines. run_func repeats "run every enabled pass once, OR the results"
// until a round reports no change or the hard cap of 10 rounds is reached:
// bounded fixpoint, deliberately not guaranteed to converge for pathological
// inputs. Within a round the passes run in their declared order, but the
// fixpoint loop tolerates any order. Passes are pure per-function transforms;
// nothing here parallelizes, and a pass that cannot prove a transform safe
// simply reports no change.

//! Optimization passes and the pass manager.

pub mod constant_fold;
pub mod copy_prop;
pub mod cse;
pub mod dce;
pub mod dead_store;
pub mod load_elim;
pub mod loop_unroll;
pub mod simplify_cfg;
pub mod store_load_prop;
pub mod strength_reduce;

use crate::ir::function::Function;
use crate::ir::module::Module;
use crate::ir::types::TypeContext;

/// Hard cap on fixpoint rounds per function.
pub const MAX_ITERATIONS: usize = 10;

/// One optimization pass over a single function.
pub trait Pass {
    fn name(&self) -> &'static str;
    /// Returns whether the function was changed.
    fn run(&self, func: &mut Function, types: &TypeContext) -> bool;
}

/// Optimization level. Each built-in pass declares the minimum level that
/// enables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptLevel {
    None,
    Debug,
    Basic,
    Standard,
    Aggressive,
}

struct PassEntry {
    pass: Box<dyn Pass>,
    min_level: OptLevel,
    enabled: bool,
}

/// Drives the registered passes over functions and modules.
pub struct PassManager {
    level: OptLevel,
    passes: Vec<PassEntry>,
}

impl PassManager {
    /// A manager with the built-in registry at the default level
    /// (`Standard`; loop unrolling requires `Aggressive` and is therefore
    /// disabled by default).
    pub fn new() -> Self {
        let passes: Vec<PassEntry> = vec![
            entry(constant_fold::ConstantFold, OptLevel::Debug),
            entry(dce::Dce, OptLevel::Debug),
            entry(simplify_cfg::SimplifyCfg, OptLevel::Basic),
            entry(strength_reduce::StrengthReduce, OptLevel::Basic),
            entry(copy_prop::CopyProp, OptLevel::Basic),
            entry(dead_store::DeadStore, OptLevel::Standard),
            entry(load_elim::LoadElim, OptLevel::Standard),
            entry(store_load_prop::StoreLoadProp, OptLevel::Standard),
            entry(loop_unroll::LoopUnroll::default(), OptLevel::Aggressive),
            entry(cse::Cse, OptLevel::Standard),
        ];
        let mut pm = Self { level: OptLevel::Standard, passes };
        pm.set_level(OptLevel::Standard);
        pm
    }

    pub fn level(&self) -> OptLevel {
        self.level
    }

    /// Enable exactly the passes whose `min_level` is at most `level`.
    pub fn set_level(&mut self, level: OptLevel) {
        self.level = level;
        for entry in self.passes.iter_mut() {
            entry.enabled = entry.min_level <= level;
        }
    }

    /// Enable or disable one pass by name. Returns false when no pass has
    /// that name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        for entry in self.passes.iter_mut() {
            if entry.pass.name() == name {
                entry.enabled = enabled;
                return true;
            }
        }
        false
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.passes
            .iter()
            .any(|e| e.pass.name() == name && e.enabled)
    }

    /// Run the enabled passes over `func` to a bounded fixpoint. Returns
    /// whether anything changed. Declarations are skipped.
    pub fn run_func(&self, func: &mut Function, types: &TypeContext) -> bool {
        if func.is_declaration() {
            return false;
        }
        let mut changed_any = false;
        for round in 0..MAX_ITERATIONS {
            let mut changed = false;
            for entry in &self.passes {
                if !entry.enabled {
                    continue;
                }
                if entry.pass.run(func, types) {
                    log::debug!(
                        "pass {} changed function {} (round {})",
                        entry.pass.name(),
                        func.name,
                        round
                    );
                    changed = true;
                }
            }
            changed_any |= changed;
            if !changed {
                log::trace!("function {} stable after {} round(s)", func.name, round + 1);
                break;
            }
        }
        changed_any
    }

    /// Run over every function in the module. Returns whether any changed.
    pub fn run_module(&self, module: &mut Module) -> bool {
        let Module { types, functions, .. } = module;
        let mut changed = false;
        for func in functions.iter_mut() {
            changed |= self.run_func(func, types);
        }
        changed
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

fn entry<P: Pass + 'static>(pass: P, min_level: OptLevel) -> PassEntry {
    PassEntry { pass: Box::new(pass), min_level, enabled: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_gating_matches_min_levels() {
        let mut pm = PassManager::new();
        pm.set_level(OptLevel::Debug);
        assert!(pm.is_enabled("constant-fold"));
        assert!(pm.is_enabled("dce"));
        assert!(!pm.is_enabled("cse"));
        assert!(!pm.is_enabled("loop-unroll"));

        pm.set_level(OptLevel::Aggressive);
        assert!(pm.is_enabled("cse"));
        assert!(pm.is_enabled("loop-unroll"));

        pm.set_level(OptLevel::None);
        assert!(!pm.is_enabled("constant-fold"));
    }

    #[test]
    fn loop_unroll_disabled_at_default_level() {
        let pm = PassManager::new();
        assert_eq!(pm.level(), OptLevel::Standard);
        assert!(!pm.is_enabled("loop-unroll"));
        assert!(pm.is_enabled("store-load-prop"));
    }

    #[test]
    fn per_pass_toggle() {
        let mut pm = PassManager::new();
        assert!(pm.set_enabled("loop-unroll", true));
        assert!(pm.is_enabled("loop-unroll"));
        assert!(pm.set_enabled("dce", false));
        assert!(!pm.is_enabled("dce"));
        assert!(!pm.set_enabled("no-such-pass", true));
    }
}
