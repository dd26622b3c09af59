// End-to-end pipeline scenarios: each test builds a small function through
// the public API, runs the pass manager at some level, and checks the shape
// of the optimized IR rather than any single pass in isolation.

use optir::ir::cfg;
use optir::ir::verify::verify_function;
use optir::{Builder, Linkage, Module, Opcode, OptLevel, PassManager};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn constant_expression_collapses_to_a_return() {
    init_logging();
    let mut module = Module::new("m");
    let i32t = module.types.i32();
    let fty = module.types.function_type(i32t, &[], false);
    let f = module.define_function("six_times_seven", fty, Linkage::Public, &[]);
    {
        let func = module.function_mut(f);
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let six = b.const_int(i32t, 6);
        let seven = b.const_int(i32t, 7);
        let prod = b.binary(Opcode::Mul, i32t, six, seven);
        let zero = b.const_int(i32t, 0);
        let sum = b.binary(Opcode::Add, i32t, prod, zero);
        b.ret(Some(sum));
    }

    let mut pm = PassManager::new();
    pm.set_level(OptLevel::Debug);
    assert!(pm.run_module(&mut module));

    let func = module.function(f);
    let entry = func.entry().unwrap();
    let insts = func.live_insts(entry);
    assert_eq!(insts.len(), 1, "only the return survives");
    let ret = insts[0];
    assert_eq!(func.inst(ret).op, Opcode::Ret);
    assert_eq!(func.as_const_int(func.inst(ret).operands[0]), Some(42));
    verify_function(func).unwrap();
}

#[test]
fn constant_branch_prunes_to_reachable_blocks_only() {
    init_logging();
    let mut module = Module::new("m");
    let i32t = module.types.i32();
    let i1 = module.types.bool();
    let fty = module.types.function_type(i32t, &[i32t], false);
    let f = module.define_function("pick", fty, Linkage::Public, &[i32t]);
    {
        let func = module.function_mut(f);
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        let yes = b.create_block("yes");
        let no = b.create_block("no");
        b.position_at_end(entry);
        let three = b.const_int(i32t, 3);
        let four = b.const_int(i32t, 4);
        let cond = b.cmp(Opcode::CmpLt, i1, three, four);
        b.cond_br(cond, yes, no);
        b.position_at_end(yes);
        let one = b.const_int(i32t, 1);
        let v = b.binary(Opcode::Add, i32t, p, one);
        b.ret(Some(v));
        b.position_at_end(no);
        b.ret(Some(p));
    }

    let mut pm = PassManager::new();
    pm.set_level(OptLevel::Basic);
    assert!(pm.run_module(&mut module));

    // Every remaining block is reachable from entry.
    let func = module.function(f);
    let reach = cfg::reachable(func);
    for &b in func.layout() {
        assert!(reach.contains(&b));
    }
    verify_function(func).unwrap();
}

#[test]
fn store_load_round_trip_forwards_the_value() {
    init_logging();
    let mut module = Module::new("m");
    let i32t = module.types.i32();
    let ptr = module.types.pointer_to(i32t);
    let fty = module.types.function_type(i32t, &[i32t], false);
    let f = module.define_function("round_trip", fty, Linkage::Public, &[i32t]);
    {
        let func = module.function_mut(f);
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let slot = b.alloca(ptr);
        b.store(p, slot);
        let x = b.load(i32t, slot);
        let one = b.const_int(i32t, 1);
        let sum = b.binary(Opcode::Add, i32t, x, one);
        b.ret(Some(sum));
    }

    let pm = PassManager::new();
    assert!(pm.run_module(&mut module));

    // The load is gone and the add reads the stored value directly.
    let func = module.function(f);
    let entry = func.entry().unwrap();
    let p = func.params[0];
    for id in func.live_insts(entry) {
        let inst = func.inst(id);
        assert_ne!(inst.op, Opcode::Load);
        if inst.op == Opcode::Add {
            assert_eq!(inst.operands[0], p);
        }
    }
    verify_function(func).unwrap();
}

#[test]
fn counting_loop_unrolls_to_a_constant_return() {
    init_logging();
    let mut module = Module::new("m");
    let i32t = module.types.i32();
    let i1 = module.types.bool();
    let fty = module.types.function_type(i32t, &[], false);
    let f = module.define_function("sum_0_to_3", fty, Linkage::Public, &[]);
    {
        let func = module.function_mut(f);
        let mut b = Builder::new(func);
        let pre = b.create_block("entry");
        let header = b.create_block("header");
        let body = b.create_block("body");
        let exit = b.create_block("exit");
        b.position_at_end(pre);
        let zero = b.const_int(i32t, 0);
        let one = b.const_int(i32t, 1);
        let four = b.const_int(i32t, 4);
        b.br(header);
        b.position_at_end(header);
        let i = b.phi(i32t, &[(zero, pre)]);
        let acc = b.phi(i32t, &[(zero, pre)]);
        let cond = b.cmp(Opcode::CmpLt, i1, i, four);
        b.cond_br(cond, body, exit);
        b.position_at_end(body);
        let acc_next = b.binary(Opcode::Add, i32t, acc, i);
        let i_next = b.binary(Opcode::Add, i32t, i, one);
        b.add_phi_incoming(i, i_next, body);
        b.add_phi_incoming(acc, acc_next, body);
        b.br(header);
        b.position_at_end(exit);
        b.ret(Some(acc));
    }

    let mut pm = PassManager::new();
    pm.set_level(OptLevel::Aggressive);
    assert!(pm.run_module(&mut module));

    // 0 + 1 + 2 + 3, computed entirely at compile time.
    let func = module.function(f);
    assert_eq!(func.layout().len(), 1);
    let entry = func.entry().unwrap();
    let insts = func.live_insts(entry);
    assert_eq!(insts.len(), 1);
    let ret = insts[0];
    assert_eq!(func.inst(ret).op, Opcode::Ret);
    assert_eq!(func.as_const_int(func.inst(ret).operands[0]), Some(6));
    verify_function(func).unwrap();
}

#[test]
fn second_run_reports_no_change() {
    init_logging();
    let mut module = Module::new("m");
    let i32t = module.types.i32();
    let fty = module.types.function_type(i32t, &[i32t], false);
    let f = module.define_function("f", fty, Linkage::Public, &[i32t]);
    {
        let func = module.function_mut(f);
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let zero = b.const_int(i32t, 0);
        let eight = b.const_int(i32t, 8);
        let a = b.binary(Opcode::Add, i32t, p, zero);
        let m = b.binary(Opcode::Mul, i32t, a, eight);
        b.ret(Some(m));
    }

    let pm = PassManager::new();
    assert!(pm.run_module(&mut module));
    assert!(!pm.run_module(&mut module), "pipeline reached a fixpoint");
    verify_function(module.function(f)).unwrap();
}

#[test]
fn disabled_pass_leaves_its_pattern_alone() {
    init_logging();
    let mut module = Module::new("m");
    let u32t = module.types.u32();
    let fty = module.types.function_type(u32t, &[u32t], false);
    let f = module.define_function("f", fty, Linkage::Public, &[u32t]);
    {
        let func = module.function_mut(f);
        let p = func.params[0];
        let mut b = Builder::new(func);
        let entry = b.create_block("entry");
        b.position_at_end(entry);
        let eight = b.const_int(u32t, 8);
        let m = b.binary(Opcode::Mul, u32t, p, eight);
        b.ret(Some(m));
    }

    let mut pm = PassManager::new();
    assert!(pm.set_enabled("strength-reduce", false));
    pm.run_module(&mut module);

    let func = module.function(f);
    let entry = func.entry().unwrap();
    assert!(func
        .live_insts(entry)
        .iter()
        .any(|&i| func.inst(i).op == Opcode::Mul));
}
