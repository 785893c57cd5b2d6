//! Shared helpers for building small modules and running the pass on them.

#![allow(dead_code)]

use ohash_analysis::{AnalysisFacts, ModuleAnalysis};
use ohash_core::prelude::*;
use ohash_pass::{ObliviousHashPass, PassReport, RuntimeSymbols, ScriptedRandom};

pub fn load(id: u64, ty: Type, ptr: Operand) -> Instruction {
    Instruction::new(InstId::new(id), ty, InstKind::Load { ptr })
}

pub fn store(id: u64, value: Operand, ptr: Operand) -> Instruction {
    Instruction::new(InstId::new(id), Type::Void, InstKind::Store { value, ptr })
}

pub fn add(id: u64, ty: Type, lhs: Operand, rhs: Operand) -> Instruction {
    Instruction::new(
        InstId::new(id),
        ty,
        InstKind::Binary {
            op: BinaryOp::Add,
            lhs,
            rhs,
        },
    )
}

pub fn cmp(id: u64, predicate: Predicate, lhs: Operand, rhs: Operand) -> Instruction {
    Instruction::new(
        InstId::new(id),
        Type::I1,
        InstKind::Compare {
            predicate,
            lhs,
            rhs,
        },
    )
}

pub fn call(id: u64, ty: Type, callee: &str, args: Vec<Operand>) -> Instruction {
    Instruction::new(
        InstId::new(id),
        ty,
        InstKind::Call {
            callee: Callee::Direct(callee.into()),
            args,
        },
    )
}

pub fn br(id: u64, cond: Option<Operand>, targets: &[u64]) -> Instruction {
    Instruction::new(
        InstId::new(id),
        Type::Void,
        InstKind::Branch {
            cond,
            targets: targets.iter().copied().map(BlockId::new).collect(),
        },
    )
}

pub fn ret(id: u64, value: Option<Operand>) -> Instruction {
    Instruction::new(InstId::new(id), Type::Void, InstKind::Return { value })
}

pub fn inst(id: u64) -> Operand {
    Operand::Inst(InstId::new(id))
}

pub fn block(id: u64, insts: Vec<Instruction>) -> Block {
    Block::new(BlockId::new(id), insts)
}

pub fn function(name: &str, params: Vec<Type>, ret: Type, blocks: Vec<Block>) -> Function {
    Function {
        name: name.into(),
        params,
        ret,
        blocks,
    }
}

pub fn module(functions: Vec<Function>) -> Module {
    let mut m = Module::new("test");
    m.functions = functions;
    m
}

pub fn config(num_hash: usize) -> InstrumentConfig {
    InstrumentConfig {
        num_hash,
        ..InstrumentConfig::default()
    }
}

pub fn symbols() -> RuntimeSymbols {
    RuntimeSymbols::from_config(&InstrumentConfig::default())
}

/// Run the pass over `m` with a scripted draw sequence.
pub fn run_scripted(
    m: &mut Module,
    facts: AnalysisFacts,
    num_hash: usize,
    rng: &mut ScriptedRandom,
) -> PassReport {
    let analysis = ModuleAnalysis::new(m, facts).expect("facts resolve");
    ObliviousHashPass::new(config(num_hash))
        .expect("valid config")
        .run(m, &analysis, rng)
        .expect("pass runs")
}

/// `n` functions, each with an entry block, a self-looping body and an exit:
///
/// ```text
/// bb0: %a = load p; %s = add %a, x; %c = icmp slt %s, 0; br %c, bb1, bb2
/// bb1: %l = load p; %t = add %l, 1; store %t, p; %d = icmp eq %t, 0; br %d, bb1, bb2
/// bb2: %v = call ext(p); %r = add %a, %v; ret %r
/// ```
pub fn generated_module(n: usize) -> Module {
    let mut functions = vec![Function::declaration(
        "ext",
        vec![Type::Ptr],
        Type::I64,
    )];
    let mut next = 0u64;
    let mut id = || {
        next += 1;
        next - 1
    };
    for f in 0..n {
        let (a, s, c, b0) = (id(), id(), id(), id());
        let (l, t, st, d, b1) = (id(), id(), id(), id(), id());
        let (v, r, rt) = (id(), id(), id());
        functions.push(function(
            &format!("f{f}"),
            vec![Type::Ptr, Type::I64],
            Type::I64,
            vec![
                block(
                    0,
                    vec![
                        load(a, Type::I64, Operand::Arg(0)),
                        add(s, Type::I64, inst(a), Operand::Arg(1)),
                        cmp(c, Predicate::Slt, inst(s), Operand::const_int(64, 0)),
                        br(b0, Some(inst(c)), &[1, 2]),
                    ],
                ),
                block(
                    1,
                    vec![
                        load(l, Type::I32, Operand::Arg(0)),
                        add(t, Type::I32, inst(l), Operand::const_int(32, 1)),
                        store(st, inst(t), Operand::Arg(0)),
                        cmp(d, Predicate::Eq, inst(t), Operand::const_int(32, 0)),
                        br(b1, Some(inst(d)), &[1, 2]),
                    ],
                ),
                block(
                    2,
                    vec![
                        call(v, Type::I64, "ext", vec![Operand::Arg(0)]),
                        add(r, Type::I64, inst(a), inst(v)),
                        ret(rt, Some(inst(r))),
                    ],
                ),
            ],
        ));
    }
    module(functions)
}
