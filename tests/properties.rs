//! Properties that must hold for any seed, checked over generated modules.

mod common;

use std::collections::HashSet;

use common::*;
use ohash_analysis::{AnalysisFacts, FunctionFacts, ModuleAnalysis, ProgramAnalysis};
use ohash_core::config::InstrumentConfig;
use ohash_core::id::InstId;
use ohash_core::ir::{InstKind, Module, Operand};
use ohash_core::types::Type;
use ohash_pass::verify::{check_monotonic_ids, check_non_interference, fold_sites, log_events};
use ohash_pass::ObliviousHashPass;

const SEEDS: [u64; 5] = [0, 1, 7, 42, 0xdead_beef];

fn instrument(m: &mut Module, facts: AnalysisFacts, seed: u64) -> ohash_pass::PassReport {
    let analysis = ModuleAnalysis::new(m, facts).unwrap();
    let cfg = InstrumentConfig {
        seed: Some(seed),
        num_hash: 3,
        ..InstrumentConfig::default()
    };
    ObliviousHashPass::new(cfg)
        .unwrap()
        .run_seeded(m, &analysis)
        .unwrap()
}

#[test]
fn instrumentation_only_inserts() {
    for seed in SEEDS {
        let mut m = generated_module(4);
        let original = m.clone();
        let facts = AnalysisFacts::assume_input_independent(&m);
        instrument(&mut m, facts, seed);
        check_non_interference(&original, &m, &symbols()).unwrap();
    }
}

#[test]
fn log_ids_increase_from_one() {
    for seed in SEEDS {
        let mut m = generated_module(6);
        let facts = AnalysisFacts::assume_input_independent(&m);
        let report = instrument(&mut m, facts, seed);
        let events = log_events(&m, "oh_log");
        check_monotonic_ids(&events).unwrap();

        let ids: Vec<u32> = events.iter().filter(|e| !e.is_terminator()).map(|e| e.id).collect();
        let expected: Vec<u32> = (1..=ids.len() as u32).collect();
        assert_eq!(ids, expected);
        assert_eq!(ids.len() as u64, report.stats.log_events);
    }
}

#[test]
fn every_function_with_a_return_ends_its_log_stream() {
    for seed in SEEDS {
        let mut m = generated_module(3);
        let mut facts = AnalysisFacts::assume_input_independent(&m);
        // Flag every block of one function; its exit must still be observed.
        let f1 = m.function("f1").unwrap();
        let all = f1.blocks.iter().map(|b| b.id).collect();
        facts.function_mut("f1").unwrap().nondeterministic_blocks = all;

        instrument(&mut m, facts, seed);
        let events = log_events(&m, "oh_log");
        for f in m.functions.iter().filter(|f| !f.is_declaration()) {
            assert!(
                events.iter().any(|e| e.function == f.name && e.is_terminator()),
                "no terminator in {}",
                f.name
            );
        }
    }
}

#[test]
fn input_dependent_values_never_reach_a_combiner() {
    for seed in SEEDS {
        let mut m = generated_module(2);
        let original = m.clone();
        let mut facts = AnalysisFacts::assume_input_independent(&m);
        let mut flagged = HashSet::new();
        for f in &m.functions {
            if f.is_declaration() {
                continue;
            }
            // Every other value-producing instruction.
            let ids: Vec<InstId> = f
                .instructions()
                .filter(|i| !i.ty.is_void())
                .map(|i| i.id)
                .step_by(2)
                .collect();
            flagged.extend(ids.iter().copied());
            facts.insert(
                f.name.clone(),
                FunctionFacts {
                    input_dependent: ids.into_iter().collect(),
                    ..FunctionFacts::default()
                },
            );
        }

        instrument(&mut m, facts, seed);
        for site in fold_sites(&original, &m, &symbols()) {
            if let Operand::Inst(id) = site.source {
                assert!(!flagged.contains(&id), "{id} was folded");
            }
        }
    }
}

#[test]
fn pointer_values_are_never_folded() {
    let mut m = module(vec![function(
        "f",
        vec![Type::Ptr, Type::Ptr],
        Type::Ptr,
        vec![block(
            0,
            vec![
                load(0, Type::Ptr, Operand::Arg(0)),
                store(1, inst(0), Operand::Arg(1)),
                ret(2, Some(inst(0))),
            ],
        )],
    )]);
    let original = m.clone();
    let facts = AnalysisFacts::assume_input_independent(&m);
    let report = instrument(&mut m, facts, 3);

    assert_eq!(report.stats.declined, 3);
    assert_eq!(report.stats.folds, 0);
    assert!(fold_sites(&original, &m, &symbols()).is_empty());
}

#[test]
fn comparisons_outside_loops_log_their_own_accumulator() {
    for seed in SEEDS {
        let mut m = generated_module(3);
        let original = m.clone();
        let facts = AnalysisFacts::assume_input_independent(&m);
        let analysis = ModuleAnalysis::new(&m, facts.clone()).unwrap();
        instrument(&mut m, facts, seed);

        for (orig, f) in original.functions.iter().zip(&m.functions) {
            for (ob, block) in orig.blocks.iter().zip(&f.blocks) {
                let in_loop = analysis.loop_containing(orig, ob.id).is_some();
                for (i, inst) in block.insts.iter().enumerate() {
                    if !matches!(inst.kind, InstKind::Compare { .. }) {
                        continue;
                    }
                    let before = i.checked_sub(1).map(|p| &block.insts[p]);
                    let logged = before.and_then(|p| match &p.kind {
                        InstKind::Call { args, .. } if p.called_function() == Some("oh_log") => {
                            Some(args[1].clone())
                        }
                        _ => None,
                    });
                    if in_loop {
                        assert!(logged.is_none());
                        continue;
                    }
                    let folded = block.insts[i + 1..]
                        .iter()
                        .find(|n| matches!(n.called_function(), Some("hash1") | Some("hash2")))
                        .and_then(|n| match &n.kind {
                            InstKind::Call { args, .. } => Some(args[0].clone()),
                            _ => None,
                        });
                    assert!(logged.is_some(), "compare {} not logged", inst.id);
                    assert_eq!(logged, folded);
                }
            }
        }
    }
}

#[test]
fn same_seed_same_module() {
    let run = |seed| {
        let mut m = generated_module(3);
        let facts = AnalysisFacts::assume_input_independent(&m);
        instrument(&mut m, facts, seed);
        m
    };
    assert_eq!(run(11), run(11));
}
