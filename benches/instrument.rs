use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use ohash_analysis::{AnalysisFacts, ModuleAnalysis};
use ohash_core::config::InstrumentConfig;
use ohash_pass::{ObliviousHashPass, SeededRandom};

#[path = "../tests/common/mod.rs"]
mod common;

fn bench_instrument(c: &mut Criterion) {
    let module = common::generated_module(256);
    let facts = AnalysisFacts::assume_input_independent(&module);
    let analysis = ModuleAnalysis::new(&module, facts).expect("facts resolve");
    let cfg = InstrumentConfig {
        num_hash: 8,
        ..InstrumentConfig::default()
    };

    c.bench_function("instrument_256_functions", |b| {
        b.iter_batched(
            || module.clone(),
            |mut m| {
                let mut pass = ObliviousHashPass::new(cfg.clone()).expect("valid config");
                let mut rng = SeededRandom::new(42);
                pass.run(&mut m, &analysis, &mut rng).expect("pass runs")
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("loop_forest_256_functions", |b| {
        b.iter(|| {
            module
                .functions
                .iter()
                .map(|f| ohash_analysis::LoopForest::compute(f).loops().len())
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_instrument);
criterion_main!(benches);
