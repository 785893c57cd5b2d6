//! Module driver: setup, per-function traversal, and rewrite.
//!
//! A run moves through `Idle -> Setup -> Traversing -> Done`. Setup checks the
//! module and analysis, declares the runtime functions and creates the
//! accumulator pool. Traversal is read-only and produces a list of [`Edit`]s
//! per function, which are then applied before moving to the next function.

use ohash_analysis::ProgramAnalysis;
use ohash_core::config::InstrumentConfig;
use ohash_core::ir::{Function, InstKind, Instruction, Module};
use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::accumulator::AccumulatorPool;
use crate::context::InstrumentationContext;
use crate::error::Result;
use crate::logging::LoggingPolicy;
use crate::metrics::PassStats;
use crate::policy::InstrumentationPolicy;
use crate::random::{RandomSource, SeededRandom};
use crate::runtime::RuntimeSymbols;
use crate::selector::HashSiteSelector;
use crate::worklist::{apply_edits, Edit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    Idle,
    Setup,
    Traversing,
    Done,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    /// Whether any function received instrumentation.
    pub modified: bool,
    /// Seed of the random source, when the pass created it.
    pub seed: Option<u64>,
    /// Accumulator global names in pool-index order.
    pub accumulators: Vec<String>,
    /// Runtime function declarations added to the module.
    pub declarations_added: usize,
    pub stats: PassStats,
}

/// Why a whole function is left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionSkip {
    Declaration,
    Runtime,
    NotInputIndependent,
}

pub(crate) fn function_skip(
    func: &Function,
    analysis: &dyn ProgramAnalysis,
    symbols: &RuntimeSymbols,
) -> Option<FunctionSkip> {
    if func.is_declaration() || func.is_intrinsic() {
        Some(FunctionSkip::Declaration)
    } else if symbols.is_combiner(&func.name) || symbols.is_logger(&func.name) {
        Some(FunctionSkip::Runtime)
    } else if !analysis.is_function_input_independent(func) {
        Some(FunctionSkip::NotInputIndependent)
    } else {
        None
    }
}

/// Non-deterministic blocks are skipped, except the exit block.
pub(crate) fn block_skipped(
    func: &Function,
    analysis: &dyn ProgramAnalysis,
    index: usize,
) -> bool {
    let block = &func.blocks[index];
    index + 1 != func.blocks.len() && analysis.is_block_nondeterministic(func, block.id)
}

/// Phi nodes and calls into the logger are never looked at.
pub(crate) fn instruction_ignored(inst: &Instruction, symbols: &RuntimeSymbols) -> bool {
    match &inst.kind {
        InstKind::Phi { .. } => true,
        InstKind::Call { .. } => inst
            .called_function()
            .is_some_and(|name| symbols.is_logger(name)),
        _ => false,
    }
}

pub struct ObliviousHashPass {
    config: InstrumentConfig,
    policy: InstrumentationPolicy,
    logging: LoggingPolicy,
    state: PassState,
}

impl ObliviousHashPass {
    pub fn new(config: InstrumentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            policy: InstrumentationPolicy,
            logging: LoggingPolicy,
            state: PassState::Idle,
        })
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    fn transition(&mut self, next: PassState) {
        debug!(from = ?self.state, to = ?next, "pass state");
        self.state = next;
    }

    /// Run with a [`SeededRandom`] seeded from the config, or from the clock.
    pub fn run_seeded(
        &mut self,
        module: &mut Module,
        analysis: &dyn ProgramAnalysis,
    ) -> Result<PassReport> {
        let mut rng = match self.config.seed {
            Some(seed) => SeededRandom::new(seed),
            None => SeededRandom::from_time(),
        };
        let seed = rng.seed();
        let mut report = self.run(module, analysis, &mut rng)?;
        report.seed = Some(seed);
        Ok(report)
    }

    /// Instrument every eligible function of `module`.
    ///
    /// Any error aborts the run. Setup errors leave the module untouched; an
    /// error during traversal may leave earlier functions instrumented, so
    /// callers should discard the module.
    pub fn run(
        &mut self,
        module: &mut Module,
        analysis: &dyn ProgramAnalysis,
        rng: &mut dyn RandomSource,
    ) -> Result<PassReport> {
        let span = info_span!("ohash", module = %module.name, num_hash = self.config.num_hash);
        let _enter = span.enter();

        self.state = PassState::Idle;
        self.transition(PassState::Setup);
        module.validate()?;
        analysis.check_coverage(module)?;

        let symbols = RuntimeSymbols::from_config(&self.config);
        let (declarations_added, pool) = self.declare_runtime(module, &symbols)?;
        let accumulators = pool.names().to_vec();
        let selector = HashSiteSelector::new(pool, &symbols);
        let inst_ids = module.inst_id_allocator();
        let mut ctx = InstrumentationContext::new(selector, symbols, inst_ids, rng);

        self.transition(PassState::Traversing);
        let mut modified = false;
        for index in 0..module.functions.len() {
            let edits = self.collect_edits(&mut ctx, &module.functions[index], analysis)?;
            if edits.is_empty() {
                continue;
            }
            modified = true;
            ctx.stats.functions_instrumented += 1;
            let func = &mut module.functions[index];
            let inserted = apply_edits(func, edits)?;
            debug!(function = %func.name, inserted, "applied edits");
        }

        self.transition(PassState::Done);
        ctx.stats.emit_summary(&module.name);
        info!(modified, "instrumentation finished");
        Ok(PassReport {
            modified,
            seed: None,
            accumulators,
            declarations_added,
            stats: ctx.stats,
        })
    }

    /// Add the runtime declarations and the accumulator pool. Both only
    /// append, so a failure truncates the module back to where it was.
    fn declare_runtime(
        &self,
        module: &mut Module,
        symbols: &RuntimeSymbols,
    ) -> Result<(usize, AccumulatorPool)> {
        let (functions, globals) = (module.functions.len(), module.globals.len());
        let declared = symbols.declare(module).and_then(|added| {
            AccumulatorPool::create(module, &self.config).map(|pool| (added, pool))
        });
        if declared.is_err() {
            module.functions.truncate(functions);
            module.globals.truncate(globals);
        }
        declared
    }

    fn collect_edits(
        &self,
        ctx: &mut InstrumentationContext<'_>,
        func: &Function,
        analysis: &dyn ProgramAnalysis,
    ) -> Result<Vec<Edit>> {
        match function_skip(func, analysis, &ctx.symbols) {
            Some(FunctionSkip::Declaration) => {
                ctx.stats.functions_skipped_declaration += 1;
                return Ok(vec![]);
            }
            Some(FunctionSkip::Runtime) => {
                debug!(function = %func.name, "skipping runtime function");
                ctx.stats.functions_skipped_runtime += 1;
                return Ok(vec![]);
            }
            Some(FunctionSkip::NotInputIndependent) => {
                debug!(function = %func.name, "skipping function reachable from non-deterministic context");
                ctx.stats.functions_skipped_nondeterministic += 1;
                return Ok(vec![]);
            }
            None => {}
        }
        ctx.stats.functions_visited += 1;

        let results = func.result_types();
        let mut edits = Vec::new();
        for (bi, block) in func.blocks.iter().enumerate() {
            if block_skipped(func, analysis, bi) {
                debug!(function = %func.name, block = %block.id, "skipping non-deterministic block");
                ctx.stats.blocks_skipped += 1;
                continue;
            }
            let in_loop = analysis.loop_containing(func, block.id).is_some();

            for (anchor, inst) in block.insts.iter().enumerate() {
                if instruction_ignored(inst, &ctx.symbols) {
                    continue;
                }
                ctx.stats.instructions_visited += 1;
                if let InstKind::AtomicRmw { op, .. } = &inst.kind {
                    ctx.stats.atomics_seen += 1;
                    if self.config.trace_atomics {
                        debug!(function = %func.name, inst = %inst.id, ?op, "atomic read-modify-write left uninstrumented");
                    }
                }

                let mut push = |insertion| {
                    edits.push(Edit {
                        block: bi,
                        anchor,
                        insertion,
                    })
                };

                if analysis.is_input_dependent(func, inst) {
                    ctx.stats.input_dependent_skipped += 1;
                } else if let Some(fold) = self.policy.instrument(ctx, func, &results, inst)? {
                    push(fold);
                }

                if in_loop {
                    if !ctx.selector.usage().is_empty() {
                        ctx.stats.logs_suppressed_in_loop += 1;
                    }
                } else if let Some(log) = self.logging.maybe_log(ctx, inst)? {
                    push(log);
                }

                if matches!(inst.kind, InstKind::Return { .. }) {
                    push(self.logging.end_logging(ctx));
                }
            }
        }
        Ok(edits)
    }
}
