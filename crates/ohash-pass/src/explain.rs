//! Dry run: what the pass would do to each function, block and instruction.
//!
//! No random draws are made, so accumulator choices and coin-decided log
//! events are reported as possibilities rather than outcomes.

use ohash_analysis::ProgramAnalysis;
use ohash_core::config::InstrumentConfig;
use ohash_core::id::{BlockId, InstId};
use ohash_core::ir::{InstKind, Module, INTRINSIC_PREFIX};
use ohash_core::types::Type;
use serde::Serialize;

use crate::driver::{block_skipped, function_skip, instruction_ignored, FunctionSkip};
use crate::error::{PassError, Result};
use crate::normalize::{classify, Normalization};
use crate::policy::{FoldValue, InstrumentationPolicy};
use crate::runtime::RuntimeSymbols;
use crate::worklist::Placement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldDecision {
    None,
    InputDependent,
    /// Pointer-typed value, refused by normalization.
    Declined,
    Fold(Placement),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogDecision {
    /// Inside a loop.
    Suppressed,
    /// Comparisons always log the accumulator they just folded into.
    Always,
    /// Calls to external functions log unconditionally.
    ExternalCall,
    Coin,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteExplanation {
    pub inst: InstId,
    pub fold: FoldDecision,
    pub log: LogDecision,
    pub terminator: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockExplanation {
    pub id: BlockId,
    pub exit: bool,
    pub skipped: bool,
    pub loop_header: Option<BlockId>,
    pub sites: Vec<SiteExplanation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionExplanation {
    pub name: String,
    pub skipped: Option<FunctionSkip>,
    pub blocks: Vec<BlockExplanation>,
}

/// Describe the pass's per-site decisions for `module` without touching it.
pub fn explain(
    module: &Module,
    analysis: &dyn ProgramAnalysis,
    config: &InstrumentConfig,
) -> Result<Vec<FunctionExplanation>> {
    module.validate()?;
    analysis.check_coverage(module)?;
    let symbols = RuntimeSymbols::from_config(config);
    let policy = InstrumentationPolicy;

    let mut out = Vec::with_capacity(module.functions.len());
    for func in &module.functions {
        let skipped = function_skip(func, analysis, &symbols);
        let mut blocks = Vec::new();
        if skipped.is_none() {
            let results = func.result_types();
            for (bi, block) in func.blocks.iter().enumerate() {
                let skipped = block_skipped(func, analysis, bi);
                let loop_header = analysis.loop_containing(func, block.id).map(|l| l.header);
                let mut sites = Vec::new();
                if !skipped {
                    for inst in &block.insts {
                        if instruction_ignored(inst, &symbols) {
                            continue;
                        }
                        let fold = if analysis.is_input_dependent(func, inst) {
                            FoldDecision::InputDependent
                        } else {
                            match policy.plan(func, &results, inst)? {
                                None => FoldDecision::None,
                                Some(plan) => {
                                    let ty = match &plan.value {
                                        FoldValue::Comparison { .. } if inst.ty != Type::I1 => {
                                            return Err(PassError::UnsupportedType(inst.ty.clone()))
                                        }
                                        FoldValue::Comparison { .. } => Type::I8,
                                        FoldValue::Value { ty, .. } => ty.clone(),
                                    };
                                    match classify(&ty)? {
                                        Normalization::Declined => FoldDecision::Declined,
                                        _ => FoldDecision::Fold(plan.placement),
                                    }
                                }
                            }
                        };
                        let log = if loop_header.is_some() {
                            LogDecision::Suppressed
                        } else if matches!(inst.kind, InstKind::Compare { .. }) {
                            LogDecision::Always
                        } else if inst.called_function().is_some_and(|name| {
                            !name.starts_with(INTRINSIC_PREFIX) && !symbols.is_combiner(name)
                        }) {
                            LogDecision::ExternalCall
                        } else {
                            LogDecision::Coin
                        };
                        sites.push(SiteExplanation {
                            inst: inst.id,
                            fold,
                            log,
                            terminator: matches!(inst.kind, InstKind::Return { .. }),
                        });
                    }
                }
                blocks.push(BlockExplanation {
                    id: block.id,
                    exit: bi + 1 == func.blocks.len(),
                    skipped,
                    loop_header,
                    sites,
                });
            }
        }
        out.push(FunctionExplanation {
            name: func.name.clone(),
            skipped,
            blocks,
        });
    }
    Ok(out)
}
