//! Query interface the pass consumes, and its fact-backed implementation.

use std::collections::{BTreeSet, HashMap};

use ohash_core::id::BlockId;
use ohash_core::ir::{Function, Instruction, Module};
use tracing::{debug, warn};

use crate::error::{AnalysisError, Result};
use crate::facts::{AnalysisFacts, FunctionFacts};
use crate::loops::{Loop, LoopForest};

/// Read-only analysis queries. Implementations never observe pass mutations.
pub trait ProgramAnalysis {
    /// Whether results exist for `func`. The pass refuses to start otherwise.
    fn covers(&self, func: &Function) -> bool;

    fn is_function_input_independent(&self, func: &Function) -> bool;

    fn is_block_nondeterministic(&self, func: &Function, block: BlockId) -> bool;

    fn is_input_dependent(&self, func: &Function, inst: &Instruction) -> bool;

    fn loop_containing(&self, func: &Function, block: BlockId) -> Option<&Loop>;

    /// Every defined, non-intrinsic function of `module` must have results.
    fn check_coverage(&self, module: &Module) -> Result<()> {
        for f in &module.functions {
            if f.is_declaration() || f.is_intrinsic() {
                continue;
            }
            if !self.covers(f) {
                return Err(AnalysisError::MissingFunction(f.name.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
struct ResolvedFunction {
    facts: FunctionFacts,
    loops: LoopForest,
}

/// [`AnalysisFacts`] checked against a module, with loops resolved.
#[derive(Debug)]
pub struct ModuleAnalysis {
    functions: HashMap<String, ResolvedFunction>,
}

impl ModuleAnalysis {
    pub fn new(module: &Module, facts: AnalysisFacts) -> Result<Self> {
        let mut functions = HashMap::new();
        for (name, f_facts) in facts.functions {
            let Some(func) = module.function(&name) else {
                warn!(function = %name, "analysis facts name a function not in the module");
                continue;
            };
            let loops = resolve(func, &f_facts)?;
            debug!(
                function = %name,
                loops = loops.loops().len(),
                nondeterministic_blocks = f_facts.nondeterministic_blocks.len(),
                input_dependent = f_facts.input_dependent.len(),
                "resolved analysis facts"
            );
            functions.insert(
                name,
                ResolvedFunction {
                    facts: f_facts,
                    loops,
                },
            );
        }
        Ok(Self { functions })
    }

    pub fn loops(&self, function: &str) -> Option<&LoopForest> {
        self.functions.get(function).map(|r| &r.loops)
    }
}

fn resolve(func: &Function, facts: &FunctionFacts) -> Result<LoopForest> {
    let blocks: BTreeSet<BlockId> = func.blocks.iter().map(|b| b.id).collect();
    if let Some(block) = facts
        .nondeterministic_blocks
        .iter()
        .find(|b| !blocks.contains(b))
    {
        return Err(AnalysisError::UnknownBlock {
            function: func.name.clone(),
            block: *block,
        });
    }

    let insts: BTreeSet<_> = func.instructions().map(|i| i.id).collect();
    if let Some(inst) = facts.input_dependent.iter().find(|i| !insts.contains(i)) {
        return Err(AnalysisError::UnknownInstruction {
            function: func.name.clone(),
            inst: *inst,
        });
    }

    match &facts.loops {
        None => Ok(LoopForest::compute(func)),
        Some(loops) => {
            for l in loops {
                if !l.contains(l.header) {
                    return Err(AnalysisError::MalformedLoop {
                        function: func.name.clone(),
                        header: l.header,
                    });
                }
                if let Some(block) = l.blocks.iter().find(|b| !blocks.contains(b)) {
                    return Err(AnalysisError::UnknownBlock {
                        function: func.name.clone(),
                        block: *block,
                    });
                }
            }
            Ok(LoopForest::from_loops(loops.clone()))
        }
    }
}

impl ProgramAnalysis for ModuleAnalysis {
    fn covers(&self, func: &Function) -> bool {
        self.functions.contains_key(&func.name)
    }

    fn is_function_input_independent(&self, func: &Function) -> bool {
        self.functions
            .get(&func.name)
            .is_some_and(|r| r.facts.input_independent)
    }

    fn is_block_nondeterministic(&self, func: &Function, block: BlockId) -> bool {
        self.functions
            .get(&func.name)
            .is_some_and(|r| r.facts.nondeterministic_blocks.contains(&block))
    }

    fn is_input_dependent(&self, func: &Function, inst: &Instruction) -> bool {
        self.functions
            .get(&func.name)
            .is_some_and(|r| r.facts.input_dependent.contains(&inst.id))
    }

    fn loop_containing(&self, func: &Function, block: BlockId) -> Option<&Loop> {
        self.functions.get(&func.name)?.loops.loop_for(block)
    }
}
