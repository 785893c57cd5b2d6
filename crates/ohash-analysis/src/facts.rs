//! Serializable analysis results, as produced by the upstream analyses.
//!
//! Example (YAML):
//! ```yaml
//! functions:
//!   main:
//!     input_independent: true
//!     nondeterministic_blocks: [2]
//!     input_dependent: [5, 7]
//!   helper:
//!     input_independent: false
//! ```
//! `loops` may be omitted, in which case they are computed from the CFG.

use std::collections::{BTreeMap, BTreeSet};

use ohash_core::id::{BlockId, InstId};
use ohash_core::ir::Module;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loops::Loop;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionFacts {
    /// False when the function is reachable from non-deterministic context.
    pub input_independent: bool,
    pub nondeterministic_blocks: BTreeSet<BlockId>,
    pub input_dependent: BTreeSet<InstId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loops: Option<Vec<Loop>>,
}

impl Default for FunctionFacts {
    fn default() -> Self {
        Self {
            input_independent: true,
            nondeterministic_blocks: BTreeSet::new(),
            input_dependent: BTreeSet::new(),
            loops: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisFacts {
    pub functions: BTreeMap<String, FunctionFacts>,
}

impl AnalysisFacts {
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Facts declaring every defined function input-independent and
    /// deterministic, with loops computed from the CFG.
    pub fn assume_input_independent(module: &Module) -> Self {
        let functions = module
            .functions
            .iter()
            .filter(|f| !f.is_declaration())
            .map(|f| (f.name.clone(), FunctionFacts::default()))
            .collect();
        Self { functions }
    }

    pub fn insert(&mut self, function: impl Into<String>, facts: FunctionFacts) {
        self.functions.insert(function.into(), facts);
    }

    pub fn function_mut(&mut self, function: &str) -> Option<&mut FunctionFacts> {
        self.functions.get_mut(function)
    }
}
