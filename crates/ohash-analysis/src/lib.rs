#![forbid(unsafe_code)]
//! ohash-analysis: the analysis results the oblivious-hashing pass consumes.
//!
//! Responsibilities:
//! - Define the read-only query surface (`ProgramAnalysis`): input dependence
//!   of instructions, function purity, block non-determinism, loop membership.
//! - Load upstream results (`AnalysisFacts`, JSON/YAML) and check them against
//!   the module they describe.
//! - Compute natural loops from the CFG when results do not list them.
//!
//! Nothing here mutates the module.

pub mod error;
pub mod facts;
pub mod loops;
pub mod provider;
pub mod verify;

pub use error::{AnalysisError, Result};
pub use facts::{AnalysisFacts, FunctionFacts};
pub use loops::{Loop, LoopForest};
pub use provider::{ModuleAnalysis, ProgramAnalysis};
