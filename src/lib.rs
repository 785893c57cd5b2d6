#![forbid(unsafe_code)]
//! ohash: oblivious-hashing instrumentation engine.
//!
//! Re-exports the workspace crates:
//! - `ohash_core`: IR, IDs, configuration, digests, run manifests.
//! - `ohash_analysis`: analysis results the pass consumes.
//! - `ohash_pass`: the instrumentation pass and its verifiers.

pub use ohash_analysis;
pub use ohash_core;
pub use ohash_pass;
