//! Run counters and their tracing summary.

use ohash_core::manifest::RunCounters;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub functions_visited: u64,
    pub functions_instrumented: u64,
    pub functions_skipped_declaration: u64,
    pub functions_skipped_nondeterministic: u64,
    /// Definitions of the runtime's own hash/log functions.
    pub functions_skipped_runtime: u64,
    pub blocks_skipped: u64,
    pub instructions_visited: u64,
    pub input_dependent_skipped: u64,
    pub folds: u64,
    /// Values the normalizer refused (pointers).
    pub declined: u64,
    pub log_events: u64,
    pub logs_suppressed_in_loop: u64,
    pub terminators: u64,
    pub atomics_seen: u64,
}

impl PassStats {
    pub fn emit_summary(&self, module: &str) {
        tracing::info!(
            module,
            functions = self.functions_visited,
            instrumented = self.functions_instrumented,
            folds = self.folds,
            declined = self.declined,
            log_events = self.log_events,
            terminators = self.terminators,
            "instrumentation summary"
        );
        tracing::debug!(
            module,
            skipped_declaration = self.functions_skipped_declaration,
            skipped_nondeterministic = self.functions_skipped_nondeterministic,
            skipped_runtime = self.functions_skipped_runtime,
            blocks_skipped = self.blocks_skipped,
            input_dependent = self.input_dependent_skipped,
            logs_suppressed_in_loop = self.logs_suppressed_in_loop,
            atomics = self.atomics_seen,
            "skip breakdown"
        );
    }
}

impl From<&PassStats> for RunCounters {
    fn from(s: &PassStats) -> Self {
        RunCounters {
            functions_instrumented: s.functions_instrumented,
            folds: s.folds,
            log_events: s.log_events,
            terminators: s.terminators,
        }
    }
}
