//! Run manifest for audit: which module went in, which came out, and how.
//!
//! Together with the seed, a manifest is enough to rerun the instrumentation
//! and obtain the same accumulator/log placement.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hash::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub functions_instrumented: u64,
    pub folds: u64,
    pub log_events: u64,
    pub terminators: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentManifest {
    pub id: ManifestId,

    /// Digest of the module before instrumentation.
    pub input_digest: Hash256,

    /// Digest of the instrumented module.
    pub output_digest: Option<Hash256>,

    /// Instrumenter version string for provenance.
    pub engine_version: String,

    pub seed: u64,
    pub num_hash: usize,

    /// Names of the accumulator globals, in pool-index order.
    pub accumulators: Vec<String>,

    pub counters: RunCounters,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl InstrumentManifest {
    pub fn new(input_digest: Hash256, seed: u64, num_hash: usize, started_ms: u64) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            input_digest,
            output_digest: None,
            engine_version: crate::VERSION.to_string(),
            seed,
            num_hash,
            accumulators: vec![],
            counters: RunCounters::default(),
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(
        mut self,
        finished_ms: u64,
        output_digest: Hash256,
        accumulators: Vec<String>,
        counters: RunCounters,
    ) -> Self {
        self.finished_ms = finished_ms;
        self.output_digest = Some(output_digest);
        self.accumulators = accumulators;
        self.counters = counters;
        self
    }
}
