//! Per-run state threaded through the driver and the policies.

use ohash_core::id::InstIdAllocator;

use crate::metrics::PassStats;
use crate::random::RandomSource;
use crate::runtime::RuntimeSymbols;
use crate::selector::HashSiteSelector;
use crate::unique_id::UniqueIdGenerator;

/// Everything one instrumentation run mutates besides the module itself.
///
/// Owned by a single `run` invocation; nothing here outlives it.
pub struct InstrumentationContext<'r> {
    pub selector: HashSiteSelector,
    pub symbols: RuntimeSymbols,
    pub log_ids: UniqueIdGenerator,
    pub inst_ids: InstIdAllocator,
    pub rng: &'r mut dyn RandomSource,
    pub stats: PassStats,
}

impl<'r> InstrumentationContext<'r> {
    pub fn new(
        selector: HashSiteSelector,
        symbols: RuntimeSymbols,
        inst_ids: InstIdAllocator,
        rng: &'r mut dyn RandomSource,
    ) -> Self {
        let mut log_ids = UniqueIdGenerator::new();
        log_ids.reset();
        Self {
            selector,
            symbols,
            log_ids,
            inst_ids,
            rng,
            stats: PassStats::default(),
        }
    }
}
