//! Chooses accumulator and combiner for each fold, and emits the call.

use ohash_core::ir::Operand;
use ohash_core::types::Type;
use tracing::trace;

use crate::accumulator::{AccumulatorPool, HashUsageRecord};
use crate::builder::SiteBuilder;
use crate::error::Result;
use crate::normalize::normalize;
use crate::random::RandomSource;
use crate::runtime::RuntimeSymbols;

#[derive(Debug, Clone)]
pub struct HashSiteSelector {
    pool: AccumulatorPool,
    usage: HashUsageRecord,
    combiners: [String; 2],
}

impl HashSiteSelector {
    pub fn new(pool: AccumulatorPool, symbols: &RuntimeSymbols) -> Self {
        Self {
            pool,
            usage: HashUsageRecord::default(),
            combiners: symbols.hash.clone(),
        }
    }

    /// Normalize `value` and fold it into a randomly chosen accumulator.
    ///
    /// Draws the accumulator index first, then the combiner (`1` picks the
    /// first). Returns the index used, or `None` when normalization declined,
    /// in which case nothing is emitted, drawn, or recorded.
    pub fn fold(
        &mut self,
        rng: &mut dyn RandomSource,
        b: &mut SiteBuilder<'_>,
        value: Operand,
        ty: &Type,
    ) -> Result<Option<usize>> {
        let Some(normalized) = normalize(b, value, ty)? else {
            return Ok(None);
        };
        let index = rng.below(self.pool.len());
        let combiner = if rng.below(2) == 1 {
            &self.combiners[0]
        } else {
            &self.combiners[1]
        };
        let handle = self.pool.handle(index)?;
        b.call(combiner, vec![Operand::Global(handle), normalized]);
        self.usage.push(index);
        trace!(index, combiner = %combiner, "fold");
        Ok(Some(index))
    }

    pub fn pool(&self) -> &AccumulatorPool {
        &self.pool
    }

    pub fn usage(&self) -> &HashUsageRecord {
        &self.usage
    }
}
