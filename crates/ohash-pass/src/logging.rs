//! Decides where runtime log events go and which accumulator each reports.

use ohash_core::ir::{InstKind, Instruction, Operand, INTRINSIC_PREFIX};

use crate::builder::SiteBuilder;
use crate::context::InstrumentationContext;
use crate::error::Result;
use crate::unique_id::TERMINATOR_ID;
use crate::worklist::{Insertion, Placement};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPolicy;

impl LoggingPolicy {
    /// Possibly emit a log event just before `inst`.
    ///
    /// Nothing is logged until some accumulator has been folded into. A
    /// comparison reports the most recently used accumulator. Anything else
    /// reports a randomly chosen one from the usage history, and is logged
    /// unconditionally only when it calls a non-intrinsic external function;
    /// otherwise a coin decides.
    pub fn maybe_log(
        &self,
        ctx: &mut InstrumentationContext<'_>,
        inst: &Instruction,
    ) -> Result<Option<Insertion>> {
        let usage = ctx.selector.usage();
        let index = if matches!(inst.kind, InstKind::Compare { .. }) {
            usage.last()
        } else if usage.is_empty() {
            None
        } else {
            let picked = usage.get(ctx.rng.below(usage.len()));
            let calls_out = inst.called_function().is_some_and(|name| {
                !name.starts_with(INTRINSIC_PREFIX) && !ctx.symbols.is_combiner(name)
            });
            if calls_out || ctx.rng.below(2) == 1 {
                picked
            } else {
                None
            }
        };
        let Some(index) = index else {
            return Ok(None);
        };

        let handle = ctx.selector.pool().handle(index)?;
        let id = ctx.log_ids.next();
        let mut b = SiteBuilder::new(&mut ctx.inst_ids);
        b.call(
            &ctx.symbols.log,
            vec![Operand::const_int(32, id as i64), Operand::Global(handle)],
        );
        ctx.stats.log_events += 1;
        tracing::trace!(id, accumulator = index, "log event");
        Ok(Some(Insertion {
            placement: Placement::Before,
            insts: b.finish(),
        }))
    }

    /// The `log(0, null)` event that precedes every return of the exit block.
    pub fn end_logging(&self, ctx: &mut InstrumentationContext<'_>) -> Insertion {
        let mut b = SiteBuilder::new(&mut ctx.inst_ids);
        b.call(
            &ctx.symbols.log,
            vec![
                Operand::const_int(32, TERMINATOR_ID as i64),
                Operand::Null,
            ],
        );
        ctx.stats.terminators += 1;
        Insertion {
            placement: Placement::Before,
            insts: b.finish(),
        }
    }
}
