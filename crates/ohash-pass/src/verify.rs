//! Post-hoc checks over an instrumented module.
//!
//! These read the module only. They are used by the CLI's `--verify` flag and
//! by the integration tests.

use std::collections::{HashMap, HashSet};

use ohash_core::id::{GlobalId, InstId};
use ohash_core::ir::{Callee, ConstValue, Function, InstKind, Instruction, Module, Operand};
use serde::Serialize;
use thiserror::Error;

use crate::runtime::RuntimeSymbols;
use crate::unique_id::TERMINATOR_ID;

#[derive(Debug, Error, PartialEq)]
pub enum VerifyError {
    #[error("function '{0}' is missing from the instrumented module")]
    MissingFunction(String),

    #[error("function '{0}' was added with a body")]
    FunctionAdded(String),

    #[error("function '{0}' changed signature or block layout")]
    LayoutChanged(String),

    #[error("{inst} in '{function}' was altered or moved")]
    InstructionChanged { function: String, inst: InstId },

    #[error("{inst} in '{function}' is not instrumentation")]
    ForeignInstruction { function: String, inst: InstId },

    #[error("global '{0}' was removed or altered")]
    GlobalChanged(String),

    #[error("log event ids are not strictly increasing at {id} (previous {previous})")]
    NonMonotonicId { id: u32, previous: u32 },

    #[error("log event {id} in '{function}' has a malformed handle")]
    MalformedLogEvent { function: String, id: u32 },
}

/// One `log(id, handle)` call, in layout order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    pub function: String,
    pub id: u32,
    /// `None` for the session terminator.
    pub handle: Option<GlobalId>,
}

impl LogEvent {
    pub fn is_terminator(&self) -> bool {
        self.id == TERMINATOR_ID
    }
}

/// One combiner call, with its folded value traced back to the original
/// operand it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldSite {
    pub function: String,
    pub combiner: String,
    pub accumulator: GlobalId,
    pub source: Operand,
}

/// Removing every inserted instruction from `instrumented` must give back
/// the functions of `original`.
///
/// Inserted instructions are those whose ids the original module never used;
/// they may only be casts, binary arithmetic, or calls into the runtime.
/// Accumulator globals and runtime declarations may be added, nothing else.
pub fn check_non_interference(
    original: &Module,
    instrumented: &Module,
    symbols: &RuntimeSymbols,
) -> Result<(), VerifyError> {
    for g in &original.globals {
        if instrumented.global(g.id) != Some(g) {
            return Err(VerifyError::GlobalChanged(g.name.clone()));
        }
    }
    for f in &instrumented.functions {
        if original.function(&f.name).is_none() && !f.is_declaration() {
            return Err(VerifyError::FunctionAdded(f.name.clone()));
        }
    }

    for orig in &original.functions {
        let inst = instrumented
            .function(&orig.name)
            .ok_or_else(|| VerifyError::MissingFunction(orig.name.clone()))?;
        compare_function(orig, inst, symbols)?;
    }
    Ok(())
}

fn compare_function(
    orig: &Function,
    inst: &Function,
    symbols: &RuntimeSymbols,
) -> Result<(), VerifyError> {
    let layout = |f: &Function| {
        f.blocks
            .iter()
            .map(|b| (b.id, b.label.clone()))
            .collect::<Vec<_>>()
    };
    if orig.params != inst.params || orig.ret != inst.ret || layout(orig) != layout(inst) {
        return Err(VerifyError::LayoutChanged(orig.name.clone()));
    }

    let known: HashSet<InstId> = orig.instructions().map(|i| i.id).collect();
    for (ob, ib) in orig.blocks.iter().zip(&inst.blocks) {
        let mut kept = Vec::with_capacity(ob.insts.len());
        for i in &ib.insts {
            if known.contains(&i.id) {
                kept.push(i);
            } else if !is_instrumentation(i, symbols) {
                return Err(VerifyError::ForeignInstruction {
                    function: orig.name.clone(),
                    inst: i.id,
                });
            }
        }
        if let Some((o, _)) = ob.insts.iter().zip(&kept).find(|(o, k)| o != *k) {
            return Err(VerifyError::InstructionChanged {
                function: orig.name.clone(),
                inst: o.id,
            });
        }
        if kept.len() != ob.insts.len() {
            return Err(VerifyError::LayoutChanged(orig.name.clone()));
        }
    }
    Ok(())
}

fn is_instrumentation(i: &Instruction, symbols: &RuntimeSymbols) -> bool {
    match &i.kind {
        InstKind::Cast { .. } | InstKind::Binary { .. } => true,
        InstKind::Call { .. } => i
            .called_function()
            .is_some_and(|n| symbols.is_combiner(n) || symbols.is_logger(n)),
        _ => false,
    }
}

/// Every call to `log_fn`, in function then layout order.
pub fn log_events(module: &Module, log_fn: &str) -> Vec<LogEvent> {
    let mut out = Vec::new();
    for f in &module.functions {
        for i in f.instructions() {
            let InstKind::Call {
                callee: Callee::Direct(name),
                args,
            } = &i.kind
            else {
                continue;
            };
            if name != log_fn {
                continue;
            }
            let id = match args.first() {
                Some(Operand::Const(c)) => match c.value {
                    ConstValue::Int(v) => v as u32,
                    ConstValue::Float(_) => continue,
                },
                _ => continue,
            };
            let handle = match args.get(1) {
                Some(Operand::Global(g)) => Some(*g),
                _ => None,
            };
            out.push(LogEvent {
                function: f.name.clone(),
                id,
                handle,
            });
        }
    }
    out
}

/// Ids of non-terminator events must start above [`TERMINATOR_ID`] and
/// strictly increase. Terminators must carry a null handle, others a global.
pub fn check_monotonic_ids(events: &[LogEvent]) -> Result<(), VerifyError> {
    let mut previous = TERMINATOR_ID;
    for e in events {
        if e.is_terminator() != e.handle.is_none() {
            return Err(VerifyError::MalformedLogEvent {
                function: e.function.clone(),
                id: e.id,
            });
        }
        if e.is_terminator() {
            continue;
        }
        if e.id <= previous {
            return Err(VerifyError::NonMonotonicId {
                id: e.id,
                previous,
            });
        }
        previous = e.id;
    }
    Ok(())
}

/// Combiner calls of `instrumented`, each traced through the inserted
/// casts and arithmetic back to an operand of `original`.
pub fn fold_sites(original: &Module, instrumented: &Module, symbols: &RuntimeSymbols) -> Vec<FoldSite> {
    let known: HashSet<InstId> = original
        .functions
        .iter()
        .flat_map(|f| f.instructions())
        .map(|i| i.id)
        .collect();

    let mut out = Vec::new();
    for f in &instrumented.functions {
        let defs: HashMap<InstId, &Instruction> = f.instructions().map(|i| (i.id, i)).collect();
        for i in f.instructions() {
            let InstKind::Call {
                callee: Callee::Direct(name),
                args,
            } = &i.kind
            else {
                continue;
            };
            if !symbols.is_combiner(name) {
                continue;
            }
            let (Some(Operand::Global(acc)), Some(value)) = (args.first(), args.get(1)) else {
                continue;
            };
            out.push(FoldSite {
                function: f.name.clone(),
                combiner: name.clone(),
                accumulator: *acc,
                source: trace_source(value, &defs, &known),
            });
        }
    }
    out
}

fn trace_source(value: &Operand, defs: &HashMap<InstId, &Instruction>, known: &HashSet<InstId>) -> Operand {
    let mut current = value.clone();
    loop {
        let Operand::Inst(id) = &current else {
            return current;
        };
        if known.contains(id) {
            return current;
        }
        let next = match defs.get(id).map(|i| &i.kind) {
            Some(InstKind::Cast { value, .. }) => value.clone(),
            Some(InstKind::Binary { lhs, rhs, .. }) => match (lhs, rhs) {
                (Operand::Const(_), other) | (other, Operand::Const(_)) => other.clone(),
                _ => return current,
            },
            _ => return current,
        };
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u32, handle: Option<u64>) -> LogEvent {
        LogEvent {
            function: "f".into(),
            id,
            handle: handle.map(GlobalId::new),
        }
    }

    #[test]
    fn monotonic_ids_ignore_terminators() {
        let events = vec![event(1, Some(0)), event(0, None), event(2, Some(1))];
        assert!(check_monotonic_ids(&events).is_ok());
    }

    #[test]
    fn repeated_id_is_rejected() {
        let events = vec![event(1, Some(0)), event(1, Some(0))];
        assert_eq!(
            check_monotonic_ids(&events),
            Err(VerifyError::NonMonotonicId { id: 1, previous: 1 })
        );
    }

    #[test]
    fn terminator_with_handle_is_malformed() {
        let events = vec![event(0, Some(0))];
        assert!(matches!(
            check_monotonic_ids(&events),
            Err(VerifyError::MalformedLogEvent { .. })
        ));
    }
}
