#![forbid(unsafe_code)]
//! ohash-pass: oblivious-hashing instrumentation of an IR module.
//!
//! Design:
//! - `policy` decides which values are folded and where; `logging` decides
//!   where audit events go. Both only describe insertions.
//! - `driver` runs the `Idle -> Setup -> Traversing -> Done` state machine,
//!   collects [`worklist::Edit`]s per function in a read-only walk and applies
//!   them afterwards.
//! - All per-run state lives in [`context::InstrumentationContext`]; the
//!   random source is injected so runs can be replayed.
//! - `verify` and `explain` read modules without changing them.

pub mod accumulator;
pub mod builder;
pub mod context;
pub mod driver;
pub mod error;
pub mod explain;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod policy;
pub mod random;
pub mod runtime;
pub mod selector;
pub mod unique_id;
pub mod verify;
pub mod worklist;

pub use driver::{FunctionSkip, ObliviousHashPass, PassReport, PassState};
pub use error::{PassError, Result};
pub use explain::{explain, FunctionExplanation};
pub use metrics::PassStats;
pub use random::{RandomSource, ScriptedRandom, SeededRandom};
pub use runtime::RuntimeSymbols;
pub use unique_id::TERMINATOR_ID;
