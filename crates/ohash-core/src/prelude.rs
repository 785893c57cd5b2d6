//! Convenient re-exports for downstream crates.

pub use crate::config::InstrumentConfig;
pub use crate::error::{Error, Result};
pub use crate::id::{BlockId, GlobalId, InstId, InstIdAllocator};
pub use crate::ir::{
    BinaryOp, Block, Callee, CastOp, ConstValue, Constant, Function, Global, InstKind,
    Instruction, Linkage, Module, Operand, PhiIncoming, Predicate, RmwOp, SwitchCase,
};
pub use crate::manifest::{InstrumentManifest, ManifestId, RunCounters};
pub use crate::types::Type;
