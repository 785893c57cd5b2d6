//! Hidden accumulator cells and the record of which ones have been folded into.

use ohash_core::config::InstrumentConfig;
use ohash_core::id::GlobalId;
use ohash_core::ir::Module;

use crate::error::{PassError, Result};

/// Fixed-size pool of `i64` globals, addressed by index.
#[derive(Debug, Clone)]
pub struct AccumulatorPool {
    handles: Vec<GlobalId>,
    names: Vec<String>,
}

impl AccumulatorPool {
    /// Append `config.num_hash` zero-initialised external globals to `module`.
    pub fn create(module: &mut Module, config: &InstrumentConfig) -> Result<Self> {
        if config.num_hash == 0 {
            return Err(PassError::Config("num-hash must be at least 1".into()));
        }
        let mut handles = Vec::with_capacity(config.num_hash);
        let mut names = Vec::with_capacity(config.num_hash);
        for i in 0..config.num_hash {
            let name = config.accumulator_name(i);
            handles.push(module.add_i64_global(name.clone())?);
            names.push(name);
        }
        Ok(Self { handles, names })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn handle(&self, index: usize) -> Result<GlobalId> {
        self.handles.get(index).copied().ok_or_else(|| {
            PassError::Invariant(format!(
                "accumulator index {index} outside pool of {}",
                self.handles.len()
            ))
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Accumulator indices in the order folds were emitted.
#[derive(Debug, Clone, Default)]
pub struct HashUsageRecord {
    used: Vec<usize>,
}

impl HashUsageRecord {
    pub fn push(&mut self, index: usize) {
        self.used.push(index);
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn last(&self) -> Option<usize> {
        self.used.last().copied()
    }

    pub fn get(&self, pos: usize) -> Option<usize> {
        self.used.get(pos).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_creates_named_globals() {
        let mut m = Module::new("m");
        let cfg = InstrumentConfig {
            num_hash: 3,
            ..Default::default()
        };
        let pool = AccumulatorPool::create(&mut m, &cfg).unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(m.globals.len(), 3);
        assert_eq!(m.globals[2].name, "__oh_hash_2");
        assert_eq!(pool.handle(2).unwrap(), m.globals[2].id);
        assert!(pool.handle(3).is_err());
    }

    #[test]
    fn pool_rejects_name_clash() {
        let mut m = Module::new("m");
        let cfg = InstrumentConfig::default();
        AccumulatorPool::create(&mut m, &cfg).unwrap();
        assert!(matches!(
            AccumulatorPool::create(&mut m, &cfg),
            Err(PassError::Core(_))
        ));
    }
}
