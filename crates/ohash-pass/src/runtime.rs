//! Runtime call targets the instrumentation calls into.

use ohash_core::config::InstrumentConfig;
use ohash_core::ir::Module;
use ohash_core::types::Type;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RuntimeSymbols {
    /// Combining functions, `(ptr, i64) -> void`.
    pub hash: [String; 2],
    /// Audit logger, `(i32, ptr) -> void`.
    pub log: String,
}

impl RuntimeSymbols {
    pub fn from_config(config: &InstrumentConfig) -> Self {
        Self {
            hash: [config.hash_fn_1.clone(), config.hash_fn_2.clone()],
            log: config.log_fn.clone(),
        }
    }

    /// Declare any missing runtime function. Returns how many were added.
    pub fn declare(&self, module: &mut Module) -> Result<usize> {
        let mut added = 0;
        for name in &self.hash {
            if module.get_or_insert_function(name, vec![Type::Ptr, Type::I64], Type::Void)? {
                added += 1;
            }
        }
        if module.get_or_insert_function(&self.log, vec![Type::I32, Type::Ptr], Type::Void)? {
            added += 1;
        }
        Ok(added)
    }

    pub fn is_combiner(&self, name: &str) -> bool {
        self.hash.iter().any(|h| h == name)
    }

    pub fn is_logger(&self, name: &str) -> bool {
        self.log == name
    }
}
