//! Instrumentation configuration that the pass and CLI serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Size of the accumulator pool (`num-hash`). Must be at least 1.
    pub num_hash: usize,

    /// Optional seed; `None` seeds from the wall clock so placements differ per run.
    pub seed: Option<u64>,

    /// The two combining runtime functions, `(ptr, i64) -> void`.
    pub hash_fn_1: String,
    pub hash_fn_2: String,

    /// Audit logger, `(i32, ptr) -> void`.
    pub log_fn: String,

    /// Accumulator globals are named `<prefix><index>`.
    pub accumulator_prefix: String,

    /// Report atomic read-modify-write sites via tracing (never instrumented).
    pub trace_atomics: bool,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            num_hash: 2,
            seed: None,
            hash_fn_1: "hash1".to_string(),
            hash_fn_2: "hash2".to_string(),
            log_fn: "oh_log".to_string(),
            accumulator_prefix: "__oh_hash_".to_string(),
            trace_atomics: false,
        }
    }
}

impl InstrumentConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `OHASH_NUM_HASH`: accumulator pool size
    /// - `OHASH_SEED`: random seed
    /// - `OHASH_HASH_FN_1` / `OHASH_HASH_FN_2`: combining function names
    /// - `OHASH_LOG_FN`: logger function name
    /// - `OHASH_ACCUMULATOR_PREFIX`: accumulator global name prefix
    /// - `OHASH_TRACE_ATOMICS`: `1`/`true` to report atomic RMW sites
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("OHASH_NUM_HASH") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.num_hash = v;
            }
        }

        if let Ok(s) = std::env::var("OHASH_SEED") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.seed = Some(v);
            }
        }

        if let Ok(s) = std::env::var("OHASH_HASH_FN_1") {
            cfg.hash_fn_1 = s;
        }

        if let Ok(s) = std::env::var("OHASH_HASH_FN_2") {
            cfg.hash_fn_2 = s;
        }

        if let Ok(s) = std::env::var("OHASH_LOG_FN") {
            cfg.log_fn = s;
        }

        if let Ok(s) = std::env::var("OHASH_ACCUMULATOR_PREFIX") {
            cfg.accumulator_prefix = s;
        }

        if let Ok(s) = std::env::var("OHASH_TRACE_ATOMICS") {
            cfg.trace_atomics = matches!(s.as_str(), "1" | "true" | "yes");
        }

        cfg
    }

    /// Reject configurations the pass cannot run with. Called before traversal.
    pub fn validate(&self) -> Result<()> {
        if self.num_hash == 0 {
            return Err(Error::Config("num-hash must be at least 1".into()));
        }
        let names = [&self.hash_fn_1, &self.hash_fn_2, &self.log_fn];
        if names.iter().any(|n| n.is_empty()) {
            return Err(Error::Config("runtime function names must not be empty".into()));
        }
        if self.hash_fn_1 == self.hash_fn_2
            || self.hash_fn_1 == self.log_fn
            || self.hash_fn_2 == self.log_fn
        {
            return Err(Error::Config("runtime function names must be distinct".into()));
        }
        if self.accumulator_prefix.is_empty() {
            return Err(Error::Config("accumulator prefix must not be empty".into()));
        }
        Ok(())
    }

    pub fn accumulator_name(&self, index: usize) -> String {
        format!("{}{}", self.accumulator_prefix, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        InstrumentConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_pool_is_rejected() {
        let cfg = InstrumentConfig {
            num_hash: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn clashing_runtime_names_are_rejected() {
        let cfg = InstrumentConfig {
            hash_fn_2: "hash1".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn accumulator_names_use_prefix() {
        let cfg = InstrumentConfig::default();
        assert_eq!(cfg.accumulator_name(3), "__oh_hash_3");
    }
}
