#![forbid(unsafe_code)]
//! ohash-core: the program representation the instrumenter rewrites, plus
//! strongly-typed IDs, configuration, digests, and run manifests.
//!
//! No analysis or rewriting logic lives here; see `ohash-analysis` and
//! `ohash-pass`.

pub mod config;
pub mod display;
pub mod error;
pub mod hash;
pub mod id;
pub mod ir;
pub mod manifest;
pub mod prelude;
pub mod types;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{Error, Result};
