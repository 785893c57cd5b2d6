use ohash_analysis::AnalysisError;
use ohash_core::types::Type;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PassError>;

#[derive(Debug, Error)]
pub enum PassError {
    #[error("configuration: {0}")]
    Config(String),

    #[error("analysis: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("module: {0}")]
    Core(#[from] ohash_core::Error),

    /// A value of a type the hashing scheme has no encoding for.
    #[error("cannot normalize value of type {0} for hashing")]
    UnsupportedType(Type),

    #[error("internal invariant failed: {0}")]
    Invariant(String),
}
