use ohash_core::id::{BlockId, InstId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no analysis results for function '{0}'")]
    MissingFunction(String),

    #[error("facts for '{function}' name unknown block {block}")]
    UnknownBlock { function: String, block: BlockId },

    #[error("facts for '{function}' name unknown instruction {inst}")]
    UnknownInstruction { function: String, inst: InstId },

    #[error("loop in '{function}' headed by {header} does not contain its header")]
    MalformedLoop { function: String, header: BlockId },

    #[error("failed to parse analysis facts: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for AnalysisError {
    fn from(e: serde_json::Error) -> Self {
        AnalysisError::Parse(e.to_string())
    }
}

impl From<serde_yaml::Error> for AnalysisError {
    fn from(e: serde_yaml::Error) -> Self {
        AnalysisError::Parse(e.to_string())
    }
}
