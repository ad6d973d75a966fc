use thiserror::Error;

use crate::storage::StorageError;
use crate::tools::ToolError;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The model kept requesting tools past the configured round limit.
    #[error("Tool loop exceeded {max_rounds} rounds")]
    ToolLoopExceeded { max_rounds: usize },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled | AgentError::Tool(ToolError::Cancelled(_)))
    }
}
