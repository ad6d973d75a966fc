use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The connector cannot be reached at all.
    #[error("Connector unavailable: {0}")]
    Unavailable(String),

    #[error("Task cancelled: {0}")]
    Cancelled(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;
