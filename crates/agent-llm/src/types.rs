use agent_core::ToolCallDelta;

/// One item of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum LLMChunk {
    Token(String),
    ToolCalls(Vec<ToolCallDelta>),
    Done,
}
