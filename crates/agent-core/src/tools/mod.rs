pub mod accumulator;
pub mod error;
pub mod task;
pub mod types;

pub use accumulator::ToolCallAccumulator;
pub use error::ToolError;
pub use task::TaskState;
pub use types::{
    parse_tool_args, FunctionCall, FunctionSchema, ToolCall, ToolCallDelta, ToolDescriptor,
    ToolProtocol, ToolSchema,
};
