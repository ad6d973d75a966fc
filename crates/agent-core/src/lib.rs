pub mod agent;
pub mod intent;
pub mod storage;
pub mod tools;

pub use agent::events::AgentEvent;
pub use agent::types::{Message, Role, Thread};
pub use agent::AgentError;
pub use intent::{FulfillmentResult, Intent, IntentTriggerResult, TriggeredIntent};
pub use storage::{
    AgentStore, InMemoryStore, IntentStore, JsonlThreadStore, StorageError, ThreadStore,
};
pub use tools::{
    parse_tool_args, FunctionCall, FunctionSchema, TaskState, ToolCall, ToolCallAccumulator,
    ToolCallDelta, ToolDescriptor, ToolError, ToolProtocol, ToolSchema,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
