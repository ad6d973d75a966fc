use serde::{Deserialize, Serialize};

use crate::tools::{TaskState, ToolProtocol};

/// Events emitted while a query is being fulfilled, in stream order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AgentEvent {
    ThreadId {
        thread_id: String,
        user_id: String,
    },

    TextChunk {
        delta: String,
    },

    ToolStart {
        tool_call_id: String,
        protocol: ToolProtocol,
        tool_name: String,
        tool_args: serde_json::Value,
    },

    ToolOutput {
        tool_call_id: String,
        protocol: ToolProtocol,
        tool_name: String,
        result: String,
    },

    IntentProcess {
        subquery: String,
        action_plan: Option<String>,
    },

    ThinkingProcess {
        title: String,
        description: String,
    },

    /// Progress of a remote agent task, including its cancellation.
    TaskStatus {
        task_id: String,
        state: TaskState,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    Error {
        message: String,
    },
}

impl AgentEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        AgentEvent::TextChunk {
            delta: delta.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        AgentEvent::Error {
            message: message.into(),
        }
    }

    pub fn is_text_chunk(&self) -> bool {
        matches!(self, AgentEvent::TextChunk { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tag_and_camel_case_fields() {
        let event = AgentEvent::ToolStart {
            tool_call_id: "call_1".to_string(),
            protocol: ToolProtocol::Local,
            tool_name: "weatherApi_get".to_string(),
            tool_args: serde_json::json!({"city": "Paris"}),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "tool_start");
        assert_eq!(value["toolCallId"], "call_1");
        assert_eq!(value["protocol"], "local");
        assert_eq!(value["toolArgs"]["city"], "Paris");
    }

    #[test]
    fn task_status_omits_empty_message() {
        let event = AgentEvent::TaskStatus {
            task_id: "task-1".to_string(),
            state: TaskState::Canceled,
            message: None,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "task_status");
        assert_eq!(value["state"], "canceled");
        assert!(value.get("message").is_none());
    }
}
