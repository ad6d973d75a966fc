use super::*;

#[test]
fn test_thread_creation() {
    let thread = Thread::new("thread-123", "user-1");
    assert_eq!(thread.id, "thread-123");
    assert_eq!(thread.thread_type, "chat");
    assert!(thread.messages.is_empty());
}

#[test]
fn test_message_creation() {
    let msg = Message::user("Hello");
    assert_eq!(msg.content, "Hello");
    assert!(matches!(msg.role, Role::User));
    assert!(!msg.id.is_empty());
    assert!(!msg.thinking);
}

#[test]
fn test_tool_result_message() {
    let msg = Message::tool_result("call-1", "sunny");
    assert_eq!(msg.role, Role::Tool);
    assert_eq!(msg.tool_call_id.as_deref(), Some("call-1"));
}

#[test]
fn test_tool_descriptor_serialization() {
    let descriptor = ToolDescriptor {
        tool_name: "weatherApi_get".to_string(),
        protocol: ToolProtocol::Local,
        connector_name: "weatherApi".to_string(),
        description: "Current weather".to_string(),
        input_schema: serde_json::json!({"type": "object"}),
    };

    let json = serde_json::to_value(&descriptor).unwrap();
    assert_eq!(json["toolName"], "weatherApi_get");
    assert_eq!(json["protocol"], "local");
    assert_eq!(json["connectorName"], "weatherApi");
}

#[test]
fn test_tool_call_wire_shape() {
    let tool_call = ToolCall {
        id: "call-1".to_string(),
        tool_type: "function".to_string(),
        function: FunctionCall {
            name: "test_tool".to_string(),
            arguments: r#"{"key": "value"}"#.to_string(),
        },
    };

    let json = serde_json::to_value(&tool_call).unwrap();
    assert_eq!(json["type"], "function");
    assert_eq!(json["function"]["name"], "test_tool");
}

#[test]
fn test_agent_error_cancel_detection() {
    assert!(AgentError::Cancelled.is_cancelled());
    assert!(AgentError::Tool(ToolError::Cancelled("task-1".to_string())).is_cancelled());
    assert!(!AgentError::ToolLoopExceeded { max_rounds: 3 }.is_cancelled());
}
