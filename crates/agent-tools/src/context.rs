use agent_core::AgentEvent;
use tokio::sync::mpsc;

/// Per-invocation context handed to connectors.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub thread_id: String,
    pub tool_call_id: String,
    events: Option<mpsc::Sender<AgentEvent>>,
}

impl ToolContext {
    pub fn new(thread_id: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            tool_call_id: tool_call_id.into(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: mpsc::Sender<AgentEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Forwards a progress event to the query's stream, if one is attached.
    pub async fn emit(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event).await;
        }
    }
}
