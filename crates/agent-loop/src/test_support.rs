//! Scripted collaborators shared by the loop, aggregator and engine tests.

use std::collections::VecDeque;
use std::sync::Arc;

use agent_core::tools::{ToolCallDelta, ToolSchema};
use agent_core::{AgentEvent, Message, ToolError};
use agent_llm::provider::Result as LLMResult;
use agent_llm::{Completion, CompletionOptions, LLMChunk, LLMError, LLMProvider, LLMStream};
use agent_tools::{
    AgentCard, AgentSkill, LocalCallResult, LocalConnector, LocalToolProvider, LocalToolSpec,
    RemoteAgentClient, RemoteAgentConnector, RemoteEventStream, RemoteMessageRequest,
    TaskTracker,
};
use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;

pub struct StreamCall {
    pub messages: Vec<Message>,
    pub tool_names: Vec<String>,
    pub options: CompletionOptions,
}

/// Model backend that replays canned streams and completions in order.
#[derive(Default)]
pub struct ScriptedLlm {
    streams: Mutex<VecDeque<Vec<LLMChunk>>>,
    repeated: Option<Vec<LLMChunk>>,
    completions: Mutex<VecDeque<LLMResult<String>>>,
    stream_calls: Mutex<Vec<StreamCall>>,
    complete_calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream(self, chunks: Vec<LLMChunk>) -> Self {
        self.streams.lock().push_back(chunks);
        self
    }

    /// Replays `chunks` once the scripted streams run out.
    pub fn repeat(mut self, chunks: Vec<LLMChunk>) -> Self {
        self.repeated = Some(chunks);
        self
    }

    pub fn completion(self, text: &str) -> Self {
        self.completions.lock().push_back(Ok(text.to_string()));
        self
    }

    pub fn failing_completion(self) -> Self {
        self.completions
            .lock()
            .push_back(Err(LLMError::Api("HTTP 503: unavailable".to_string())));
        self
    }

    pub fn stream_calls(&self) -> parking_lot::MutexGuard<'_, Vec<StreamCall>> {
        self.stream_calls.lock()
    }

    pub fn complete_calls(&self) -> parking_lot::MutexGuard<'_, Vec<Vec<Message>>> {
        self.complete_calls.lock()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &CompletionOptions,
    ) -> LLMResult<LLMStream> {
        self.stream_calls.lock().push(StreamCall {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|t| t.function.name.clone()).collect(),
            options: options.clone(),
        });

        let chunks = self
            .streams
            .lock()
            .pop_front()
            .or_else(|| self.repeated.clone())
            .ok_or_else(|| LLMError::Api("no scripted stream left".to_string()))?;

        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> LLMResult<Completion> {
        self.complete_calls.lock().push(messages.to_vec());

        let content = self
            .completions
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::Api("no scripted completion left".to_string())))?;

        Ok(Completion {
            content: Some(content),
            tool_calls: Vec::new(),
        })
    }
}

pub fn text_chunk(text: &str) -> LLMChunk {
    LLMChunk::Token(text.to_string())
}

pub fn tool_call_chunk(index: usize, id: &str, name: &str, arguments: &str) -> LLMChunk {
    LLMChunk::ToolCalls(vec![ToolCallDelta::new(index)
        .with_id(id)
        .with_name(name)
        .with_arguments(arguments)])
}

pub async fn collect_events(rx: &mut mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

struct WeatherServer;

#[async_trait]
impl LocalToolProvider for WeatherServer {
    async fn list_tools(&self) -> Result<Vec<LocalToolSpec>, ToolError> {
        Ok(vec![LocalToolSpec {
            name: "get".to_string(),
            description: "Current weather for a city".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
        }])
    }

    async fn call_tool(
        &self,
        _name: &str,
        args: serde_json::Value,
    ) -> Result<LocalCallResult, ToolError> {
        match args["city"].as_str() {
            Some(city) => Ok(LocalCallResult::text(format!("Sunny in {city}"))),
            None => Err(ToolError::Execution("city is required".to_string())),
        }
    }
}

/// LOCAL connector exposing `weatherApi_get`.
pub fn weather_connector() -> LocalConnector {
    LocalConnector::new("weatherApi", Arc::new(WeatherServer))
}

struct NotesAgent {
    events: Vec<serde_json::Value>,
}

#[async_trait]
impl RemoteAgentClient for NotesAgent {
    async fn agent_card(&self) -> Result<AgentCard, ToolError> {
        Ok(AgentCard {
            name: "notes_agent".to_string(),
            description: "Reads and summarizes the user's notes".to_string(),
            skills: vec![AgentSkill {
                id: "summarize".to_string(),
                name: "summarize".to_string(),
                description: "Summarize notes".to_string(),
            }],
        })
    }

    async fn send_message(
        &self,
        _request: RemoteMessageRequest,
    ) -> Result<RemoteEventStream, ToolError> {
        Ok(Box::pin(stream::iter(self.events.clone().into_iter().map(Ok))))
    }

    async fn cancel_task(&self, _task_id: &str) -> Result<(), ToolError> {
        Ok(())
    }
}

/// A working update followed by a final completed update for `task-1`.
pub fn notes_events() -> Vec<serde_json::Value> {
    vec![
        json!({
            "kind": "status-update",
            "taskId": "task-1",
            "contextId": "ctx-1",
            "status": {"state": "working"},
            "final": false
        }),
        json!({
            "kind": "status-update",
            "taskId": "task-1",
            "contextId": "ctx-1",
            "status": {
                "state": "completed",
                "message": {"parts": [{"kind": "text", "text": "You have 3 notes about the trip."}]}
            },
            "final": true
        }),
    ]
}

/// REMOTE connector exposing `notes_agent`.
pub fn notes_connector(
    tracker: Arc<TaskTracker>,
    events: Vec<serde_json::Value>,
) -> RemoteAgentConnector {
    RemoteAgentConnector::new("notes", Arc::new(NotesAgent { events }), tracker)
}
