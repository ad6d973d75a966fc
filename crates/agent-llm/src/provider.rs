use crate::types::LLMChunk;
use agent_core::tools::{FunctionSchema, ToolCall, ToolDescriptor, ToolSchema};
use agent_core::{Message, Role, Thread};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMChunk>> + Send>>;

/// Per-request knobs passed to the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    /// Overrides the provider's default model.
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Ask the backend to answer with a JSON object.
    pub json_response: bool,
}

impl CompletionOptions {
    pub fn json() -> Self {
        Self {
            json_response: true,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Result of a single-shot completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Stream chat completion
    ///
    /// # Arguments
    /// * `messages` - Chat messages
    /// * `tools` - Declared tools, already in provider-native form
    /// * `options` - Model override and sampling options
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &CompletionOptions,
    ) -> Result<LLMStream>;

    /// Single-shot completion without tools.
    async fn complete(&self, messages: &[Message], options: &CompletionOptions)
        -> Result<Completion>;

    /// Formats a query plus thread history into model messages.
    ///
    /// Tool and system messages stored on the thread are left out: their
    /// pairing with assistant tool calls does not survive across turns.
    fn generate_messages(
        &self,
        query: &str,
        thread: Option<&Thread>,
        system_prompt: Option<&str>,
    ) -> Vec<Message> {
        let mut messages = Vec::new();

        if let Some(prompt) = system_prompt.map(str::trim).filter(|p| !p.is_empty()) {
            messages.push(Message::system(prompt));
        }

        if let Some(thread) = thread {
            messages.extend(
                thread
                    .messages
                    .iter()
                    .filter(|message| matches!(message.role, Role::User | Role::Assistant))
                    .filter(|message| message.tool_calls.is_none())
                    .cloned(),
            );
        }

        messages.push(Message::user(query));
        messages
    }

    fn convert_tools_to_functions(&self, tools: &[ToolDescriptor]) -> Vec<ToolSchema> {
        tools
            .iter()
            .map(|tool| ToolSchema {
                schema_type: "function".to_string(),
                function: FunctionSchema {
                    name: tool.tool_name.clone(),
                    description: tool.description.clone(),
                    parameters: tool.input_schema.clone(),
                },
            })
            .collect()
    }
}
