use crate::tools::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "generate_id", skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Inference-only scratch message; never part of the persisted thread.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub thinking: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            thinking: false,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn thinking(role: Role, content: impl Into<String>) -> Self {
        Self {
            thinking: true,
            ..Self::new(role, content)
        }
    }
}

/// A conversation owned by the caller for the duration of one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub user_id: String,
    #[serde(default = "default_thread_type")]
    pub thread_type: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_thread_type() -> String {
    "chat".to_string()
}

impl Thread {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            thread_type: default_thread_type(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a message, keeping timestamps non-decreasing.
    pub fn add_message(&mut self, mut message: Message) {
        if let Some(last) = self.messages.last() {
            if message.created_at < last.created_at {
                log::warn!(
                    "[{}] Message {} predates the previous message, clamping its timestamp",
                    self.id,
                    message.id
                );
                message.created_at = last.created_at;
            }
        }
        self.updated_at = message.created_at.max(Utc::now());
        self.messages.push(message);
    }

    /// Messages that belong to the persisted view of the thread.
    pub fn history(&self) -> impl DoubleEndedIterator<Item = &Message> {
        self.messages.iter().filter(|message| !message.thinking)
    }

    /// Serializes the persisted history as `role: content` lines.
    pub fn transcript(&self) -> String {
        self.history()
            .filter(|message| matches!(message.role, Role::User | Role::Assistant))
            .map(|message| format!("{}: {}", message.role.as_str(), message.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.history()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }
}
