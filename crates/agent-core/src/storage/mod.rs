//! Memory collaborators consumed by the engine: the intent catalog, agent
//! prompt fragments and thread history.

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::agent::{Message, Thread};
use crate::intent::Intent;

pub use jsonl::JsonlThreadStore;
pub use memory::InMemoryStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid thread id: {0:?}")]
    InvalidThreadId(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait IntentStore: Send + Sync {
    async fn list_intents(&self) -> Result<Vec<Intent>>;

    async fn get_intent(&self, id: &str) -> Result<Option<Intent>> {
        Ok(self
            .list_intents()
            .await?
            .into_iter()
            .find(|intent| intent.id == id))
    }

    async fn find_intent(&self, name: &str) -> Result<Option<Intent>> {
        Ok(self
            .list_intents()
            .await?
            .into_iter()
            .find(|intent| intent.name.eq_ignore_ascii_case(name)))
    }
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Agent-level prompt fragment, if the agent defines one.
    async fn agent_prompt(&self, agent_id: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn load_thread(&self, thread_id: &str) -> Result<Option<Thread>>;
    async fn save_thread(&self, thread: &Thread) -> Result<()>;

    /// Appends messages to a stored thread.
    async fn append_messages(&self, thread: &Thread, messages: &[Message]) -> Result<()> {
        let mut stored = match self.load_thread(&thread.id).await? {
            Some(stored) => stored,
            None => Thread {
                messages: Vec::new(),
                ..thread.clone()
            },
        };
        for message in messages {
            stored.add_message(message.clone());
        }
        self.save_thread(&stored).await
    }
}
