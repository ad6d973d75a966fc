use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::agent::Thread;
use crate::intent::Intent;
use crate::storage::{AgentStore, IntentStore, Result, ThreadStore};

/// Process-local store backing all three memory collaborators.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    intents: Arc<RwLock<Vec<Intent>>>,
    agent_prompts: Arc<DashMap<String, String>>,
    threads: Arc<DashMap<String, Thread>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intents(intents: impl IntoIterator<Item = Intent>) -> Self {
        let store = Self::new();
        for intent in intents {
            store.put_intent(intent);
        }
        store
    }

    /// Inserts or replaces an intent by id, keeping catalog order.
    pub fn put_intent(&self, intent: Intent) {
        let mut intents = self.intents.write();
        match intents.iter_mut().find(|existing| existing.id == intent.id) {
            Some(existing) => *existing = intent,
            None => intents.push(intent),
        }
    }

    pub fn set_agent_prompt(&self, agent_id: impl Into<String>, prompt: impl Into<String>) {
        self.agent_prompts.insert(agent_id.into(), prompt.into());
    }
}

#[async_trait]
impl IntentStore for InMemoryStore {
    async fn list_intents(&self) -> Result<Vec<Intent>> {
        Ok(self.intents.read().clone())
    }
}

#[async_trait]
impl AgentStore for InMemoryStore {
    async fn agent_prompt(&self, agent_id: &str) -> Result<Option<String>> {
        Ok(self
            .agent_prompts
            .get(agent_id)
            .map(|prompt| prompt.value().clone()))
    }
}

#[async_trait]
impl ThreadStore for InMemoryStore {
    async fn load_thread(&self, thread_id: &str) -> Result<Option<Thread>> {
        Ok(self.threads.get(thread_id).map(|thread| thread.value().clone()))
    }

    async fn save_thread(&self, thread: &Thread) -> Result<()> {
        self.threads.insert(thread.id.clone(), thread.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn intents_keep_insertion_order_and_resolve_by_name() {
        let store = InMemoryStore::with_intents([
            Intent::new("1", "weather", "Weather lookups"),
            Intent::new("2", "notes", "Note summaries"),
        ]);
        store.put_intent(Intent::new("1", "weather", "Forecasts"));

        let intents = store.list_intents().await.unwrap();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].description, "Forecasts");
        assert_eq!(intents[1].name, "notes");

        let found = store.find_intent("NOTES").await.unwrap();
        assert_eq!(found.map(|intent| intent.id), Some("2".to_string()));
        assert!(store.get_intent("3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn agent_prompt_is_optional() {
        let store = InMemoryStore::new();
        assert!(store.agent_prompt("default").await.unwrap().is_none());

        store.set_agent_prompt("default", "Be brief.");
        assert_eq!(
            store.agent_prompt("default").await.unwrap().as_deref(),
            Some("Be brief.")
        );
    }
}
