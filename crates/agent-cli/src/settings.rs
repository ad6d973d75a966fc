use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use agent_core::{InMemoryStore, Intent};
use agent_loop::EngineConfig;

/// YAML settings file contents.
///
/// ```yaml
/// engine:
///   max_tool_rounds: 10
/// intents:
///   - id: weather
///     name: weather
///     description: Weather forecasts
/// agent_prompts:
///   assistant: You are a concise assistant.
/// threads_dir: ./threads
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub intents: Vec<Intent>,
    pub agent_prompts: HashMap<String, String>,
    pub threads_dir: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid settings file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Intent catalog and agent prompts as an in-memory store.
    pub fn build_store(&self) -> InMemoryStore {
        let store = InMemoryStore::with_intents(self.intents.iter().cloned());
        for (agent_id, prompt) in &self.agent_prompts {
            store.set_agent_prompt(agent_id.clone(), prompt.clone());
        }
        store
    }
}
