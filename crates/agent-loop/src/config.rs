use serde::{Deserialize, Serialize};

/// Engine settings, loadable from the CLI's YAML settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on model rounds within one fulfillment call.
    pub max_tool_rounds: usize,
    /// Decompose queries into several subqueries instead of picking one intent.
    pub multi_intent: bool,
    /// Agent whose prompt fragment is added to every fulfillment.
    pub agent_id: Option<String>,
    /// Ask the model whether to aggregate instead of trusting the router.
    pub legacy_aggregation_decision: bool,
    /// Capacity of the per-query event channel.
    pub event_buffer: usize,
    pub temperature: Option<f32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 25,
            multi_intent: true,
            agent_id: None,
            legacy_aggregation_decision: false,
            event_buffer: 100,
            temperature: None,
        }
    }
}
