//! Intent catalog entries and the routing/fulfillment units built from them.

use serde::{Deserialize, Serialize};

/// A named capability loaded from the intent catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Prompt fragment appended to the system prompt when this intent runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Preferred model for fulfilling this intent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Intent {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            prompt: None,
            model: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// One unit of work for the fulfillment loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredIntent {
    pub subquery: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_plan: Option<String>,
}

impl TriggeredIntent {
    pub fn passthrough(query: impl Into<String>) -> Self {
        Self {
            subquery: query.into(),
            intent: None,
            action_plan: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentTriggerResult {
    intents: Vec<TriggeredIntent>,
    needs_aggregation: bool,
}

impl IntentTriggerResult {
    /// Builds a routing result; an empty list collapses to a pass-through of
    /// `query`, and a single entry never needs aggregation.
    pub fn new(query: &str, intents: Vec<TriggeredIntent>, needs_aggregation: bool) -> Self {
        if intents.is_empty() {
            return Self::passthrough(query);
        }
        let needs_aggregation = needs_aggregation && intents.len() > 1;
        Self {
            intents,
            needs_aggregation,
        }
    }

    pub fn passthrough(query: impl Into<String>) -> Self {
        Self {
            intents: vec![TriggeredIntent::passthrough(query)],
            needs_aggregation: false,
        }
    }

    pub fn intents(&self) -> &[TriggeredIntent] {
        &self.intents
    }

    pub fn into_intents(self) -> Vec<TriggeredIntent> {
        self.intents
    }

    pub fn needs_aggregation(&self) -> bool {
        self.needs_aggregation
    }
}

/// Final text produced for one triggered intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FulfillmentResult {
    pub subquery: String,
    pub response: String,
}
