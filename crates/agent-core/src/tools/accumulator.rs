use std::collections::BTreeMap;

use uuid::Uuid;

use crate::tools::{FunctionCall, ToolCall, ToolCallDelta};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles streamed tool calls. Fragments are keyed by their index in the
/// response, so interleaved fragments of several calls land on the right call.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    parts: BTreeMap<usize, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, delta: ToolCallDelta) {
        let part = self.parts.entry(delta.index).or_default();

        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            part.id = id;
        }
        if let Some(name) = delta.name.filter(|name| !name.is_empty()) {
            part.name = name;
        }
        if let Some(arguments) = delta.arguments {
            part.arguments.push_str(&arguments);
        }
    }

    pub fn extend<I>(&mut self, deltas: I)
    where
        I: IntoIterator<Item = ToolCallDelta>,
    {
        for delta in deltas {
            self.update(delta);
        }
    }

    /// Completed calls in index order. Entries that never received a name are
    /// dropped; calls without a backend id get a generated one.
    pub fn finalize(self) -> Vec<ToolCall> {
        self.parts
            .into_values()
            .filter(|part| !part.name.trim().is_empty())
            .map(|part| ToolCall {
                id: if part.id.is_empty() {
                    format!("call_{}", Uuid::new_v4())
                } else {
                    part.id
                },
                tool_type: "function".to_string(),
                function: FunctionCall {
                    name: part.name,
                    arguments: part.arguments,
                },
            })
            .collect()
    }

}
