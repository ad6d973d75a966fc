use agent_core::TaskState;
use serde::Deserialize;
use serde_json::Value;

/// An inbound remote protocol event, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    StatusUpdate {
        task_id: String,
        context_id: Option<String>,
        state: TaskState,
        text: Option<String>,
        is_final: bool,
    },
    Message {
        task_id: Option<String>,
        context_id: Option<String>,
        text: String,
    },
    Task {
        task_id: String,
        context_id: Option<String>,
        state: TaskState,
        text: Option<String>,
    },
    Unrecognized(Value),
}

impl RemoteEvent {
    /// Classifies a raw event. Anything that does not parse as one of the
    /// known kinds is `Unrecognized`; classification never fails.
    pub fn classify(value: Value) -> Self {
        match WireEvent::deserialize(&value) {
            Ok(WireEvent::StatusUpdate {
                task_id,
                context_id,
                status,
                is_final,
            }) => RemoteEvent::StatusUpdate {
                task_id,
                context_id,
                state: status.state,
                text: status.message.and_then(|message| parts_text(&message.parts)),
                is_final,
            },
            Ok(WireEvent::Message(message)) => RemoteEvent::Message {
                task_id: message.task_id,
                context_id: message.context_id,
                text: parts_text(&message.parts).unwrap_or_default(),
            },
            Ok(WireEvent::Task {
                id,
                context_id,
                status,
                artifacts,
            }) => {
                let mut sections: Vec<String> = status
                    .message
                    .and_then(|message| parts_text(&message.parts))
                    .into_iter()
                    .collect();
                sections.extend(
                    artifacts
                        .iter()
                        .filter_map(|artifact| parts_text(&artifact.parts)),
                );
                RemoteEvent::Task {
                    task_id: id,
                    context_id,
                    state: status.state,
                    text: (!sections.is_empty()).then(|| sections.join("\n")),
                }
            }
            Err(error) => {
                log::debug!("Unrecognized remote event ({}): {}", error, value);
                RemoteEvent::Unrecognized(value)
            }
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            RemoteEvent::StatusUpdate { task_id, .. } | RemoteEvent::Task { task_id, .. } => {
                Some(task_id)
            }
            RemoteEvent::Message { task_id, .. } => task_id.as_deref(),
            RemoteEvent::Unrecognized(_) => None,
        }
    }

    pub fn context_id(&self) -> Option<&str> {
        match self {
            RemoteEvent::StatusUpdate { context_id, .. }
            | RemoteEvent::Task { context_id, .. }
            | RemoteEvent::Message { context_id, .. } => context_id.as_deref(),
            RemoteEvent::Unrecognized(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum WireEvent {
    #[serde(rename_all = "camelCase")]
    StatusUpdate {
        task_id: String,
        #[serde(default)]
        context_id: Option<String>,
        status: WireStatus,
        #[serde(default, rename = "final")]
        is_final: bool,
    },
    Message(WireMessage),
    #[serde(rename_all = "camelCase")]
    Task {
        id: String,
        #[serde(default)]
        context_id: Option<String>,
        status: WireStatus,
        #[serde(default)]
        artifacts: Vec<WireArtifact>,
    },
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    state: TaskState,
    #[serde(default)]
    message: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    context_id: Option<String>,
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WireArtifact {
    #[serde(default)]
    parts: Vec<Value>,
}

fn parts_text(parts: &[Value]) -> Option<String> {
    let text: String = parts
        .iter()
        .filter(|part| part.get("kind").or_else(|| part.get("type")) == Some(&Value::from("text")))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    (!text.is_empty()).then_some(text)
}
