use agent_core::{AgentEvent, TaskState, ToolDescriptor, ToolError, ToolProtocol};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

use super::events::RemoteEvent;
use super::tracker::TaskTracker;
use crate::context::ToolContext;

/// Self-description published by a remote agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCard {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Outbound message for a remote agent, carrying the thread's current
/// task/context ids so the remote conversation continues where it left off.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessageRequest {
    pub message_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

pub type RemoteEventStream =
    Pin<Box<dyn Stream<Item = Result<serde_json::Value, ToolError>> + Send>>;

/// Wire client for one remote agent.
#[async_trait]
pub trait RemoteAgentClient: Send + Sync {
    async fn agent_card(&self) -> Result<AgentCard, ToolError>;
    async fn send_message(
        &self,
        request: RemoteMessageRequest,
    ) -> Result<RemoteEventStream, ToolError>;
    async fn cancel_task(&self, task_id: &str) -> Result<(), ToolError>;
}

pub struct RemoteAgentConnector {
    name: String,
    client: Arc<dyn RemoteAgentClient>,
    tracker: Arc<TaskTracker>,
    card: RwLock<Option<AgentCard>>,
}

impl RemoteAgentConnector {
    pub fn new(
        name: impl Into<String>,
        client: Arc<dyn RemoteAgentClient>,
        tracker: Arc<TaskTracker>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            tracker,
            card: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracker(&self) -> &Arc<TaskTracker> {
        &self.tracker
    }

    async fn agent_card(&self) -> Result<AgentCard, ToolError> {
        if let Some(card) = self.card.read().clone() {
            return Ok(card);
        }

        let card = self.client.agent_card().await?;
        log::info!(
            "Discovered remote agent '{}' via connector '{}' ({} skills)",
            card.name,
            self.name,
            card.skills.len()
        );
        *self.card.write() = Some(card.clone());
        Ok(card)
    }

    /// One descriptor per remote agent.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let card = self.agent_card().await?;

        let mut description = card.description.clone();
        if !card.skills.is_empty() {
            description.push_str("\nSkills:");
            for skill in &card.skills {
                description.push_str(&format!("\n- {}: {}", skill.name, skill.description));
            }
        }

        let tool_name = match sanitize_tool_name(&card.name) {
            name if name.is_empty() => sanitize_tool_name(&self.name),
            name => name,
        };

        Ok(vec![ToolDescriptor {
            tool_name,
            protocol: ToolProtocol::Remote,
            connector_name: self.name.clone(),
            description,
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The request to send to the agent"
                    }
                },
                "required": ["query"]
            }),
        }])
    }

    /// Sends the query to the remote agent and collects its text reply,
    /// forwarding task progress as `task_status` events.
    pub async fn use_tool(
        &self,
        descriptor: &ToolDescriptor,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let text = match args.get("query").and_then(serde_json::Value::as_str) {
            Some(query) => query.to_string(),
            None => args.to_string(),
        };

        let session = self.tracker.session(&ctx.thread_id);
        let mut current_task = session.task_id.clone();

        if let Some(task_id) = current_task.as_deref() {
            if self.tracker.is_canceled(task_id) {
                return Err(self.abort(ctx, task_id).await);
            }
        }

        log::debug!(
            "[{}] Sending to remote agent {} (task: {:?}, context: {:?})",
            ctx.thread_id,
            descriptor.tool_name,
            session.task_id,
            session.context_id
        );

        let request = RemoteMessageRequest {
            message_id: uuid::Uuid::new_v4().to_string(),
            text,
            task_id: session.task_id,
            context_id: session.context_id,
        };
        let mut stream = self.client.send_message(request).await?;
        let mut reply = String::new();

        while let Some(item) = stream.next().await {
            let event = RemoteEvent::classify(item?);
            self.tracker.apply(&ctx.thread_id, &event);

            if let Some(task_id) = event.task_id() {
                current_task = Some(task_id.to_string());
            }

            match event {
                RemoteEvent::StatusUpdate {
                    task_id,
                    state,
                    text,
                    ..
                }
                | RemoteEvent::Task {
                    task_id,
                    state,
                    text,
                    ..
                } => {
                    if let Some(text) = text.as_deref() {
                        append_reply(&mut reply, text);
                    }
                    ctx.emit(AgentEvent::TaskStatus {
                        task_id,
                        state,
                        message: text,
                    })
                    .await;
                }
                RemoteEvent::Message { text, .. } => append_reply(&mut reply, &text),
                RemoteEvent::Unrecognized(_) => {}
            }

            if let Some(task_id) = current_task.as_deref() {
                if self.tracker.is_canceled(task_id) {
                    return Err(self.abort(ctx, task_id).await);
                }
            }
        }

        Ok(reply)
    }

    async fn abort(&self, ctx: &ToolContext, task_id: &str) -> ToolError {
        log::info!("[{}] Remote task {} canceled", ctx.thread_id, task_id);

        ctx.emit(AgentEvent::TaskStatus {
            task_id: task_id.to_string(),
            state: TaskState::Canceled,
            message: None,
        })
        .await;

        if let Err(error) = self.client.cancel_task(task_id).await {
            log::warn!(
                "[{}] Remote agent '{}' did not acknowledge cancel of {}: {}",
                ctx.thread_id,
                self.name,
                task_id,
                error
            );
        }

        self.tracker.finish_cancel(&ctx.thread_id, task_id);
        ToolError::Cancelled(task_id.to_string())
    }
}

fn append_reply(reply: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !reply.is_empty() {
        reply.push('\n');
    }
    reply.push_str(text);
}

/// Restricts a name to the characters model tool declarations accept.
pub fn sanitize_tool_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    sanitized.trim_matches('_').to_string()
}
