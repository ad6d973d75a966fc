use agent_core::{ToolDescriptor, ToolError, ToolProtocol};
use dashmap::DashSet;
use std::collections::HashSet;
use std::sync::Arc;

use crate::context::ToolContext;
use crate::local::LocalConnector;
use crate::remote::{RemoteAgentConnector, TaskTracker};

/// Every connector configured for one engine, keyed by protocol.
///
/// Invocation dispatches on the descriptor's protocol tag to the connector
/// named in the descriptor. A REMOTE connector that fails discovery or a
/// call is disabled and stays unavailable for the lifetime of the set.
#[derive(Default)]
pub struct ConnectorSet {
    local: Vec<LocalConnector>,
    remote: Vec<RemoteAgentConnector>,
    disabled: DashSet<String>,
}

impl ConnectorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(mut self, connector: LocalConnector) -> Self {
        self.local.push(connector);
        self
    }

    pub fn with_remote(mut self, connector: RemoteAgentConnector) -> Self {
        self.remote.push(connector);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.remote.is_empty()
    }

    /// Collects descriptors from every available connector, LOCAL first.
    /// Tool names are unique in the result; the first registration wins.
    pub async fn gather_tools(&self) -> Vec<ToolDescriptor> {
        let mut tools = Vec::new();

        for connector in &self.local {
            if self.is_disabled(connector.name()) {
                continue;
            }
            match connector.list_tools().await {
                Ok(descriptors) => tools.extend(descriptors),
                Err(error) => log::warn!(
                    "Failed to list tools from local connector '{}': {}",
                    connector.name(),
                    error
                ),
            }
        }

        for connector in &self.remote {
            if self.is_disabled(connector.name()) {
                continue;
            }
            match connector.list_tools().await {
                Ok(descriptors) => tools.extend(descriptors),
                Err(error) => {
                    log::warn!(
                        "Remote agent '{}' is unreachable, disabling it: {}",
                        connector.name(),
                        error
                    );
                    self.disable(connector.name());
                }
            }
        }

        let mut seen = HashSet::new();
        tools.retain(|tool| {
            let first = seen.insert(tool.tool_name.clone());
            if !first {
                log::warn!(
                    "Duplicate tool name '{}' from connector '{}' ignored",
                    tool.tool_name,
                    tool.connector_name
                );
            }
            first
        });

        log::debug!("Gathered {} tools", tools.len());
        tools
    }

    pub async fn invoke(
        &self,
        descriptor: &ToolDescriptor,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        if self.is_disabled(&descriptor.connector_name) {
            return Err(ToolError::Unavailable(format!(
                "Connector '{}' is disabled",
                descriptor.connector_name
            )));
        }

        match descriptor.protocol {
            ToolProtocol::Local => {
                let connector = self
                    .local
                    .iter()
                    .find(|c| c.name() == descriptor.connector_name)
                    .ok_or_else(|| unknown_connector(descriptor))?;
                connector.use_tool(descriptor, args, ctx).await
            }
            ToolProtocol::Remote => {
                let connector = self
                    .remote
                    .iter()
                    .find(|c| c.name() == descriptor.connector_name)
                    .ok_or_else(|| unknown_connector(descriptor))?;

                let result = connector.use_tool(descriptor, args, ctx).await;
                if let Err(error) = &result {
                    if !matches!(error, ToolError::Cancelled(_)) {
                        log::warn!(
                            "[{}] Remote agent '{}' failed, disabling it: {}",
                            ctx.thread_id,
                            connector.name(),
                            error
                        );
                        self.disable(connector.name());
                    }
                }
                result
            }
        }
    }

    /// Requests cancellation of a running REMOTE task. Returns false when no
    /// REMOTE connector is configured.
    pub fn cancel_task(&self, task_id: &str) -> bool {
        let mut trackers: Vec<&Arc<TaskTracker>> = Vec::new();
        for connector in &self.remote {
            if !trackers.iter().any(|t| Arc::ptr_eq(t, connector.tracker())) {
                trackers.push(connector.tracker());
            }
        }
        for tracker in &trackers {
            tracker.cancel(task_id);
        }
        !trackers.is_empty()
    }

    pub fn disable(&self, connector_name: &str) {
        self.disabled.insert(connector_name.to_string());
    }

    pub fn is_disabled(&self, connector_name: &str) -> bool {
        self.disabled.contains(connector_name)
    }

    pub fn is_available(&self, descriptor: &ToolDescriptor) -> bool {
        !self.is_disabled(&descriptor.connector_name)
    }
}

fn unknown_connector(descriptor: &ToolDescriptor) -> ToolError {
    ToolError::NotFound(format!(
        "No {} connector named '{}' for tool '{}'",
        descriptor.protocol, descriptor.connector_name, descriptor.tool_name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{LocalCallResult, LocalToolProvider, LocalToolSpec};
    use crate::remote::{AgentCard, RemoteAgentClient, RemoteEventStream, RemoteMessageRequest};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoServer {
        tools: Vec<&'static str>,
    }

    #[async_trait]
    impl LocalToolProvider for EchoServer {
        async fn list_tools(&self) -> Result<Vec<LocalToolSpec>, ToolError> {
            Ok(self
                .tools
                .iter()
                .map(|name| LocalToolSpec {
                    name: name.to_string(),
                    description: format!("{name} tool"),
                    input_schema: json!({"type": "object"}),
                })
                .collect())
        }

        async fn call_tool(
            &self,
            name: &str,
            args: serde_json::Value,
        ) -> Result<LocalCallResult, ToolError> {
            Ok(LocalCallResult::text(format!("{name}: {args}")))
        }
    }

    struct BrokenServer;

    #[async_trait]
    impl LocalToolProvider for BrokenServer {
        async fn list_tools(&self) -> Result<Vec<LocalToolSpec>, ToolError> {
            Err(ToolError::Unavailable("process exited".to_string()))
        }

        async fn call_tool(
            &self,
            _name: &str,
            _args: serde_json::Value,
        ) -> Result<LocalCallResult, ToolError> {
            Err(ToolError::Unavailable("process exited".to_string()))
        }
    }

    struct FlakyAgent {
        card_name: &'static str,
        discover_ok: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteAgentClient for FlakyAgent {
        async fn agent_card(&self) -> Result<AgentCard, ToolError> {
            if !self.discover_ok {
                return Err(ToolError::Unavailable("connection refused".to_string()));
            }
            Ok(AgentCard {
                name: self.card_name.to_string(),
                description: "remote".to_string(),
                skills: Vec::new(),
            })
        }

        async fn send_message(
            &self,
            _request: RemoteMessageRequest,
        ) -> Result<RemoteEventStream, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ToolError::Execution("agent crashed".to_string()))
        }

        async fn cancel_task(&self, _task_id: &str) -> Result<(), ToolError> {
            Ok(())
        }
    }

    fn remote(name: &str, card_name: &'static str, discover_ok: bool) -> RemoteAgentConnector {
        RemoteAgentConnector::new(
            name,
            Arc::new(FlakyAgent {
                card_name,
                discover_ok,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(TaskTracker::in_memory()),
        )
    }

    #[tokio::test]
    async fn gather_tools_lists_local_before_remote_and_skips_failures() {
        let set = ConnectorSet::new()
            .with_local(LocalConnector::new(
                "weather",
                Arc::new(EchoServer { tools: vec!["get"] }),
            ))
            .with_local(LocalConnector::new("broken", Arc::new(BrokenServer)))
            .with_remote(remote("notes", "notes_agent", true))
            .with_remote(remote("offline", "offline_agent", false));

        let tools = set.gather_tools().await;
        let names: Vec<_> = tools.iter().map(|t| t.tool_name.as_str()).collect();

        assert_eq!(names, vec!["weather_get", "notes_agent"]);
        assert!(set.is_disabled("offline"));
        assert!(!set.is_disabled("broken"));
    }

    #[tokio::test]
    async fn duplicate_tool_names_keep_first_registration() {
        let set = ConnectorSet::new()
            .with_remote(remote("first", "shared", true))
            .with_remote(remote("second", "shared", true));

        let tools = set.gather_tools().await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].connector_name, "first");
    }

    #[tokio::test]
    async fn invoke_dispatches_local_calls_by_protocol() {
        let set = ConnectorSet::new().with_local(LocalConnector::new(
            "weather",
            Arc::new(EchoServer { tools: vec!["get"] }),
        ));
        let descriptor = set.gather_tools().await.remove(0);

        let result = set
            .invoke(&descriptor, json!({"city": "Oslo"}), &ToolContext::new("t", "c"))
            .await
            .unwrap();

        assert_eq!(result, r#"get: {"city":"Oslo"}"#);
    }

    #[tokio::test]
    async fn failed_remote_call_disables_connector() {
        let set = ConnectorSet::new().with_remote(remote("notes", "notes_agent", true));
        let descriptor = set.gather_tools().await.remove(0);
        let ctx = ToolContext::new("t", "c");

        let first = set.invoke(&descriptor, json!({"query": "hi"}), &ctx).await;
        assert_eq!(first, Err(ToolError::Execution("agent crashed".to_string())));
        assert!(!set.is_available(&descriptor));

        let second = set.invoke(&descriptor, json!({"query": "hi"}), &ctx).await;
        assert!(matches!(second, Err(ToolError::Unavailable(_))));
        assert!(set.gather_tools().await.is_empty());
    }

    #[test]
    fn cancel_task_marks_task_on_shared_tracker() {
        let tracker = Arc::new(TaskTracker::in_memory());
        let connector = |name: &str| {
            RemoteAgentConnector::new(
                name,
                Arc::new(FlakyAgent {
                    card_name: "agent",
                    discover_ok: true,
                    calls: AtomicUsize::new(0),
                }),
                tracker.clone(),
            )
        };
        let set = ConnectorSet::new()
            .with_remote(connector("a"))
            .with_remote(connector("b"));

        assert!(set.cancel_task("task-9"));
        assert!(tracker.is_canceled("task-9"));
        assert!(!ConnectorSet::new().cancel_task("task-9"));
    }

    #[tokio::test]
    async fn unknown_connector_is_not_found() {
        let set = ConnectorSet::new();
        let descriptor = ToolDescriptor {
            tool_name: "ghost_tool".to_string(),
            protocol: ToolProtocol::Local,
            connector_name: "ghost".to_string(),
            description: String::new(),
            input_schema: json!({}),
        };

        let error = set
            .invoke(&descriptor, json!({}), &ToolContext::new("t", "c"))
            .await
            .unwrap_err();
        assert!(matches!(error, ToolError::NotFound(_)));
    }
}
