use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{parse_tool_args, ToolCall, ToolDescriptor, ToolError, ToolProtocol};
use agent_core::{
    AgentError, AgentEvent, AgentStore, FulfillmentResult, Message, Thread, TriggeredIntent,
};
use agent_llm::{CompletionOptions, LLMProvider};
use agent_tools::{ConnectorSet, ToolContext};

use crate::config::EngineConfig;
use crate::prompts::{merge_prompt_sections, TOOL_USAGE_RULES};
use crate::stream::handler::consume_llm_stream;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Runs the tool-calling loop for one subquery.
pub struct Fulfiller {
    llm: Arc<dyn LLMProvider>,
    connectors: Arc<ConnectorSet>,
    agents: Option<Arc<dyn AgentStore>>,
    config: EngineConfig,
}

impl Fulfiller {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        connectors: Arc<ConnectorSet>,
        config: EngineConfig,
    ) -> Self {
        Self {
            llm,
            connectors,
            agents: None,
            config,
        }
    }

    pub fn with_agent_store(mut self, agents: Arc<dyn AgentStore>) -> Self {
        self.agents = Some(agents);
        self
    }

    /// Fulfills `triggered` against `thread`'s history, writing progress into
    /// `event_tx`. Text is forwarded only when `forward_text` is set; it is
    /// always collected into the returned response.
    pub async fn fulfill(
        &self,
        triggered: &TriggeredIntent,
        thread: &Thread,
        forward_text: bool,
        event_tx: &mpsc::Sender<AgentEvent>,
        cancel_token: &CancellationToken,
    ) -> Result<FulfillmentResult> {
        let debug_logger = DebugLogger::new(log::log_enabled!(log::Level::Debug));
        let thread_id = thread.id.as_str();
        let intent_name = triggered.intent.as_ref().map(|intent| intent.name.as_str());

        log::debug!(
            "[{}] Fulfilling subquery (intent: {:?}): {}",
            thread_id,
            intent_name,
            triggered.subquery
        );

        let system_prompt = self.build_system_prompt(triggered, thread_id).await;
        let mut messages =
            self.llm
                .generate_messages(&triggered.subquery, Some(thread), Some(&system_prompt));
        let tools = self.connectors.gather_tools().await;

        debug_logger.log_event(
            thread_id,
            "fulfillment_start",
            serde_json::json!({
                "subquery": triggered.subquery,
                "intent": intent_name,
                "max_rounds": self.config.max_tool_rounds,
                "message_count": messages.len(),
                "tool_count": tools.len(),
            }),
        );

        let options = CompletionOptions {
            model: triggered.intent.as_ref().and_then(|intent| intent.model.clone()),
            temperature: self.config.temperature,
            ..CompletionOptions::default()
        };
        let mut used_remote_tools: HashSet<String> = HashSet::new();

        for round in 0..self.config.max_tool_rounds {
            if cancel_token.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let available: Vec<ToolDescriptor> = tools
                .iter()
                .filter(|tool| {
                    tool.protocol == ToolProtocol::Local
                        || !used_remote_tools.contains(&tool.tool_name)
                })
                .filter(|tool| self.connectors.is_available(tool))
                .cloned()
                .collect();
            let tool_schemas = self.llm.convert_tools_to_functions(&available);

            debug_logger.log_event(
                thread_id,
                "round_start",
                serde_json::json!({
                    "round": round + 1,
                    "message_count": messages.len(),
                    "tools": available.iter().map(|t| t.tool_name.as_str()).collect::<Vec<_>>(),
                }),
            );

            let timer = Timer::new("llm_request");
            let stream = self
                .llm
                .chat_stream(&messages, &tool_schemas, &options)
                .await
                .map_err(|error| AgentError::LLM(error.to_string()))?;
            let stream_output =
                consume_llm_stream(stream, event_tx, cancel_token, thread_id, forward_text)
                    .await?;
            timer.debug(thread_id);

            if stream_output.tool_calls.is_empty() {
                log::debug!(
                    "[{}] Subquery fulfilled after {} round(s)",
                    thread_id,
                    round + 1
                );
                return Ok(FulfillmentResult {
                    subquery: triggered.subquery.clone(),
                    response: stream_output.content,
                });
            }

            messages.push(Message::assistant(
                stream_output.content,
                Some(stream_output.tool_calls.clone()),
            ));

            for tool_call in &stream_output.tool_calls {
                if cancel_token.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }

                let descriptor = available
                    .iter()
                    .find(|tool| tool.tool_name == tool_call.function.name)
                    .ok_or_else(|| {
                        AgentError::InvariantViolation(format!(
                            "Model requested undeclared tool '{}'",
                            tool_call.function.name
                        ))
                    })?;

                if descriptor.protocol == ToolProtocol::Remote
                    && used_remote_tools.contains(&descriptor.tool_name)
                {
                    log::warn!(
                        "[{}] Skipping repeated call to remote tool '{}'",
                        thread_id,
                        descriptor.tool_name
                    );
                    messages.push(Message::tool_result(
                        tool_call.id.clone(),
                        format!(
                            "Error: remote tool '{}' was already used in this turn",
                            descriptor.tool_name
                        ),
                    ));
                    continue;
                }

                let result = self
                    .execute_tool_call(tool_call, descriptor, thread_id, event_tx)
                    .await?;

                if descriptor.protocol == ToolProtocol::Remote {
                    used_remote_tools.insert(descriptor.tool_name.clone());
                }

                let _ = event_tx
                    .send(AgentEvent::ToolOutput {
                        tool_call_id: tool_call.id.clone(),
                        protocol: descriptor.protocol,
                        tool_name: descriptor.tool_name.clone(),
                        result: result.clone(),
                    })
                    .await;

                messages.push(Message::tool_result(tool_call.id.clone(), result));
            }

            debug_logger.log_event(
                thread_id,
                "round_complete",
                serde_json::json!({
                    "round": round + 1,
                    "message_count": messages.len(),
                }),
            );
        }

        log::warn!(
            "[{}] Tool loop exceeded {} rounds",
            thread_id,
            self.config.max_tool_rounds
        );
        Err(AgentError::ToolLoopExceeded {
            max_rounds: self.config.max_tool_rounds,
        })
    }

    /// Emits `tool_start`, invokes the tool and returns the text handed back
    /// to the model. Connector failures become `Error: ...` results; only
    /// cancellation propagates.
    async fn execute_tool_call(
        &self,
        tool_call: &ToolCall,
        descriptor: &ToolDescriptor,
        thread_id: &str,
        event_tx: &mpsc::Sender<AgentEvent>,
    ) -> Result<String> {
        let raw_args = tool_call.function.arguments.as_str();
        let parsed_args = parse_tool_args(raw_args);

        let _ = event_tx
            .send(AgentEvent::ToolStart {
                tool_call_id: tool_call.id.clone(),
                protocol: descriptor.protocol,
                tool_name: descriptor.tool_name.clone(),
                tool_args: parsed_args
                    .clone()
                    .unwrap_or_else(|_| serde_json::json!({})),
            })
            .await;

        let args = parsed_args.unwrap_or_else(|error| {
            log::debug!(
                "[{}] Passing unparsable arguments for {} as query: {}",
                thread_id,
                descriptor.tool_name,
                error
            );
            serde_json::json!({ "query": raw_args })
        });

        let ctx = ToolContext::new(thread_id, tool_call.id.clone()).with_events(event_tx.clone());
        let timer = Timer::new(format!("tool_{}", descriptor.tool_name));

        let result = match self.connectors.invoke(descriptor, args, &ctx).await {
            Ok(result) => result,
            Err(ToolError::Cancelled(task_id)) => {
                log::info!(
                    "[{}] Tool {} stopped: task {} was canceled",
                    thread_id,
                    descriptor.tool_name,
                    task_id
                );
                return Err(ToolError::Cancelled(task_id).into());
            }
            Err(error) => {
                log::warn!(
                    "[{}] Tool {} failed: {}",
                    thread_id,
                    descriptor.tool_name,
                    error
                );
                format!("Error: {error}")
            }
        };

        timer.debug(thread_id);
        Ok(result)
    }

    async fn build_system_prompt(&self, triggered: &TriggeredIntent, thread_id: &str) -> String {
        let agent_prompt = match (self.config.agent_id.as_deref(), self.agents.as_ref()) {
            (Some(agent_id), Some(agents)) => match agents.agent_prompt(agent_id).await {
                Ok(prompt) => prompt,
                Err(error) => {
                    log::warn!(
                        "[{}] Failed to load prompt for agent '{}': {}",
                        thread_id,
                        agent_id,
                        error
                    );
                    None
                }
            },
            _ => None,
        };
        let intent_prompt = triggered
            .intent
            .as_ref()
            .and_then(|intent| intent.prompt.as_deref());

        merge_prompt_sections([
            TOOL_USAGE_RULES,
            agent_prompt.as_deref().unwrap_or_default(),
            intent_prompt.unwrap_or_default(),
        ])
    }
}

struct DebugLogger {
    enabled: bool,
}

impl DebugLogger {
    fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn log_event(&self, thread_id: &str, event_type: &str, details: serde_json::Value) {
        if !self.enabled {
            return;
        }

        log::debug!("[{}] {}: {}", thread_id, event_type, details);
    }
}

struct Timer {
    name: String,
    start: std::time::Instant,
}

impl Timer {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: std::time::Instant::now(),
        }
    }

    fn debug(&self, thread_id: &str) {
        log::debug!(
            "[{}] {} completed in {}ms",
            thread_id,
            self.name,
            self.start.elapsed().as_millis()
        );
    }
}
