use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use agent_core::{
    AgentError, AgentEvent, AgentStore, FulfillmentResult, IntentStore, IntentTriggerResult,
    Message, Role, Thread, ThreadStore,
};
use agent_llm::LLMProvider;
use agent_tools::ConnectorSet;

use crate::aggregator::{AggregationMode, ResultAggregator};
use crate::config::EngineConfig;
use crate::router::IntentRouter;
use crate::runner::{Fulfiller, Result};

/// A running query: its event stream, a token to cancel it, and the task
/// that hands the updated thread back when the stream ends.
pub struct QueryHandle {
    pub events: ReceiverStream<AgentEvent>,
    pub cancel_token: CancellationToken,
    pub join: JoinHandle<Thread>,
}

/// Public entry point: routes a query, fulfills each subquery in order and
/// aggregates the results into one event stream.
pub struct QueryEngine {
    llm: Arc<dyn LLMProvider>,
    connectors: Arc<ConnectorSet>,
    intents: Arc<dyn IntentStore>,
    agents: Option<Arc<dyn AgentStore>>,
    threads: Option<Arc<dyn ThreadStore>>,
    config: EngineConfig,
}

impl QueryEngine {
    pub fn new(
        llm: Arc<dyn LLMProvider>,
        connectors: Arc<ConnectorSet>,
        intents: Arc<dyn IntentStore>,
    ) -> Self {
        Self {
            llm,
            connectors,
            intents,
            agents: None,
            threads: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_agent_store(mut self, agents: Arc<dyn AgentStore>) -> Self {
        self.agents = Some(agents);
        self
    }

    pub fn with_thread_store(mut self, threads: Arc<dyn ThreadStore>) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Requests cancellation of a running REMOTE task.
    pub fn cancel_task(&self, task_id: &str) -> bool {
        self.connectors.cancel_task(task_id)
    }

    /// Spawns the query and returns its event stream.
    pub fn stream_query(self: &Arc<Self>, query: impl Into<String>, thread: Thread) -> QueryHandle {
        let query = query.into();
        let (event_tx, event_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let cancel_token = CancellationToken::new();

        let engine = Arc::clone(self);
        let token = cancel_token.clone();
        let join = tokio::spawn(async move {
            let mut thread = thread;
            if let Err(error) = engine.run_query(&query, &mut thread, &event_tx, &token).await {
                log::debug!("[{}] Query ended early: {}", thread.id, error);
            }
            thread
        });

        QueryHandle {
            events: ReceiverStream::new(event_rx),
            cancel_token,
            join,
        }
    }

    /// Runs one query to completion, writing events into `event_tx`.
    ///
    /// On success the query and the final answer are appended to `thread`.
    /// Fatal errors are reported as an `error` event before returning;
    /// cancellation ends the stream silently.
    pub async fn run_query(
        &self,
        query: &str,
        thread: &mut Thread,
        event_tx: &mpsc::Sender<AgentEvent>,
        cancel_token: &CancellationToken,
    ) -> Result<String> {
        match self.process(query, thread, event_tx, cancel_token).await {
            Ok(answer) => Ok(answer),
            Err(error) if error.is_cancelled() => {
                log::info!("[{}] Query cancelled", thread.id);
                Err(error)
            }
            Err(error) => {
                log::error!("[{}] Query failed: {}", thread.id, error);
                let _ = event_tx.send(AgentEvent::error(error.to_string())).await;
                Err(error)
            }
        }
    }

    async fn process(
        &self,
        query: &str,
        thread: &mut Thread,
        event_tx: &mpsc::Sender<AgentEvent>,
        cancel_token: &CancellationToken,
    ) -> Result<String> {
        let thread_id = thread.id.clone();

        let _ = event_tx
            .send(AgentEvent::ThreadId {
                thread_id: thread_id.clone(),
                user_id: thread.user_id.clone(),
            })
            .await;

        let router = IntentRouter::new(
            self.llm.clone(),
            self.intents.clone(),
            self.config.multi_intent,
        );
        let routing = router.route(query, Some(&*thread)).await;
        let mode = self.aggregation_mode(&routing);
        let needs_aggregation = routing.needs_aggregation();
        let triggered = routing.into_intents();

        if triggered.len() > 1 {
            let _ = event_tx.send(plan_event(&triggered)).await;
        }

        let mut fulfiller =
            Fulfiller::new(self.llm.clone(), self.connectors.clone(), self.config.clone());
        if let Some(agents) = &self.agents {
            fulfiller = fulfiller.with_agent_store(agents.clone());
        }

        // Without a routed aggregation step the last subquery's answer is the
        // final one, unless the legacy decision call is switched on.
        let aggregates = triggered.len() > 1
            && (needs_aggregation || self.config.legacy_aggregation_decision);
        let mut working = thread.clone();
        let mut results: Vec<FulfillmentResult> = Vec::with_capacity(triggered.len());

        for (i, item) in triggered.iter().enumerate() {
            if cancel_token.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let _ = event_tx
                .send(AgentEvent::IntentProcess {
                    subquery: item.subquery.clone(),
                    action_plan: item.action_plan.clone(),
                })
                .await;

            let is_last = i + 1 == triggered.len();
            let result = fulfiller
                .fulfill(item, &working, is_last && !aggregates, event_tx, cancel_token)
                .await?;

            working.add_message(Message::thinking(Role::User, result.subquery.clone()));
            working.add_message(Message::thinking(Role::Assistant, result.response.clone()));
            results.push(result);
        }

        let answer = if aggregates {
            log::debug!(
                "[{}] Aggregating {} results (mode: {:?}, routed aggregation: {})",
                thread_id,
                results.len(),
                mode,
                needs_aggregation
            );
            ResultAggregator::new(self.llm.clone())
                .with_temperature(self.config.temperature)
                .aggregate(query, &results, mode, event_tx, cancel_token, &thread_id)
                .await?
        } else {
            results
                .pop()
                .map(|result| result.response)
                .unwrap_or_default()
        };

        let appended = [
            Message::user(query),
            Message::assistant(answer.clone(), None),
        ];
        for message in appended.iter().cloned() {
            thread.add_message(message);
        }

        if let Some(store) = &self.threads {
            let snapshot: &Thread = thread;
            let start = snapshot.messages.len() - appended.len();
            if let Err(error) = store
                .append_messages(snapshot, &snapshot.messages[start..])
                .await
            {
                log::warn!("[{}] Failed to persist thread: {}", thread_id, error);
            }
        }

        log::info!(
            "[{}] Query completed: {} subquery(s), {} chars",
            thread_id,
            triggered.len(),
            answer.len()
        );
        Ok(answer)
    }

    fn aggregation_mode(&self, routing: &IntentTriggerResult) -> AggregationMode {
        if routing.needs_aggregation() && !self.config.legacy_aggregation_decision {
            AggregationMode::Synthesize
        } else {
            AggregationMode::Decide
        }
    }
}

fn plan_event(triggered: &[agent_core::TriggeredIntent]) -> AgentEvent {
    let description = triggered
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let intent = item
                .intent
                .as_ref()
                .map(|intent| intent.name.as_str())
                .unwrap_or("general");
            format!("{}. [{}] {}", i + 1, intent, item.subquery)
        })
        .collect::<Vec<_>>()
        .join("\n");

    AgentEvent::ThinkingProcess {
        title: format!("Splitting the request into {} steps", triggered.len()),
        description,
    }
}
