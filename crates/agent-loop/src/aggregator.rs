use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::{AgentError, AgentEvent, FulfillmentResult, Message};
use agent_llm::{CompletionOptions, LLMProvider};

use crate::prompts::{aggregation_decision_prompt, synthesis_prompt};
use crate::router::extract_json_object;
use crate::stream::handler::consume_llm_stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationMode {
    /// Routing already decided the results must be combined.
    Synthesize,
    /// Ask the model whether the results need combining first.
    Decide,
}

/// Turns per-subquery responses into the final answer text.
pub struct ResultAggregator {
    llm: Arc<dyn LLMProvider>,
    temperature: Option<f32>,
}

impl ResultAggregator {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            llm,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Emits the final answer as `text_chunk` events and returns it.
    pub async fn aggregate(
        &self,
        query: &str,
        results: &[FulfillmentResult],
        mode: AggregationMode,
        event_tx: &mpsc::Sender<AgentEvent>,
        cancel_token: &CancellationToken,
        thread_id: &str,
    ) -> Result<String, AgentError> {
        if results.len() <= 1 {
            let response = results
                .first()
                .map(|result| result.response.clone())
                .unwrap_or_default();
            let _ = event_tx.send(AgentEvent::text(response.clone())).await;
            return Ok(response);
        }

        if mode == AggregationMode::Decide && !self.decide(query, results, thread_id).await {
            let response = results
                .last()
                .map(|result| result.response.clone())
                .unwrap_or_default();
            log::info!("[{}] Passing last response through unaggregated", thread_id);
            let _ = event_tx.send(AgentEvent::text(response.clone())).await;
            return Ok(response);
        }

        log::info!(
            "[{}] Synthesizing {} subquery results",
            thread_id,
            results.len()
        );
        let messages = vec![
            Message::system(synthesis_prompt(query, results)),
            Message::user(query),
        ];
        let options = CompletionOptions {
            temperature: self.temperature,
            ..CompletionOptions::default()
        };
        let stream = self
            .llm
            .chat_stream(&messages, &[], &options)
            .await
            .map_err(|error| AgentError::LLM(error.to_string()))?;
        let output = consume_llm_stream(stream, event_tx, cancel_token, thread_id, true).await?;

        Ok(output.content)
    }

    /// Whether the results need combining. Anything short of an explicit
    /// `false` from the model means aggregate.
    async fn decide(&self, query: &str, results: &[FulfillmentResult], thread_id: &str) -> bool {
        let messages = vec![
            Message::system(aggregation_decision_prompt(query, results)),
            Message::user(query),
        ];

        let answer = match self.llm.complete(&messages, &CompletionOptions::json()).await {
            Ok(completion) => completion.text().to_string(),
            Err(error) => {
                log::warn!("[{}] Aggregation decision failed: {}", thread_id, error);
                return true;
            }
        };

        let decision = extract_json_object(&answer).and_then(|value| {
            let needs = value.get("needsAggregation")?.as_bool()?;
            let reason = value
                .get("reason")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some((needs, reason))
        });

        match decision {
            Some((needs, reason)) => {
                log::debug!(
                    "[{}] Aggregation decision: {} ({})",
                    thread_id,
                    needs,
                    reason
                );
                needs
            }
            None => {
                log::warn!(
                    "[{}] Unreadable aggregation decision, aggregating: {}",
                    thread_id,
                    answer
                );
                true
            }
        }
    }
}
