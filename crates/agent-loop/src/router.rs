use std::sync::Arc;

use serde::Deserialize;

use agent_core::{Intent, IntentStore, IntentTriggerResult, Message, Thread, TriggeredIntent};
use agent_llm::{CompletionOptions, LLMProvider};

use crate::prompts::router_system_prompt;

/// Maps a query onto the intent catalog.
///
/// Routing never fails: a missing catalog, a transport error or an
/// unreadable model answer all degrade to a single pass-through subquery.
pub struct IntentRouter {
    llm: Arc<dyn LLMProvider>,
    intents: Arc<dyn IntentStore>,
    multi_intent: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutingAnswer {
    #[serde(default)]
    intents: Vec<RoutedSubquery>,
    #[serde(default)]
    needs_aggregation: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutedSubquery {
    #[serde(default)]
    subquery: String,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    action_plan: Option<String>,
}

impl IntentRouter {
    pub fn new(llm: Arc<dyn LLMProvider>, intents: Arc<dyn IntentStore>, multi_intent: bool) -> Self {
        Self {
            llm,
            intents,
            multi_intent,
        }
    }

    pub async fn route(&self, query: &str, thread: Option<&Thread>) -> IntentTriggerResult {
        let log_id = thread.map(|t| t.id.as_str()).unwrap_or("-");

        let catalog = match self.intents.list_intents().await {
            Ok(catalog) => catalog,
            Err(error) => {
                log::warn!("[{}] Failed to load intent catalog: {}", log_id, error);
                return IntentTriggerResult::passthrough(query);
            }
        };
        if catalog.is_empty() {
            log::debug!("[{}] Intent catalog is empty, passing query through", log_id);
            return IntentTriggerResult::passthrough(query);
        }

        let transcript = thread.map(Thread::transcript).unwrap_or_default();
        let messages = vec![
            Message::system(router_system_prompt(self.multi_intent, &catalog, &transcript)),
            Message::user(query),
        ];

        let answer = match self.llm.complete(&messages, &CompletionOptions::json()).await {
            Ok(completion) => completion.text().to_string(),
            Err(error) => {
                log::warn!("[{}] Intent routing request failed: {}", log_id, error);
                return IntentTriggerResult::passthrough(query);
            }
        };

        let routed = if self.multi_intent {
            parse_multi_intent(query, &answer, &catalog)
        } else {
            Some(parse_single_intent(query, &answer, &catalog))
        };

        match routed {
            Some(result) => {
                log::info!(
                    "[{}] Routed query into {} subquery(s), aggregation: {}",
                    log_id,
                    result.intents().len(),
                    result.needs_aggregation()
                );
                result
            }
            None => {
                log::warn!(
                    "[{}] Could not parse routing answer, passing query through: {}",
                    log_id,
                    answer
                );
                IntentTriggerResult::passthrough(query)
            }
        }
    }
}

fn parse_multi_intent(query: &str, answer: &str, catalog: &[Intent]) -> Option<IntentTriggerResult> {
    let value = extract_json_object(answer)?;
    let routing: RoutingAnswer = serde_json::from_value(value).ok()?;
    if routing.intents.is_empty() {
        return None;
    }

    let intents = routing
        .intents
        .into_iter()
        .map(|routed| TriggeredIntent {
            subquery: non_blank(Some(routed.subquery)).unwrap_or_else(|| query.to_string()),
            intent: routed
                .intent
                .as_deref()
                .and_then(|name| resolve_intent(name, catalog)),
            action_plan: non_blank(routed.action_plan),
        })
        .collect();

    Some(IntentTriggerResult::new(
        query,
        intents,
        routing.needs_aggregation,
    ))
}

fn parse_single_intent(query: &str, answer: &str, catalog: &[Intent]) -> IntentTriggerResult {
    let name = match extract_json_object(answer) {
        Some(value) => value
            .get("intent")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        None => Some(answer.trim().trim_matches('"').to_string()),
    };

    let triggered = TriggeredIntent {
        subquery: query.to_string(),
        intent: name.as_deref().and_then(|name| resolve_intent(name, catalog)),
        action_plan: None,
    };
    IntentTriggerResult::new(query, vec![triggered], false)
}

/// Case-insensitive lookup by name, then by id. Unknown names stay unmatched.
fn resolve_intent(name: &str, catalog: &[Intent]) -> Option<Intent> {
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") || name.eq_ignore_ascii_case("null")
    {
        return None;
    }

    catalog
        .iter()
        .find(|intent| intent.name.eq_ignore_ascii_case(name))
        .or_else(|| catalog.iter().find(|intent| intent.id.eq_ignore_ascii_case(name)))
        .cloned()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses the outermost `{...}` in a model answer, tolerating code fences
/// and surrounding prose.
pub(crate) fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
