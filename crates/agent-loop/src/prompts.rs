use agent_core::{FulfillmentResult, Intent};

pub const TOOL_USAGE_RULES: &str = "## Tool Usage Guidelines

- Use a tool only when it is needed to answer the request.
- Pass every argument the tool's schema requires; never invent values the user did not give.
- Remote agent tools take a single natural-language `query` argument describing the whole task. Each agent is offered once per turn, so ask it everything in that one call.
- Local tools take the structured arguments in their schema and may be called repeatedly.
- Base your answer on the tool results; if a tool fails, say so instead of guessing.
- When the request is fully answered, reply in plain text without calling further tools.";

const ROUTER_MULTI_INSTRUCTIONS: &str = "You split a user query into the subqueries needed to answer it and match each one to an intent from the catalog.

Respond with a JSON object only:
{\"intents\": [{\"subquery\": \"...\", \"intent\": \"<intent name or null>\", \"actionPlan\": \"...\"}], \"needsAggregation\": true|false}

Rules:
- Keep subqueries in the order they should be answered.
- Use null as the intent when no catalog entry fits.
- Set needsAggregation to true only when the answers must be combined into one response.";

const ROUTER_SINGLE_INSTRUCTIONS: &str = "You pick the single intent from the catalog that best matches the user query.

Respond with a JSON object only: {\"intent\": \"<intent name>\"}, or {\"intent\": null} when none fits.";

const AGGREGATION_DECISION_INSTRUCTIONS: &str = "Several partial answers were produced for one user query. Decide whether they must be combined into a single response, or whether the last answer already answers the query on its own.

Respond with a JSON object only: {\"needsAggregation\": true|false, \"reason\": \"...\"}";

const SYNTHESIS_INSTRUCTIONS: &str = "Combine the partial answers below into one response to the user's query.

- Preserve all information from the partial answers.
- Remove redundancy.
- Write one natural answer, not a list of separate replies.
- Do not add facts that are not in the partial answers.
- Do not call tools.";

/// Joins prompt sections in order, skipping blank ones.
pub fn merge_prompt_sections<'a>(sections: impl IntoIterator<Item = &'a str>) -> String {
    sections
        .into_iter()
        .map(str::trim)
        .filter(|section| !section.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_catalog(intents: &[Intent]) -> String {
    intents
        .iter()
        .map(|intent| format!("- {}: {}", intent.name, intent.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn router_system_prompt(multi_intent: bool, intents: &[Intent], transcript: &str) -> String {
    let instructions = if multi_intent {
        ROUTER_MULTI_INSTRUCTIONS
    } else {
        ROUTER_SINGLE_INSTRUCTIONS
    };
    let catalog = format!("## Intent Catalog\n{}", format_catalog(intents));
    let history = if transcript.trim().is_empty() {
        String::new()
    } else {
        format!("## Conversation So Far\n{}", transcript)
    };

    merge_prompt_sections([instructions, catalog.as_str(), history.as_str()])
}

fn format_results(results: &[FulfillmentResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "### Part {}\nSubquery: {}\nAnswer: {}",
                i + 1,
                result.subquery,
                result.response
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn aggregation_decision_prompt(query: &str, results: &[FulfillmentResult]) -> String {
    format!(
        "{}\n\nUser query: {}\n\n{}",
        AGGREGATION_DECISION_INSTRUCTIONS,
        query,
        format_results(results)
    )
}

pub fn synthesis_prompt(query: &str, results: &[FulfillmentResult]) -> String {
    format!(
        "{}\n\nUser query: {}\n\n{}",
        SYNTHESIS_INSTRUCTIONS,
        query,
        format_results(results)
    )
}
