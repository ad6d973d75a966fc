use crate::provider::{Completion, CompletionOptions, LLMError, LLMProvider, LLMStream, Result};
use crate::types::LLMChunk;
use agent_core::tools::{ToolCall, ToolCallDelta, ToolSchema};
use agent_core::Message;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Backend for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &CompletionOptions,
        stream: bool,
    ) -> serde_json::Value {
        let wire_messages: Vec<WireMessage<'_>> = messages.iter().map(WireMessage::from).collect();

        let mut body = serde_json::json!({
            "model": options.model.as_deref().unwrap_or(&self.model),
            "messages": wire_messages,
            "stream": stream,
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(tools);
        }
        if let Some(temperature) = options.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if options.json_response {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        log::debug!(
            "Request body: {} messages, {} tools, stream={}",
            messages.len(),
            tools.len(),
            stream
        );

        body
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(LLMError::Api(format!("HTTP {}: {}", status, text)));
        }

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &CompletionOptions,
    ) -> Result<LLMStream> {
        let body = self.build_request_body(messages, tools, options, true);
        let response = self.post(&body).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .map(|event| {
                let event = event.map_err(|e| LLMError::Stream(e.to_string()))?;

                if event.data == "[DONE]" {
                    return Ok(vec![LLMChunk::Done]);
                }

                let chunk: OpenAIStreamChunk =
                    serde_json::from_str(&event.data).map_err(LLMError::Json)?;

                Ok(parse_chunk(chunk))
            })
            .flat_map(|result| {
                let items: Vec<Result<LLMChunk>> = match result {
                    Ok(chunks) => chunks.into_iter().map(Ok).collect(),
                    Err(error) => vec![Err(error)],
                };
                stream::iter(items)
            });

        Ok(Box::pin(stream))
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<Completion> {
        let body = self.build_request_body(messages, &[], options, false);
        let response: OpenAICompletion = self.post(&body).await?.json().await?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| LLMError::Api("Completion returned no choices".to_string()))?;

        Ok(Completion {
            content: message.content,
            tool_calls: message.tool_calls.unwrap_or_default(),
        })
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<&'a [ToolCall]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: message.role.as_str(),
            content: &message.content,
            tool_calls: message.tool_calls.as_deref(),
            tool_call_id: message.tool_call_id.as_deref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAICompletion {
    choices: Vec<OpenAICompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompletionChoice {
    message: OpenAICompletionMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAICompletionMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    #[serde(default)]
    delta: OpenAIDelta,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAIDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// Splits one SSE delta into chunks. A delta may carry text and tool-call
/// fragments together; text comes first. Empty deltas yield nothing.
fn parse_chunk(chunk: OpenAIStreamChunk) -> Vec<LLMChunk> {
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Vec::new();
    };

    let mut chunks = Vec::new();
    if let Some(content) = choice.delta.content.filter(|content| !content.is_empty()) {
        chunks.push(LLMChunk::Token(content));
    }

    if let Some(tool_calls) = choice.delta.tool_calls.filter(|calls| !calls.is_empty()) {
        chunks.push(LLMChunk::ToolCalls(
            tool_calls
                .into_iter()
                .map(|tc| {
                    let (name, arguments) = tc
                        .function
                        .map(|f| (f.name, f.arguments))
                        .unwrap_or_default();
                    ToolCallDelta {
                        index: tc.index,
                        id: tc.id,
                        name,
                        arguments,
                    }
                })
                .collect(),
        ));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(events: &[&str]) -> String {
        events
            .iter()
            .map(|data| format!("data: {}\n\n", data))
            .collect()
    }

    #[tokio::test]
    async fn chat_stream_parses_tokens_and_indexed_tool_call_deltas() {
        let server = MockServer::start().await;
        let body = sse_body(&[
            r#"{"choices":[{"delta":{"role":"assistant","content":"Checking"}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"weatherApi_get","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":\"Oslo\"}"}}]}}]}"#,
            "[DONE]",
        ]);

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new("sk-test").with_base_url(format!("{}/v1", server.uri()));
        let mut stream = provider
            .chat_stream(&[Message::user("weather?")], &[], &CompletionOptions::default())
            .await
            .expect("stream should open");

        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.expect("chunk should parse"));
        }

        assert_eq!(chunks[0], LLMChunk::Token("Checking".to_string()));
        assert_eq!(
            chunks[1],
            LLMChunk::ToolCalls(vec![ToolCallDelta::new(0)
                .with_id("call_1")
                .with_name("weatherApi_get")
                .with_arguments("")])
        );
        assert_eq!(
            chunks[2],
            LLMChunk::ToolCalls(vec![
                ToolCallDelta::new(0).with_arguments("{\"city\":\"Oslo\"}")
            ])
        );
        assert_eq!(chunks[3], LLMChunk::Done);
    }

    #[tokio::test]
    async fn complete_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"intent\":\"weather\"}"}}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new("sk-test").with_base_url(server.uri());
        let completion = provider
            .complete(&[Message::user("route me")], &CompletionOptions::json())
            .await
            .expect("completion should succeed");

        assert_eq!(completion.text(), "{\"intent\":\"weather\"}");
        assert!(completion.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn http_errors_surface_as_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let provider = OpenAIProvider::new("wrong").with_base_url(server.uri());
        let error = provider
            .complete(&[Message::user("hi")], &CompletionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(error, LLMError::Api(message) if message.contains("401")));
    }

    #[test]
    fn delta_with_text_and_tool_call_yields_both() {
        let chunk: OpenAIStreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"content":"Looking it up","tool_calls":[{"index":0,"id":"call_1","function":{"name":"weatherApi_get","arguments":"{}"}}]}}]}"#,
        )
        .unwrap();

        assert_eq!(
            parse_chunk(chunk),
            vec![
                LLMChunk::Token("Looking it up".to_string()),
                LLMChunk::ToolCalls(vec![ToolCallDelta::new(0)
                    .with_id("call_1")
                    .with_name("weatherApi_get")
                    .with_arguments("{}")]),
            ]
        );
    }

    #[test]
    fn empty_deltas_yield_nothing() {
        let chunk: OpenAIStreamChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#)
                .unwrap();
        assert!(parse_chunk(chunk).is_empty());

        let chunk: OpenAIStreamChunk = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(parse_chunk(chunk).is_empty());
    }

    #[test]
    fn request_body_honours_model_override_and_json_mode() {
        let provider = OpenAIProvider::new("k").with_model("default-model");
        let options = CompletionOptions::json().with_model(Some("intent-model".to_string()));

        let body = provider.build_request_body(&[Message::user("hi")], &[], &options, false);

        assert_eq!(body["model"], "intent-model");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("tools").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }
}
