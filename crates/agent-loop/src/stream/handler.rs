use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{ToolCall, ToolCallAccumulator};
use agent_core::{AgentError, AgentEvent};
use agent_llm::{LLMChunk, LLMStream};

pub struct StreamHandlingOutput {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Drains one model stream. Text is forwarded as `text_chunk` events only
/// when `forward_text` is set; tool-call deltas are merged by index.
pub async fn consume_llm_stream(
    mut stream: LLMStream,
    event_tx: &mpsc::Sender<AgentEvent>,
    cancel_token: &CancellationToken,
    thread_id: &str,
    forward_text: bool,
) -> Result<StreamHandlingOutput, AgentError> {
    let mut content = String::new();
    let mut tool_calls = ToolCallAccumulator::new();

    while let Some(chunk_result) = stream.next().await {
        if cancel_token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        match chunk_result {
            Ok(LLMChunk::Token(token)) => {
                content.push_str(&token);

                if forward_text {
                    let _ = event_tx.send(AgentEvent::text(token)).await;
                }
            }
            Ok(LLMChunk::ToolCalls(deltas)) => {
                log::debug!("[{}] Received {} tool call parts", thread_id, deltas.len());
                tool_calls.extend(deltas);
            }
            Ok(LLMChunk::Done) => {
                log::debug!("[{}] LLM stream completed", thread_id);
            }
            Err(error) => {
                return Err(AgentError::LLM(format!("Stream error: {error}")));
            }
        }
    }

    Ok(StreamHandlingOutput {
        content,
        tool_calls: tool_calls.finalize(),
    })
}
