//! LOCAL protocol: tools served by a locally spawned helper process.

use agent_core::{ToolDescriptor, ToolError, ToolProtocol};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::ToolContext;

/// Tool metadata reported by a local tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalCallResult {
    pub content: Vec<ContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

impl LocalCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
            is_error: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        data: String,
        mime_type: String,
    },
    Resource {
        uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

/// Transport to one local tool server process.
#[async_trait]
pub trait LocalToolProvider: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<LocalToolSpec>, ToolError>;
    async fn call_tool(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<LocalCallResult, ToolError>;
}

/// Exposes a local tool server's tools as `<connector>_<tool>` descriptors.
pub struct LocalConnector {
    name: String,
    provider: Arc<dyn LocalToolProvider>,
}

impl LocalConnector {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LocalToolProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let specs = self.provider.list_tools().await?;
        Ok(specs
            .into_iter()
            .map(|spec| ToolDescriptor {
                tool_name: format!("{}_{}", self.name, spec.name),
                protocol: ToolProtocol::Local,
                connector_name: self.name.clone(),
                description: spec.description,
                input_schema: spec.input_schema,
            })
            .collect())
    }

    pub async fn use_tool(
        &self,
        descriptor: &ToolDescriptor,
        args: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let tool_name = self.original_name(&descriptor.tool_name)?;

        log::debug!(
            "[{}] Executing local tool: {} (connector: {}, original: {})",
            ctx.thread_id,
            descriptor.tool_name,
            self.name,
            tool_name
        );

        let result = self.provider.call_tool(tool_name, args).await?;
        let content = format_result_content(&result.content);

        if result.is_error {
            Err(ToolError::Execution(content))
        } else {
            Ok(content)
        }
    }

    fn original_name<'a>(&self, tool_name: &'a str) -> Result<&'a str, ToolError> {
        tool_name
            .strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| {
                ToolError::NotFound(format!(
                    "Tool '{}' does not belong to connector '{}'",
                    tool_name, self.name
                ))
            })
    }
}

/// Flattens tool output content into the text handed back to the model.
pub fn format_result_content(content: &[ContentItem]) -> String {
    content
        .iter()
        .map(|item| match item {
            ContentItem::Text { text } => text.clone(),
            ContentItem::Image { data, mime_type } => {
                format!("[Image: {} ({} bytes)]", mime_type, data.len())
            }
            ContentItem::Resource { uri, text } => match text {
                Some(text) => format!("[Resource {}]: {}", uri, text),
                None => format!("[Resource {}]", uri),
            },
        })
        .collect::<Vec<_>>()
        .join("\n")
}
