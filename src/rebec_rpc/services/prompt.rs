//! `prompt.v1.PromptService`: run a stored prompt tool against a model.

use crate::client::{CallOptions, ClientBuilder, MethodHandle, RpcClient};
use crate::descriptor::builtin::PROMPT_SERVICE;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub function: ToolFunction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: i32,
    #[serde(default)]
    pub output_tokens: i32,
    #[serde(default)]
    pub total_tokens: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptRunRequest {
    pub tool_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i32>,
}

impl PromptRunRequest {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            ..Default::default()
        }
    }

    pub fn input(mut self, input: impl Into<Value>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptRunResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub model: String,
    /// Unix seconds. Servers may send it as a string, per the int64 JSON mapping.
    #[serde(default, deserialize_with = "super::int64")]
    pub created: i64,
    #[serde(default)]
    pub output: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl PromptRunResponse {
    /// Concatenated text of every `text` block.
    pub fn text(&self) -> String {
        self.output
            .iter()
            .filter(|b| !b.text.is_empty())
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Clone)]
pub struct PromptServiceClient {
    run: MethodHandle,
}

impl PromptServiceClient {
    pub fn new(client: &RpcClient) -> Result<Self> {
        Ok(Self {
            run: client.method("Run")?,
        })
    }

    pub fn connect(builder: ClientBuilder) -> Result<Self> {
        Self::new(&builder.service(PROMPT_SERVICE).build()?)
    }

    pub async fn run(
        &self,
        request: &PromptRunRequest,
        options: CallOptions,
    ) -> Result<PromptRunResponse> {
        self.run.invoke_as(request, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_empty_fields() {
        let req = PromptRunRequest::new("x").input("hi");
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"tool_name": "x", "input": "hi"})
        );
    }

    #[test]
    fn response_accepts_string_int64_and_missing_fields() {
        let resp: PromptRunResponse = serde_json::from_value(json!({
            "object": "response",
            "created": "1700000000",
            "output": [{"type": "output_text", "text": "hello "}, {"type": "output_text", "text": "world"}]
        }))
        .unwrap();
        assert_eq!(resp.created, 1_700_000_000);
        assert_eq!(resp.text(), "hello world");
        assert!(resp.usage.is_none());
    }

    #[test]
    fn typed_client_binds_run() {
        let client = PromptServiceClient::connect(ClientBuilder::new("http://localhost:1")).unwrap();
        assert_eq!(client.run.path(), "/prompt.v1.PromptService/Run");
    }
}
