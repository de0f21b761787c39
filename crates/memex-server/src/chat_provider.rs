//! `ChatProvider`: the abstract seam between the chat orchestrator (C10)
//! and AI validator (C7) and whatever upstream LLM actually answers them.
//! The upstream provider itself is explicitly out of scope (§1); this
//! module defines the trait both components are built against, plus an
//! HTTP-backed implementation for a JSON chat-completions-shaped endpoint
//! and a stub used by the validator's fail-closed tests.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    ToolResult { tool_use_id: String, content: String, is_error: bool },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message { role: Role::User, content: vec![ContentBlock::Text { text: text.into() }] }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub enum ProviderEvent {
    TextDelta(String),
    ToolUse { id: String, name: String, input: serde_json::Value },
    Done,
}

pub type ProviderStream = Pin<Box<dyn Stream<Item = ProviderEvent> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider timed out")]
    Timeout,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stream a completion given the running conversation and the tools
    /// available this turn. Terminates with [`ProviderEvent::Done`].
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ProviderStream, ProviderError>;

    /// A single non-streaming completion, used by the AI validator (C7) to
    /// ask a yes/no policy question. `timeout` is enforced by the caller
    /// via [`complete_with_timeout`]; implementations should still respect
    /// their own request timeout where the transport allows it.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

pub async fn complete_with_timeout(
    provider: &dyn ChatProvider,
    system: &str,
    user: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    tokio::time::timeout(timeout, provider.complete(system, user))
        .await
        .map_err(|_| ProviderError::Timeout)?
}

/// A provider that answers deterministically with no tool use — used by
/// tests and by a server started with no upstream configured.
pub struct NullChatProvider;

#[async_trait]
impl ChatProvider for NullChatProvider {
    async fn stream(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<ProviderStream, ProviderError> {
        let events = vec![
            ProviderEvent::TextDelta("No upstream chat provider is configured.".to_string()),
            ProviderEvent::Done,
        ];
        Ok(Box::pin(futures_util::stream::iter(events)))
    }

    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        Ok(r#"{"allow": true, "reason": "no_validator_configured"}"#.to_string())
    }
}

/// HTTP-backed provider speaking a minimal JSON chat-completions contract:
/// `POST {endpoint}` with `{system, messages, tools, stream}`; a streaming
/// response is newline-delimited JSON objects `{"type": "text", "text":
/// "..."}`, `{"type": "tool_use", "id", "name", "input"}`, or
/// `{"type": "done"}`. A non-streaming call to the same endpoint with
/// `stream: false` returns a single `{"text": "..."}` object.
pub struct HttpChatProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpChatProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        HttpChatProvider {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }

    fn request(&self, body: serde_json::Value) -> reqwest::RequestBuilder {
        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
    Done,
}

#[async_trait]
impl ChatProvider for HttpChatProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ProviderStream, ProviderError> {
        let body = serde_json::json!({
            "system": system,
            "messages": messages,
            "tools": tools,
            "stream": true,
        });
        let response = self
            .request(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Request(format!("status {}", response.status())));
        }
        let byte_stream = response.bytes_stream();
        let events = byte_stream.flat_map(|chunk| {
            let lines: Vec<ProviderEvent> = match chunk {
                Ok(bytes) => String::from_utf8_lossy(&bytes)
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .filter_map(|line| serde_json::from_str::<WireEvent>(line).ok())
                    .map(|event| match event {
                        WireEvent::Text { text } => ProviderEvent::TextDelta(text),
                        WireEvent::ToolUse { id, name, input } => ProviderEvent::ToolUse { id, name, input },
                        WireEvent::Done => ProviderEvent::Done,
                    })
                    .collect(),
                Err(_) => vec![],
            };
            futures_util::stream::iter(lines)
        });
        Ok(Box::pin(events))
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "system": system,
            "messages": [Message::user_text(user)],
            "tools": Vec::<ToolSpec>::new(),
            "stream": false,
        });
        let response = self
            .request(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Request(format!("status {}", response.status())));
        }
        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        Ok(parsed.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_provider_completes_without_tools() {
        let provider = NullChatProvider;
        let text = provider.complete("policy", "is this ok?").await.unwrap();
        assert!(text.contains("allow"));
    }

    #[tokio::test]
    async fn null_provider_streams_a_terminal_done_event() {
        let provider = NullChatProvider;
        let mut stream = provider.stream("sys", &[], &[]).await.unwrap();
        let mut saw_done = false;
        while let Some(event) = stream.next().await {
            if matches!(event, ProviderEvent::Done) {
                saw_done = true;
            }
        }
        assert!(saw_done);
    }
}
