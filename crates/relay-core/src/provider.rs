//! Client side of the OpenAI-compatible chat endpoint.

use crate::config::EndpointConfig;
use crate::error::{AgentError, Result};
use crate::types::Message;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Error bodies are cut to this many characters before being surfaced.
const ERROR_BODY_LIMIT: usize = 300;

const MODELS_TIMEOUT: Duration = Duration::from_secs(8);

/// Body of one chat-completion call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [Value]>,
    pub stream: bool,
}

/// The assistant turn of a non-streamed response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub message: Message,
    pub finish_reason: Option<String>,
}

impl ChatReply {
    pub fn is_stop(&self) -> bool {
        self.finish_reason.as_deref() == Some("stop")
    }
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Message,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// One row of the `/models` listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub quant: Option<String>,
    #[serde(default)]
    pub size_gb: Option<f64>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

/// Anything that can answer chat-completion requests.
#[async_trait]
pub trait ChatEndpoint: Send + Sync {
    /// One structured, non-streamed completion.
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatReply>;

    /// A streamed completion. Each text fragment is handed to `on_chunk` as it
    /// arrives; the concatenated text is returned.
    async fn stream(
        &self,
        request: &ChatRequest<'_>,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String>;
}

/// A parsed server-sent-event line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Delta(String),
    Done,
}

/// Parse one `data: ...` line of a streamed completion. Lines that carry no
/// text (keep-alives, role-only deltas, malformed payloads) yield `None`.
pub fn parse_sse_line(line: &str) -> Option<SseLine> {
    let payload = line.trim().strip_prefix("data:")?.trim();
    if payload == "[DONE]" {
        return Some(SseLine::Done);
    }
    let value: Value = serde_json::from_str(payload).ok()?;
    let text = value["choices"][0]["delta"]["content"].as_str()?;
    (!text.is_empty()).then(|| SseLine::Delta(text.to_string()))
}

/// `reqwest`-backed chat endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatEndpoint {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

impl HttpChatEndpoint {
    pub fn new(api_base: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        Url::parse(api_base)
            .map_err(|e| AgentError::Config(format!("invalid api_base '{}': {}", api_base, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("relay-shell/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &EndpointConfig, token: Option<String>) -> Result<Self> {
        Self::new(&config.api_base, token, Duration::from_secs(config.timeout_secs))
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    async fn post(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response> {
        let url = self.completions_url();
        debug!(
            "POST {} model={} messages={} stream={}",
            url,
            request.model,
            request.messages.len(),
            request.stream
        );
        let mut builder = self.client.post(&url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::from_transport(e, &self.api_base))?;
        check_status(response).await
    }

    /// Fetch the server's model listing.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.api_base);
        let mut builder = self.client.get(&url).timeout(MODELS_TIMEOUT);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::from_transport(e, &self.api_base))?;
        let list: ModelList = check_status(response).await?.json().await?;
        Ok(list.data)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AgentError::Endpoint {
        status: status.as_u16(),
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    })
}

#[async_trait]
impl ChatEndpoint for HttpChatEndpoint {
    async fn complete(&self, request: &ChatRequest<'_>) -> Result<ChatReply> {
        let body: CompletionBody = self.post(request).await?.json().await?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("no choices in response".into()))?;
        Ok(ChatReply {
            message: choice.message,
            finish_reason: choice.finish_reason,
        })
    }

    async fn stream(
        &self,
        request: &ChatRequest<'_>,
        on_chunk: &mut (dyn for<'c> FnMut(&'c str) + Send),
    ) -> Result<String> {
        let response = self.post(request).await?;
        let mut body = response.bytes_stream();
        let mut pending: Vec<u8> = Vec::new();
        let mut full = String::new();
        let mut done = false;

        let mut handle = |raw: &[u8], full: &mut String| -> bool {
            match parse_sse_line(&String::from_utf8_lossy(raw)) {
                Some(SseLine::Done) => true,
                Some(SseLine::Delta(text)) => {
                    on_chunk(text.as_str());
                    full.push_str(&text);
                    false
                }
                None => false,
            }
        };

        'read: while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| AgentError::from_transport(e, &self.api_base))?;
            pending.extend_from_slice(&chunk);
            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if handle(&line, &mut full) {
                    done = true;
                    break 'read;
                }
            }
        }
        // A final line without a trailing newline; nothing after the end marker.
        if !done && !pending.is_empty() {
            handle(&pending, &mut full);
        }

        Ok(full)
    }
}
