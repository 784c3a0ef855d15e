use async_trait::async_trait;
use relay_core::config::EndpointConfig;
use relay_core::dispatch::{Invocation, ToolEndpoint};
use relay_core::error::{AgentError, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

const CALL_PATH: &str = "/mcp/tools/call";

/// Non-success bodies are cut to this many characters.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Serialize)]
struct CallBody<'a> {
    name: &'a str,
    arguments: &'a Map<String, Value>,
}

/// HTTP client for the remote tool-execution endpoint.
#[derive(Debug, Clone)]
pub struct RemoteToolClient {
    client: reqwest::Client,
    server: String,
    token: Option<String>,
}

impl RemoteToolClient {
    pub fn new(server: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        Url::parse(server)
            .map_err(|e| AgentError::Config(format!("invalid server '{}': {}", server, e)))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("relay-shell/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            server: server.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &EndpointConfig, token: Option<String>) -> Result<Self> {
        Self::new(&config.server, token, Duration::from_secs(config.tool_timeout_secs))
    }

    pub fn server(&self) -> &str {
        &self.server
    }
}

#[async_trait]
impl ToolEndpoint for RemoteToolClient {
    /// A non-success status is not an error: it comes back as an
    /// `{"error": "HTTP <code>: <body>"}` blob for the model to read.
    async fn call(&self, invocation: &Invocation) -> Result<Value> {
        let url = format!("{}{}", self.server, CALL_PATH);
        debug!("POST {} tool={}", url, invocation.name);

        let body = CallBody {
            name: &invocation.name,
            arguments: &invocation.arguments,
        };
        let mut builder = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AgentError::from_transport(e, &self.server))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Ok(json!({"error": format!("HTTP {}: {}", status.as_u16(), snippet)}));
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn echo(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        Json(json!({"auth": auth, "received": body}))
    }

    fn client(server: &str) -> RemoteToolClient {
        RemoteToolClient::new(server, Some("secret".into()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_call_posts_name_and_arguments() {
        let server = serve(Router::new().route(CALL_PATH, post(echo))).await;

        let value = client(&server).call(&Invocation::exec("uptime")).await.unwrap();
        assert_eq!(value["auth"], "Bearer secret");
        assert_eq!(value["received"]["name"], "exec");
        assert_eq!(value["received"]["arguments"]["command"], "uptime");
    }

    #[tokio::test]
    async fn test_non_success_becomes_error_blob() {
        async fn missing() -> (StatusCode, String) {
            (StatusCode::NOT_FOUND, "x".repeat(500))
        }
        let server = serve(Router::new().route(CALL_PATH, post(missing))).await;

        let value = client(&server).call(&Invocation::exec("ls")).await.unwrap();
        let error = value["error"].as_str().unwrap();
        assert!(error.starts_with("HTTP 404: "));
        assert_eq!(error.len(), "HTTP 404: ".len() + ERROR_BODY_LIMIT);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_connectivity_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr))
            .call(&Invocation::exec("ls"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Connectivity(_)));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        assert_eq!(client("http://example.com/").server(), "http://example.com");
        assert!(RemoteToolClient::new("::nope", None, Duration::from_secs(1)).is_err());
    }
}
