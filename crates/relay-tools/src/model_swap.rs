//! Model management through the remote `exec` capability.

use relay_core::dispatch::{render_result, Invocation, ToolEndpoint};
use relay_core::error::{AgentError, Result};
use serde_json::Value;
use tracing::info;

const MODEL_PLACEHOLDER: &str = "{model}";

/// Render the configured swap command for `model`.
pub fn swap_command(template: &str, model: &str) -> String {
    if template.contains(MODEL_PLACEHOLDER) {
        template.replace(MODEL_PLACEHOLDER, model)
    } else {
        format!("{} {}", template.trim_end(), model)
    }
}

/// Text an exec result carries: its `output` field when present.
fn exec_output(value: &Value) -> String {
    match value.get("output").and_then(Value::as_str) {
        Some(output) => output.to_string(),
        None => render_result(value),
    }
}

async fn run_exec(endpoint: &dyn ToolEndpoint, command: String) -> Result<String> {
    let value = endpoint.call(&Invocation::exec(command)).await?;
    if let Some(error) = value.get("error") {
        return Err(AgentError::ToolExecution {
            tool_name: "exec".into(),
            message: render_result(error),
        });
    }
    Ok(exec_output(&value))
}

/// Ask the server to load `model`. Returns the command's output.
pub async fn swap_model(endpoint: &dyn ToolEndpoint, template: &str, model: &str) -> Result<String> {
    let model = model.trim();
    if model.is_empty() {
        return Err(AgentError::Config("model name is empty".into()));
    }
    info!("Swapping model to {}", model);
    run_exec(endpoint, swap_command(template, model)).await
}

/// The server's own model listing, as printed by the swap command.
pub async fn list_remote_models(endpoint: &dyn ToolEndpoint, template: &str) -> Result<String> {
    run_exec(endpoint, swap_command(template, "list")).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeExec {
        commands: Mutex<Vec<String>>,
        reply: Value,
    }

    impl FakeExec {
        fn new(reply: Value) -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                reply,
            }
        }
    }

    #[async_trait]
    impl ToolEndpoint for FakeExec {
        async fn call(&self, invocation: &Invocation) -> Result<Value> {
            assert_eq!(invocation.name, "exec");
            let command = invocation.arguments["command"].as_str().unwrap_or_default();
            self.commands.lock().unwrap().push(command.to_string());
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn test_swap_command() {
        assert_eq!(swap_command("model-run {model}", "big"), "model-run big");
        assert_eq!(swap_command("model-run", "big"), "model-run big");
    }

    #[tokio::test]
    async fn test_swap_success_returns_output() {
        let exec = FakeExec::new(json!({"output": "loaded big"}));
        let out = swap_model(&exec, "model-run {model}", " big ").await.unwrap();
        assert_eq!(out, "loaded big");
        assert_eq!(exec.commands.lock().unwrap()[0], "model-run big");
    }

    #[tokio::test]
    async fn test_swap_error_blob_is_err() {
        let exec = FakeExec::new(json!({"error": "HTTP 500: no such model"}));
        let err = swap_model(&exec, "model-run {model}", "ghost").await.unwrap_err();
        assert!(err.to_string().contains("no such model"));
    }

    #[tokio::test]
    async fn test_empty_model_rejected_without_call() {
        let exec = FakeExec::new(json!({}));
        assert!(swap_model(&exec, "model-run {model}", "  ").await.is_err());
        assert!(exec.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_without_output_field_renders_json() {
        let exec = FakeExec::new(json!({"models": ["a", "b"]}));
        let out = list_remote_models(&exec, "model-run {model}").await.unwrap();
        assert_eq!(out, r#"{"models":["a","b"]}"#);
        assert_eq!(exec.commands.lock().unwrap()[0], "model-run list");
    }
}
