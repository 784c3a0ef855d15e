//! Two-stage tool dispatch: resolve a requested function name into a concrete
//! built-in invocation, then hand it to the tool-execution endpoint.

use crate::error::Result;
use crate::registry::ToolSpec;
use crate::tool_schema::BuiltinCapability;
use crate::types::{ToolCall, ToolOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A fully resolved call against the tool-execution endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl Invocation {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// `exec` of a single shell command.
    pub fn exec(command: impl Into<String>) -> Self {
        let mut arguments = Map::new();
        arguments.insert("command".into(), Value::String(command.into()));
        Self::new(BuiltinCapability::Exec.name(), arguments)
    }
}

/// Anything that can run an invocation and return its result blob.
#[async_trait]
pub trait ToolEndpoint: Send + Sync {
    async fn call(&self, invocation: &Invocation) -> Result<Value>;
}

/// Map a requested function onto the endpoint.
///
/// Registered tools become an `exec` of their rendered shell template; every
/// other name (the built-ins, or anything unknown) is forwarded untouched and
/// left for the endpoint to accept or reject.
pub fn resolve_invocation(
    name: &str,
    arguments: Map<String, Value>,
    tools: &BTreeMap<String, ToolSpec>,
) -> Invocation {
    match tools.get(name) {
        Some(spec) => {
            let input = arguments.get("input").map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            Invocation::exec(spec.template.render(input.as_deref()))
        }
        None => Invocation::new(name, arguments),
    }
}

/// Resolve and execute one tool call, folding every failure into the output
/// so the model can react to it.
pub async fn execute_call(
    endpoint: &dyn ToolEndpoint,
    call: &ToolCall,
    tools: &BTreeMap<String, ToolSpec>,
) -> ToolOutput {
    let invocation = resolve_invocation(call.name(), call.decoded_arguments(), tools);
    tracing::debug!("Dispatching {} as {}", call.name(), invocation.name);

    let (content, is_error) = match endpoint.call(&invocation).await {
        Ok(value) => {
            let is_error = value.get("error").is_some();
            (render_result(&value), is_error)
        }
        Err(e) => {
            tracing::warn!("Tool {} failed: {}", call.name(), e);
            (json!({"error": e.to_string()}).to_string(), true)
        }
    };

    ToolOutput {
        tool_call_id: call.correlation_id().to_string(),
        name: call.name().to_string(),
        content,
        is_error,
    }
}

/// Text form of a result blob: strings verbatim, anything else as JSON.
pub fn render_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
