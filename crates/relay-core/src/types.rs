use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool call ID this message is responding to (for tool results).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Name of the tool that produced this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::with_role(Role::Assistant, content)
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// Tool calls carried by this message, empty when there are none.
    pub fn requested_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model.
///
/// `arguments` is kept exactly as the endpoint sent it: some servers send a
/// JSON-encoded string, others an already structured object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            kind: function_type(),
            function: FunctionCall {
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Identifier used to tag the result turn. Falls back to the function
    /// name when the endpoint did not assign an id.
    pub fn correlation_id(&self) -> &str {
        if self.id.is_empty() {
            &self.function.name
        } else {
            &self.id
        }
    }

    /// Decode the argument payload into an object.
    ///
    /// A string payload is parsed as JSON. Anything that does not end up as a
    /// JSON object degrades to an empty argument set.
    pub fn decoded_arguments(&self) -> Map<String, Value> {
        match &self.function.arguments {
            Value::Object(map) => map.clone(),
            Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            _ => Map::new(),
        }
    }
}

/// Output from one dispatched tool call, as fed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

/// Progress event emitted while the agentic loop runs.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A request round is about to be sent (1-based).
    RoundStarted { round: usize, model: String },
    /// The endpoint answered the current round.
    ResponseReceived { round: usize },
    /// A chunk of streamed assistant text.
    ContentChunk(String),
    /// A tool call is about to be dispatched.
    ToolCallStart { id: String, name: String, arguments: Value },
    /// Tool execution completed.
    ToolResult(ToolOutput),
    /// The loop reached a terminal state with this reply.
    Done(Option<String>),
    /// An error terminated the loop.
    Error(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_arguments_are_decoded() {
        let call = ToolCall::new("c1", "read_file", json!("{\"path\": \"/etc/hosts\"}"));
        let args = call.decoded_arguments();
        assert_eq!(args.get("path"), Some(&json!("/etc/hosts")));
    }

    #[test]
    fn test_object_arguments_pass_through() {
        let call = ToolCall::new("c1", "list_dir", json!({"path": "/tmp"}));
        assert_eq!(call.decoded_arguments().get("path"), Some(&json!("/tmp")));
    }

    #[test]
    fn test_undecodable_arguments_degrade_to_empty() {
        let call = ToolCall::new("c1", "exec", json!("{not json"));
        assert!(call.decoded_arguments().is_empty());

        let call = ToolCall::new("c1", "exec", json!([1, 2, 3]));
        assert!(call.decoded_arguments().is_empty());

        let call = ToolCall::new("c1", "exec", Value::Null);
        assert!(call.decoded_arguments().is_empty());
    }

    #[test]
    fn test_missing_call_id_falls_back_to_name() {
        let call: ToolCall =
            serde_json::from_value(json!({"function": {"name": "status", "arguments": "{}"}}))
                .unwrap();
        assert_eq!(call.correlation_id(), "status");
    }

    #[test]
    fn test_tool_result_wire_shape() {
        let msg = Message::tool_result("call_7", "exec", "ok");
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "call_7");
        assert_eq!(wire["name"], "exec");
        assert!(wire.get("tool_calls").is_none());
    }

    #[test]
    fn test_assistant_message_without_content_deserializes() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "tool_calls": [{"id": "a", "function": {"name": "status"}}]
        }))
        .unwrap();
        assert_eq!(msg.content, "");
        assert_eq!(msg.requested_calls().len(), 1);
        assert_eq!(msg.requested_calls()[0].kind, "function");
        assert_eq!(msg.requested_calls()[0].correlation_id(), "a");

        let msg: Message =
            serde_json::from_value(json!({"role": "assistant", "content": null})).unwrap();
        assert_eq!(msg.content, "");
    }
}
