use crate::registry::ToolSpec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Schema definition for one invocable function, sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Capabilities served by the remote tool-execution endpoint. Always offered,
/// never stored in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinCapability {
    Exec,
    ReadFile,
    WriteFile,
    ListDir,
    HttpGet,
    Dispatch,
    Status,
}

impl BuiltinCapability {
    /// Every built-in, in the order they are offered.
    pub const ALL: [BuiltinCapability; 7] = [
        BuiltinCapability::Exec,
        BuiltinCapability::ReadFile,
        BuiltinCapability::WriteFile,
        BuiltinCapability::ListDir,
        BuiltinCapability::HttpGet,
        BuiltinCapability::Dispatch,
        BuiltinCapability::Status,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinCapability::Exec => "exec",
            BuiltinCapability::ReadFile => "read_file",
            BuiltinCapability::WriteFile => "write_file",
            BuiltinCapability::ListDir => "list_dir",
            BuiltinCapability::HttpGet => "http_get",
            BuiltinCapability::Dispatch => "dispatch",
            BuiltinCapability::Status => "status",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            BuiltinCapability::Exec => "Run a shell command on the server. Returns stdout/stderr.",
            BuiltinCapability::ReadFile => "Read a file on the server.",
            BuiltinCapability::WriteFile => "Write a file on the server.",
            BuiltinCapability::ListDir => "List a directory on the server.",
            BuiltinCapability::HttpGet => "HTTP GET a URL from the server.",
            BuiltinCapability::Dispatch => {
                "Delegate a complex task to the long-lived background agent, \
                 which has its own memory and filesystem access."
            }
            BuiltinCapability::Status => {
                "Check the background agent's status: uptime, model, memory."
            }
        }
    }

    pub fn parameters(self) -> Value {
        match self {
            BuiltinCapability::Exec => string_params(&["command"]),
            BuiltinCapability::ReadFile | BuiltinCapability::ListDir => string_params(&["path"]),
            BuiltinCapability::WriteFile => string_params(&["path", "content"]),
            BuiltinCapability::HttpGet => string_params(&["url"]),
            BuiltinCapability::Dispatch => string_params(&["message"]),
            BuiltinCapability::Status => string_params(&[]),
        }
    }

    pub fn schema(self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Object schema whose listed properties are all required strings.
fn string_params(required: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = required
        .iter()
        .map(|p| (p.to_string(), json!({"type": "string"})))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Schema for a registered tool: a required `input` string when the template
/// has a placeholder, otherwise no parameters at all.
pub fn registered_tool_schema(name: &str, spec: &ToolSpec) -> ToolSchema {
    let parameters = if spec.has_placeholder() {
        string_params(&["input"])
    } else {
        string_params(&[])
    };
    ToolSchema {
        name: name.to_string(),
        description: spec.description.clone(),
        parameters,
    }
}

/// Build the full function list: built-ins first, then one entry per
/// registered tool.
pub fn build_tool_schema(tools: &BTreeMap<String, ToolSpec>) -> Vec<ToolSchema> {
    BuiltinCapability::ALL
        .into_iter()
        .map(BuiltinCapability::schema)
        .chain(tools.iter().map(|(name, spec)| registered_tool_schema(name, spec)))
        .collect()
}

/// Convert tool schemas to the OpenAI function calling format.
pub fn schemas_to_openai_tools(schemas: &[ToolSchema]) -> Vec<Value> {
    schemas
        .iter()
        .map(|s| {
            json!({
                "type": "function",
                "function": {
                    "name": s.name,
                    "description": s.description,
                    "parameters": s.parameters,
                }
            })
        })
        .collect()
}
