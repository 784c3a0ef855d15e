use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid registry entry '{name}': {message}")]
    InvalidEntry { name: String, message: String },

    #[error("cannot reach {0}")]
    Connectivity(String),

    #[error("endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AgentError {
    /// Classify a transport error from `reqwest`: unreachable and timed-out
    /// peers become `Connectivity`, everything else stays `Http`.
    pub fn from_transport(err: reqwest::Error, target: &str) -> Self {
        if err.is_connect() || err.is_timeout() {
            AgentError::Connectivity(format!("{} ({})", target, err))
        } else {
            AgentError::Http(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
