pub mod agent_loop;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fuzzy;
pub mod persona;
pub mod picker;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod tool_schema;
pub mod transcript;
pub mod types;

pub use agent_loop::{AgentLoop, LoopOutcome, MAX_ROUNDS};
pub use config::AppConfig;
pub use dispatch::{Invocation, ToolEndpoint};
pub use error::{AgentError, Result};
pub use provider::{ChatEndpoint, HttpChatEndpoint};
pub use registry::{Registry, RegistryStore};
pub use resolver::{resolve, Resolution};
pub use session::SessionState;
pub use transcript::Transcript;
