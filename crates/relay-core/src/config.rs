use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the chat endpoint base URL.
pub const MODEL_API_ENV: &str = "RELAY_MODEL_API";

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: EndpointConfig,
    pub resolver: ResolverConfig,
    pub agent: AgentConfig,
    /// Directory holding the registries and the transcript log.
    /// Defaults to the config directory.
    pub registry_dir: Option<PathBuf>,
    pub system_prompt: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            resolver: ResolverConfig::default(),
            agent: AgentConfig::default(),
            registry_dir: None,
            system_prompt: "You are a capable operator assistant running on a remote server. \
                 Tools: exec (server commands), read_file/write_file/list_dir (files), \
                 http_get (fetch a URL), dispatch/status (the long-lived background agent). \
                 Be direct. Use tools when they help, then answer."
                .into(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.config/relay-shell/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(api) = std::env::var(MODEL_API_ENV) {
            if !api.trim().is_empty() {
                self.endpoint.api_base = api;
            }
        }
    }

    /// Configuration directory (~/.config/relay-shell).
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relay-shell")
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Directory for the registry JSON files and the transcript log.
    pub fn registry_dir(&self) -> PathBuf {
        self.registry_dir.clone().unwrap_or_else(Self::config_dir)
    }

    /// Data directory for REPL history.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relay-shell")
    }
}

/// Remote endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Host serving the tool-execution endpoint (`{server}/mcp/tools/call`).
    pub server: String,
    /// Base URL for the OpenAI-compatible chat API.
    pub api_base: String,
    /// Model name sent with every chat request.
    pub model: String,
    /// Chat request timeout in seconds.
    pub timeout_secs: u64,
    /// Tool-execution request timeout in seconds.
    pub tool_timeout_secs: u64,
    /// Inline bearer token. Prefer a token file.
    pub token: Option<String>,
    /// Environment variable consulted last for the bearer token.
    pub token_env: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            server: "http://localhost:8000".into(),
            api_base: "http://localhost:8000/v1".into(),
            model: "default-model".into(),
            timeout_secs: 300,
            tool_timeout_secs: 120,
            token: None,
            token_env: "RELAY_TOKEN".into(),
        }
    }
}

/// Input resolution tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum similarity ratio (0.0..=1.0) for a "did you mean" suggestion.
    pub fuzzy_threshold: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.6,
        }
    }
}

/// Agentic loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Offer the tool schema to the model. When false, replies are streamed.
    pub tools_enabled: bool,
    /// Remote command used by `/run <model>`; `{model}` is replaced.
    pub model_swap_command: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tools_enabled: true,
            model_swap_command: "model-run {model}".into(),
        }
    }
}

/// One place a bearer token may come from.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenSource {
    /// A file whose trimmed contents are the token.
    File(PathBuf),
    /// A value taken from the config file.
    Inline(Option<String>),
    /// An environment variable.
    Env(String),
}

impl TokenSource {
    /// Look the token up. Missing or empty sources yield `None`.
    pub fn lookup(&self) -> Option<String> {
        let raw = match self {
            TokenSource::File(path) => std::fs::read_to_string(path).ok()?,
            TokenSource::Inline(value) => value.clone()?,
            TokenSource::Env(var) => std::env::var(var).ok()?,
        };
        let token = raw.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

/// Token sources in priority order: per-user file, default file, config, env.
pub fn token_sources(config: &AppConfig, user: Option<&str>) -> Vec<TokenSource> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let mut sources = Vec::new();
    if let Some(user) = user {
        sources.push(TokenSource::File(
            home.join(format!(".relay-token-{}", user.to_lowercase())),
        ));
    }
    sources.push(TokenSource::File(home.join(".relay-token")));
    sources.push(TokenSource::Inline(config.endpoint.token.clone()));
    sources.push(TokenSource::Env(config.endpoint.token_env.clone()));
    sources
}

/// First token any source yields.
pub fn resolve_token(sources: &[TokenSource]) -> Option<String> {
    sources.iter().find_map(TokenSource::lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("default-model"));
        assert!(toml_str.contains("fuzzy_threshold"));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.endpoint.model, config.endpoint.model);
        assert_eq!(parsed.resolver.fuzzy_threshold, 0.6);
        assert!(parsed.agent.tools_enabled);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: AppConfig = toml::from_str("[endpoint]\nmodel = \"big-one\"\n").unwrap();
        assert_eq!(parsed.endpoint.model, "big-one");
        assert_eq!(parsed.endpoint.timeout_secs, 300);
        assert_eq!(parsed.resolver.fuzzy_threshold, 0.6);
    }

    #[test]
    fn test_registry_dir_override() {
        let config = AppConfig {
            registry_dir: Some(PathBuf::from("/tmp/relay-registries")),
            ..Default::default()
        };
        assert_eq!(config.registry_dir(), PathBuf::from("/tmp/relay-registries"));
    }

    #[test]
    fn test_token_lookup_short_circuits_in_order() {
        let tmp = TempDir::new().unwrap();
        let empty = tmp.path().join("empty");
        std::fs::write(&empty, "   \n").unwrap();
        let good = tmp.path().join("good");
        std::fs::write(&good, "tok-from-file\n").unwrap();

        let sources = vec![
            TokenSource::File(tmp.path().join("missing")),
            TokenSource::File(empty),
            TokenSource::Inline(None),
            TokenSource::File(good),
            TokenSource::Inline(Some("never-reached".into())),
        ];
        assert_eq!(resolve_token(&sources).as_deref(), Some("tok-from-file"));
    }

    #[test]
    fn test_token_lookup_inline_fallback() {
        let sources = vec![
            TokenSource::Env("RELAY_TEST_TOKEN_THAT_IS_NOT_SET".into()),
            TokenSource::Inline(Some("inline".into())),
        ];
        assert_eq!(resolve_token(&sources).as_deref(), Some("inline"));
        assert_eq!(resolve_token(&[]), None);
    }

    #[test]
    fn test_user_token_file_comes_first() {
        let config = AppConfig::default();
        let sources = token_sources(&config, Some("Kim"));
        match &sources[0] {
            TokenSource::File(path) => assert!(path.ends_with(".relay-token-kim")),
            other => panic!("unexpected first source: {:?}", other),
        }
        assert_eq!(sources.len(), 4);
    }
}
