//! Persistent registries for shortcut commands, shell-backed tools and personas.
//!
//! Each registry is an independent JSON object on disk, keyed by name. Loads
//! never fail the caller: a missing or corrupt file is an empty registry, and
//! individually malformed entries are skipped. Saves rewrite the whole file,
//! so the last writer wins.

use crate::error::{AgentError, Result};
use crate::tool_schema::BuiltinCapability;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Placeholder substituted with the model-supplied `input` argument.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Which registry a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    Commands,
    Tools,
    Personas,
}

impl RegistryKind {
    pub fn file_name(self) -> &'static str {
        match self {
            RegistryKind::Commands => "commands.json",
            RegistryKind::Tools => "tools.json",
            RegistryKind::Personas => "personas.json",
        }
    }
}

/// JSON-file backing for the three registries.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    dir: PathBuf,
}

impl RegistryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: RegistryKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Load one registry. Unreadable files load as empty; entries that do not
    /// deserialize into `V` are dropped with a warning.
    pub fn load<V: DeserializeOwned>(&self, kind: RegistryKind) -> BTreeMap<String, V> {
        let path = self.path(kind);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No {} registry at {:?}: {}", kind.file_name(), path, e);
                return BTreeMap::new();
            }
        };
        let entries: BTreeMap<String, Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring corrupt registry {:?}: {}", path, e);
                return BTreeMap::new();
            }
        };

        entries
            .into_iter()
            .filter_map(|(name, value)| match serde_json::from_value(value) {
                Ok(v) => Some((name, v)),
                Err(e) => {
                    warn!("Skipping malformed {} entry '{}': {}", kind.file_name(), name, e);
                    None
                }
            })
            .collect()
    }

    /// Overwrite one registry with `entries`.
    pub fn save<V: Serialize>(&self, kind: RegistryKind, entries: &BTreeMap<String, V>) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(self.path(kind), json)?;
        Ok(())
    }
}

/// The shell command behind a registered tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellTemplate {
    /// Runs as-is; the model passes no argument.
    Fixed(String),
    /// Contains exactly one `{input}` placeholder.
    WithInput(String),
}

impl ShellTemplate {
    pub fn parse(template: &str) -> std::result::Result<Self, String> {
        let template = template.trim();
        if template.is_empty() {
            return Err("shell template is empty".into());
        }
        match template.matches(INPUT_PLACEHOLDER).count() {
            0 => Ok(ShellTemplate::Fixed(template.to_string())),
            1 => Ok(ShellTemplate::WithInput(template.to_string())),
            n => Err(format!(
                "shell template has {} {} placeholders, at most one is allowed",
                n, INPUT_PLACEHOLDER
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ShellTemplate::Fixed(t) | ShellTemplate::WithInput(t) => t,
        }
    }

    pub fn has_placeholder(&self) -> bool {
        matches!(self, ShellTemplate::WithInput(_))
    }

    /// Substitute `input` into the placeholder. Without an input the template
    /// is returned unchanged.
    pub fn render(&self, input: Option<&str>) -> String {
        match (self, input) {
            (ShellTemplate::WithInput(t), Some(input)) => t.replacen(INPUT_PLACEHOLDER, input, 1),
            _ => self.as_str().to_string(),
        }
    }
}

/// A registered tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ToolRecord", into = "ToolRecord")]
pub struct ToolSpec {
    pub description: String,
    pub template: ShellTemplate,
}

impl ToolSpec {
    pub fn new(description: &str, template: &str) -> std::result::Result<Self, String> {
        let description = description.trim();
        if description.is_empty() {
            return Err("description is empty".into());
        }
        Ok(Self {
            description: description.to_string(),
            template: ShellTemplate::parse(template)?,
        })
    }

    pub fn has_placeholder(&self) -> bool {
        self.template.has_placeholder()
    }
}

/// On-disk shape of a tool entry. `has_placeholder` is written for external
/// readers and recomputed from the template on load.
#[derive(Serialize, Deserialize)]
struct ToolRecord {
    description: String,
    shell_template: String,
    #[serde(default)]
    has_placeholder: bool,
}

impl TryFrom<ToolRecord> for ToolSpec {
    type Error = String;

    fn try_from(record: ToolRecord) -> std::result::Result<Self, Self::Error> {
        ToolSpec::new(&record.description, &record.shell_template)
    }
}

impl From<ToolSpec> for ToolRecord {
    fn from(spec: ToolSpec) -> Self {
        ToolRecord {
            has_placeholder: spec.has_placeholder(),
            shell_template: spec.template.as_str().to_string(),
            description: spec.description,
        }
    }
}

/// Check that a command or tool name can be typed as `/name`.
pub fn validate_shortcut_name(name: &str) -> std::result::Result<String, String> {
    let name = name.trim().to_lowercase();
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("name is empty".into()),
        Some(c) if !(c.is_ascii_alphanumeric() || c == '_') => {
            return Err("name must start with an ASCII letter, digit or underscore".into())
        }
        _ => {}
    }
    if chars.any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-')) {
        return Err("name may only contain ASCII letters, digits, '_' and '-'".into());
    }
    Ok(name)
}

/// In-memory view of all three registries, persisted through a `RegistryStore`.
#[derive(Debug, Clone)]
pub struct Registry {
    store: RegistryStore,
    commands: BTreeMap<String, String>,
    tools: BTreeMap<String, ToolSpec>,
    personas: BTreeMap<String, String>,
}

impl Registry {
    /// Load every registry from the store.
    pub fn load(store: RegistryStore) -> Self {
        let commands = store.load(RegistryKind::Commands);
        let tools = store.load(RegistryKind::Tools);
        let personas = store.load(RegistryKind::Personas);
        debug!(
            "Loaded {} commands, {} tools, {} personas from {:?}",
            commands.len(),
            tools.len(),
            personas.len(),
            store.dir()
        );
        Self {
            store,
            commands,
            tools,
            personas,
        }
    }

    pub fn commands(&self) -> &BTreeMap<String, String> {
        &self.commands
    }

    pub fn tools(&self) -> &BTreeMap<String, ToolSpec> {
        &self.tools
    }

    pub fn personas(&self) -> &BTreeMap<String, String> {
        &self.personas
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.tools.is_empty() && self.personas.is_empty()
    }

    /// Case-insensitive command lookup.
    pub fn command(&self, name: &str) -> Option<&str> {
        self.commands.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Case-insensitive tool lookup.
    pub fn tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(&name.to_lowercase())
    }

    /// Insert or replace a command and persist the command registry.
    /// Memory is only updated once the file is written. Returns the
    /// normalized name.
    pub fn add_command(&mut self, name: &str, expansion: &str) -> Result<String> {
        let name = validate_shortcut_name(name).map_err(|m| invalid(name, m))?;
        let expansion = expansion.trim();
        if expansion.is_empty() {
            return Err(invalid(&name, "expansion is empty".into()));
        }
        let mut commands = self.commands.clone();
        commands.insert(name.clone(), expansion.to_string());
        self.store.save(RegistryKind::Commands, &commands)?;
        self.commands = commands;
        Ok(name)
    }

    /// Insert or replace a tool and persist the tool registry.
    /// Returns the normalized name.
    pub fn add_tool(&mut self, name: &str, description: &str, template: &str) -> Result<String> {
        let name = validate_shortcut_name(name).map_err(|m| invalid(name, m))?;
        if BuiltinCapability::from_name(&name).is_some() {
            return Err(invalid(&name, "name is reserved for a built-in capability".into()));
        }
        let spec = ToolSpec::new(description, template).map_err(|m| invalid(&name, m))?;
        let mut tools = self.tools.clone();
        tools.insert(name.clone(), spec);
        self.store.save(RegistryKind::Tools, &tools)?;
        self.tools = tools;
        Ok(name)
    }

    /// Insert or replace a persona and persist the persona registry.
    ///
    /// Names keep their case, but an existing persona whose name differs only
    /// by case is replaced.
    pub fn add_persona(&mut self, name: &str, instruction: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid(name, "name is empty".into()));
        }
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(invalid(name, "persona instruction is empty".into()));
        }
        let lowered = name.to_lowercase();
        let mut personas = self.personas.clone();
        personas.retain(|k, _| k.to_lowercase() != lowered);
        personas.insert(name.to_string(), instruction.to_string());
        self.store.save(RegistryKind::Personas, &personas)?;
        self.personas = personas;
        Ok(name.to_string())
    }
}

fn invalid(name: &str, message: String) -> AgentError {
    AgentError::InvalidEntry {
        name: name.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(tmp: &TempDir) -> Registry {
        Registry::load(RegistryStore::new(tmp.path()))
    }

    #[test]
    fn test_missing_files_load_empty() {
        let tmp = TempDir::new().unwrap();
        let reg = registry(&tmp);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("commands.json"), "{ not json").unwrap();
        let reg = registry(&tmp);
        assert!(reg.commands().is_empty());
    }

    #[test]
    fn test_command_persists_across_reload() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry(&tmp);
        let name = reg.add_command("Deploy", "ship the current branch").unwrap();
        assert_eq!(name, "deploy");

        let reloaded = registry(&tmp);
        assert_eq!(reloaded.command("deploy"), Some("ship the current branch"));
        assert_eq!(reloaded.command("DEPLOY"), Some("ship the current branch"));
    }

    #[test]
    fn test_reregistration_overwrites() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry(&tmp);
        reg.add_command("deploy", "first").unwrap();
        reg.add_command("deploy", "second").unwrap();

        let reloaded = registry(&tmp);
        assert_eq!(reloaded.commands().len(), 1);
        assert_eq!(reloaded.command("deploy"), Some("second"));
    }

    #[test]
    fn test_invalid_command_names_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry(&tmp);
        assert!(reg.add_command("two words", "x").is_err());
        assert!(reg.add_command("a/b", "x").is_err());
        assert!(reg.add_command("-dash", "x").is_err());
        assert!(reg.add_command("ok", "   ").is_err());
        assert!(reg.add_command("café", "x").is_err());
        assert!(reg.add_tool("données", "data", "ls").is_err());
        assert!(reg.add_tool("naïve", "data", "ls").is_err());
        assert!(reg.commands().is_empty());
        assert!(reg.tools().is_empty());
        assert!(!tmp.path().join("commands.json").exists());
    }

    #[test]
    fn test_tool_placeholder_detection() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry(&tmp);
        reg.add_tool("disk", "disk usage", "df -h").unwrap();
        reg.add_tool("grep-logs", "search logs", "grep -r {input} /var/log").unwrap();

        assert!(!reg.tool("disk").unwrap().has_placeholder());
        assert!(reg.tool("grep-logs").unwrap().has_placeholder());

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(tmp.path().join("tools.json")).unwrap())
                .unwrap();
        assert_eq!(raw["grep-logs"]["has_placeholder"], true);
        assert_eq!(raw["disk"]["shell_template"], "df -h");
    }

    #[test]
    fn test_tool_validation() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry(&tmp);
        assert!(reg.add_tool("exec", "shadow", "ls").is_err());
        assert!(reg.add_tool("twice", "bad", "echo {input} {input}").is_err());
        assert!(reg.add_tool("nodesc", " ", "ls").is_err());
        assert!(reg.tools().is_empty());
    }

    #[test]
    fn test_malformed_tool_entry_skipped_on_load() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("tools.json"),
            r#"{
                "good": {"description": "uptime", "shell_template": "uptime"},
                "bad": {"description": "no template"}
            }"#,
        )
        .unwrap();
        let reg = registry(&tmp);
        assert_eq!(reg.tools().len(), 1);
        assert!(reg.tool("good").is_some());
    }

    #[test]
    fn test_persona_case_insensitive_replace() {
        let tmp = TempDir::new().unwrap();
        let mut reg = registry(&tmp);
        reg.add_persona("Auditor", "Be terse.").unwrap();
        reg.add_persona("auditor", "Be terse and skeptical.").unwrap();

        let reloaded = registry(&tmp);
        assert_eq!(reloaded.personas().len(), 1);
        assert_eq!(
            reloaded.personas().get("auditor").map(String::as_str),
            Some("Be terse and skeptical.")
        );
    }

    #[test]
    fn test_template_render() {
        let t = ShellTemplate::parse("grep {input} app.log").unwrap();
        assert_eq!(t.render(Some("ERROR")), "grep ERROR app.log");
        assert_eq!(t.render(None), "grep {input} app.log");

        let f = ShellTemplate::parse("uptime").unwrap();
        assert_eq!(f.render(Some("ignored")), "uptime");
    }

    #[test]
    fn test_failed_save_leaves_registry_unchanged() {
        let tmp = TempDir::new().unwrap();
        let blocked = tmp.path().join("blocked");
        std::fs::write(&blocked, "not a directory").unwrap();
        let mut reg = Registry::load(RegistryStore::new(&blocked));

        assert!(reg.add_command("deploy", "ship it").is_err());
        assert!(reg.add_tool("disk", "disk usage", "df -h").is_err());
        assert!(reg.add_persona("Auditor", "Be terse.").is_err());
        assert!(reg.command("deploy").is_none());
        assert!(reg.tool("disk").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_save_is_total_overwrite() {
        let tmp = TempDir::new().unwrap();
        let store = RegistryStore::new(tmp.path());
        let mut first = BTreeMap::new();
        first.insert("a".to_string(), "1".to_string());
        first.insert("b".to_string(), "2".to_string());
        store.save(RegistryKind::Commands, &first).unwrap();

        let mut second = BTreeMap::new();
        second.insert("c".to_string(), "3".to_string());
        store.save(RegistryKind::Commands, &second).unwrap();

        let loaded: BTreeMap<String, String> = store.load(RegistryKind::Commands);
        assert_eq!(loaded, second);
    }
}
