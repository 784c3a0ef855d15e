//! Classifies one line of operator input.
//!
//! Priority is fixed: the picker marker, then meta directives, then the
//! registration grammar, then literal command/tool shortcuts, then fuzzy
//! suggestions. Only lines that are not shortcut-shaped reach the model
//! verbatim.

use crate::fuzzy;
use crate::registry::Registry;
use regex::Regex;
use std::sync::OnceLock;

/// Built-in directive names with a one-line description each.
pub const META_DIRECTIVES: [(&str, &str); 10] = [
    ("models", "list available models on the server"),
    ("run", "swap the active model      /run <model>"),
    ("addcmd", "add a command shortcut     /addcmd \"name\" \"expansion\""),
    ("addtool", "add a callable tool        /addtool \"name\" \"desc\" \"cmd {input}\""),
    ("addspecialty", "add a persona              /addspecialty \"Name\" \"instruction\""),
    ("spesh", "activate a persona         /spesh <Name> | off"),
    ("list", "show registered commands, tools and personas"),
    ("clear", "clear the screen"),
    ("help", "show this help"),
    ("exit", "quit"),
];

/// Which namespace a name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Meta,
    Command,
    Tool,
    Persona,
}

/// A registered (or built-in) name offered back to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub name: String,
    pub kind: NameKind,
}

impl Suggestion {
    /// The input line that would invoke this name.
    pub fn directive(&self) -> String {
        match self.kind {
            NameKind::Persona => format!("/spesh {}", self.name),
            _ => format!("/{}", self.name),
        }
    }
}

/// Session-level directives that never reach the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaDirective {
    Exit,
    Clear,
    List,
    Help,
    Models,
    RunModel(String),
    /// `/spesh` with an optional persona name; `None` opens the picker.
    Persona(Option<String>),
}

/// A validated-shape registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Command {
        name: String,
        expansion: String,
    },
    Tool {
        name: String,
        description: String,
        template: String,
    },
    Persona {
        name: String,
        instruction: String,
    },
}

/// Directives with a fixed grammar, used for usage messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    AddCommand,
    AddTool,
    AddPersona,
    RunModel,
}

impl DirectiveKind {
    pub fn usage(self) -> &'static str {
        match self {
            DirectiveKind::AddCommand => "/addcmd \"name\" \"what it does\"",
            DirectiveKind::AddTool => "/addtool \"name\" \"describe\" \"shell cmd ({input} = arg)\"",
            DirectiveKind::AddPersona => "/addspecialty \"Name\" \"describe the persona\"",
            DirectiveKind::RunModel => "/run <model-name>",
        }
    }

    fn field_count(self) -> usize {
        match self {
            DirectiveKind::AddTool => 3,
            _ => 2,
        }
    }
}

/// What to do with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Bare `/`: open the interactive picker.
    Picker,
    Meta(MetaDirective),
    Register(Registration),
    /// A directive whose grammar did not match. Registries stay untouched.
    Usage(DirectiveKind),
    /// A literal shortcut. `text` is the effective model input.
    Expand { name: String, text: String },
    /// Unknown shortcut: the nearest name, if any was close enough.
    /// The input is dropped.
    Suggest(Option<Suggestion>),
    /// Free text for the model.
    PassThrough(String),
}

fn shortcut_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/([A-Za-z0-9_][A-Za-z0-9_-]*)(?:\s+(.*))?$").expect("valid shortcut regex"))
}

fn shortcut_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^/(\w[\w-]*)").expect("valid shortcut word regex"))
}

/// Classify `line` against the registries.
pub fn resolve(line: &str, registry: &Registry, fuzzy_threshold: f64) -> Resolution {
    let line = line.trim();
    if line == "/" {
        return Resolution::Picker;
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    if let Some(resolution) = resolve_directive(&head.to_lowercase(), rest) {
        return resolution;
    }

    if let Some(caps) = shortcut_re().captures(line) {
        let word = caps[1].to_lowercase();
        let trailing = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        if let Some(body) = registry.command(&word) {
            return Resolution::Expand {
                text: join_trailing(body, trailing),
                name: word,
            };
        }
        if registry.tool(&word).is_some() {
            return Resolution::Expand {
                text: join_trailing(&format!("Use the {} tool", word), trailing),
                name: word,
            };
        }
    }

    if let Some(caps) = shortcut_word_re().captures(line) {
        return Resolution::Suggest(suggest(&caps[1], registry, fuzzy_threshold));
    }

    Resolution::PassThrough(line.to_string())
}

fn resolve_directive(head: &str, rest: &str) -> Option<Resolution> {
    let meta = |m| Some(Resolution::Meta(m));
    match head {
        "exit" | "quit" | "q" if rest.is_empty() => meta(MetaDirective::Exit),
        "/exit" | "/quit" | "/q" => meta(MetaDirective::Exit),
        "clear" if rest.is_empty() => meta(MetaDirective::Clear),
        "/clear" => meta(MetaDirective::Clear),
        "models" if rest.is_empty() => meta(MetaDirective::Models),
        "/models" => meta(MetaDirective::Models),
        "/list" | "/listcmds" | "/listtools" => meta(MetaDirective::List),
        "/help" | "/?" => meta(MetaDirective::Help),
        "/run" if rest.is_empty() => Some(Resolution::Usage(DirectiveKind::RunModel)),
        "/run" => meta(MetaDirective::RunModel(rest.to_string())),
        "/spesh" => meta(MetaDirective::Persona((!rest.is_empty()).then(|| rest.to_string()))),
        "/addcmd" => Some(registration(DirectiveKind::AddCommand, rest)),
        "/addtool" => Some(registration(DirectiveKind::AddTool, rest)),
        "/addspecialty" => Some(registration(DirectiveKind::AddPersona, rest)),
        _ => None,
    }
}

fn registration(kind: DirectiveKind, rest: &str) -> Resolution {
    let fields = match quoted_fields(rest) {
        Some(fields) if fields.len() == kind.field_count() => fields,
        _ => return Resolution::Usage(kind),
    };
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Resolution::Usage(kind);
    }

    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();
    let registration = match kind {
        DirectiveKind::AddCommand => Registration::Command {
            name: next(),
            expansion: next(),
        },
        DirectiveKind::AddTool => Registration::Tool {
            name: next(),
            description: next(),
            template: next(),
        },
        DirectiveKind::AddPersona => Registration::Persona {
            name: next(),
            instruction: next(),
        },
        DirectiveKind::RunModel => return Resolution::Usage(kind),
    };
    Resolution::Register(registration)
}

/// Split `"a" "b c" "d"` into its quoted fields.
///
/// Inner quotes cannot be escaped: a field followed by anything other than
/// whitespace or end of input makes the whole line unparseable.
pub fn quoted_fields(input: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut rest = input.trim_start();
    while !rest.is_empty() {
        let body = rest.strip_prefix('"')?;
        let end = body.find('"')?;
        fields.push(body[..end].to_string());
        let after = &body[end + 1..];
        if !after.is_empty() && !after.starts_with(char::is_whitespace) {
            return None;
        }
        rest = after.trim_start();
    }
    Some(fields)
}

fn join_trailing(body: &str, trailing: &str) -> String {
    if trailing.is_empty() {
        body.to_string()
    } else {
        format!("{}: {}", body, trailing)
    }
}

/// Every name a shortcut could refer to, in suggestion priority order.
pub fn known_names(registry: &Registry) -> Vec<Suggestion> {
    let entry = |name: &str, kind| Suggestion {
        name: name.to_string(),
        kind,
    };
    META_DIRECTIVES
        .iter()
        .map(|(name, _)| entry(*name, NameKind::Meta))
        .chain(registry.commands().keys().map(|k| entry(k.as_str(), NameKind::Command)))
        .chain(registry.tools().keys().map(|k| entry(k.as_str(), NameKind::Tool)))
        .chain(registry.personas().keys().map(|k| entry(k.as_str(), NameKind::Persona)))
        .collect()
}

/// Nearest known name to `word`.
pub fn suggest(word: &str, registry: &Registry, threshold: f64) -> Option<Suggestion> {
    fuzzy::closest(word, known_names(registry), |s| s.name.as_str(), threshold)
}
