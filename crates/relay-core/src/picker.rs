//! Selection state for the interactive shortcut picker. Terminal handling
//! lives in the binary; this module only decides what is visible and what
//! was chosen.

use crate::persona::PERSONA_OFF;
use crate::registry::Registry;
use crate::resolver::{NameKind, META_DIRECTIVES};

/// Persona instructions are cut to this many characters in menus.
pub const PERSONA_PREVIEW_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOption {
    pub name: String,
    pub description: String,
    pub kind: NameKind,
}

impl PickerOption {
    fn new(name: &str, description: &str, kind: NameKind) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
        }
    }

    /// Case-insensitive substring match on name or description.
    pub fn matches(&self, query: &str) -> bool {
        if query.is_empty() {
            return true;
        }
        let query = query.to_lowercase();
        self.name.to_lowercase().contains(&query) || self.description.to_lowercase().contains(&query)
    }

    /// The input line this option stands for.
    pub fn directive(&self) -> String {
        match self.kind {
            NameKind::Persona => format!("/spesh {}", self.name),
            _ => format!("/{}", self.name),
        }
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PERSONA_PREVIEW_CHARS).collect()
}

/// Meta directives, then commands, tools and personas.
pub fn main_menu(registry: &Registry) -> Vec<PickerOption> {
    let meta = META_DIRECTIVES
        .iter()
        .map(|(name, desc)| PickerOption::new(name, desc, NameKind::Meta));
    let commands = registry
        .commands()
        .iter()
        .map(|(name, body)| PickerOption::new(name, body, NameKind::Command));
    let tools = registry
        .tools()
        .iter()
        .map(|(name, spec)| PickerOption::new(name, &spec.description, NameKind::Tool));
    let personas = registry
        .personas()
        .iter()
        .map(|(name, text)| PickerOption::new(name, &preview(text), NameKind::Persona));
    meta.chain(commands).chain(tools).chain(personas).collect()
}

/// Personas plus a trailing entry that deactivates the current one.
pub fn persona_menu(registry: &Registry) -> Vec<PickerOption> {
    registry
        .personas()
        .iter()
        .map(|(name, text)| PickerOption::new(name, &preview(text), NameKind::Persona))
        .chain(std::iter::once(PickerOption::new(
            PERSONA_OFF,
            "deactivate current persona",
            NameKind::Persona,
        )))
        .collect()
}

/// One keystroke, already decoded by the terminal driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKey {
    Char(char),
    Backspace,
    Up,
    Down,
    Enter,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerStep {
    Continue,
    Selected(PickerOption),
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PickerState {
    options: Vec<PickerOption>,
    query: String,
    cursor: usize,
}

impl PickerState {
    pub fn new(options: Vec<PickerOption>) -> Self {
        Self {
            options,
            query: String::new(),
            cursor: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn visible(&self) -> Vec<&PickerOption> {
        self.options.iter().filter(|o| o.matches(&self.query)).collect()
    }

    pub fn handle(&mut self, key: PickerKey) -> PickerStep {
        match key {
            PickerKey::Char(c) => {
                self.query.push(c);
                self.cursor = 0;
            }
            PickerKey::Backspace => {
                self.query.pop();
                self.cursor = 0;
            }
            PickerKey::Up => self.cursor = self.cursor.saturating_sub(1),
            PickerKey::Down => {
                let last = self.visible().len().saturating_sub(1);
                self.cursor = (self.cursor + 1).min(last);
            }
            PickerKey::Enter => {
                return match self.visible().get(self.cursor) {
                    Some(option) => PickerStep::Selected((*option).clone()),
                    None => PickerStep::Cancelled,
                };
            }
            PickerKey::Cancel => return PickerStep::Cancelled,
        }
        PickerStep::Continue
    }
}
