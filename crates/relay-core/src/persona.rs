//! Persona overlay: at most one named instruction spliced into the system turn.

use std::collections::BTreeMap;

/// Reserved persona name that deactivates the current persona.
pub const PERSONA_OFF: &str = "off";

/// The persona currently spliced into the system turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePersona {
    pub name: String,
    pub instruction: String,
}

/// Look up a persona for activation.
///
/// Returns the persona to activate (`None` to deactivate) and whether the name
/// was found. `off` always deactivates and always reports found. An exact
/// match wins over a case-insensitive one.
pub fn activate(name: &str, personas: &BTreeMap<String, String>) -> (Option<ActivePersona>, bool) {
    let name = name.trim();
    if name == PERSONA_OFF {
        return (None, true);
    }

    let found = personas.get_key_value(name).or_else(|| {
        let lowered = name.to_lowercase();
        personas.iter().find(|(k, _)| k.to_lowercase() == lowered)
    });

    match found {
        Some((key, instruction)) => (
            Some(ActivePersona {
                name: key.clone(),
                instruction: instruction.clone(),
            }),
            true,
        ),
        None => (None, false),
    }
}

/// The system instruction for `base` with `persona` appended, if any.
pub fn compose_system_prompt(base: &str, persona: Option<&ActivePersona>) -> String {
    match persona {
        Some(p) => format!("{}\n\nACTIVE PERSONA: {}\n{}", base, p.name, p.instruction),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn personas() -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("Auditor".to_string(), "Be terse and skeptical.".to_string());
        map.insert("Poet".to_string(), "Answer in verse.".to_string());
        map
    }

    #[test]
    fn test_exact_match() {
        let (persona, found) = activate("Auditor", &personas());
        assert!(found);
        assert_eq!(persona.unwrap().instruction, "Be terse and skeptical.");
    }

    #[test]
    fn test_case_insensitive_fallback_keeps_stored_name() {
        let (persona, found) = activate("auditor", &personas());
        assert!(found);
        assert_eq!(persona.unwrap().name, "Auditor");
    }

    #[test]
    fn test_off_always_found() {
        assert_eq!(activate("off", &BTreeMap::new()), (None, true));
    }

    #[test]
    fn test_unknown_not_found() {
        assert_eq!(activate("Ghost", &personas()), (None, false));
    }

    #[test]
    fn test_compose() {
        let base = "You are helpful.";
        assert_eq!(compose_system_prompt(base, None), base);

        let (persona, _) = activate("Poet", &personas());
        let composed = compose_system_prompt(base, persona.as_ref());
        assert!(composed.starts_with(base));
        assert!(composed.contains("Poet"));
        assert!(composed.ends_with("Answer in verse."));
    }
}
