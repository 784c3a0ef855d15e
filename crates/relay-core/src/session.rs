use crate::persona::{compose_system_prompt, ActivePersona};
use crate::types::{Message, Role};

/// Everything one interactive session owns: the active model, the base
/// instruction, the active persona and the running conversation.
///
/// The conversation always starts with the system turn.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub model: String,
    base_prompt: String,
    persona: Option<ActivePersona>,
    conversation: Vec<Message>,
}

impl SessionState {
    pub fn new(model: impl Into<String>, base_prompt: impl Into<String>) -> Self {
        let base_prompt = base_prompt.into();
        Self {
            model: model.into(),
            conversation: vec![Message::system(base_prompt.clone())],
            base_prompt,
            persona: None,
        }
    }

    pub fn persona(&self) -> Option<&ActivePersona> {
        self.persona.as_ref()
    }

    /// The system instruction as currently composed.
    pub fn system_prompt(&self) -> String {
        compose_system_prompt(&self.base_prompt, self.persona.as_ref())
    }

    /// Swap the active persona and regenerate the system turn in place.
    /// Later turns are left as they are.
    pub fn set_persona(&mut self, persona: Option<ActivePersona>) {
        self.persona = persona;
        let system = Message::system(self.system_prompt());
        match self.conversation.first_mut() {
            Some(first) if first.role == Role::System => *first = system,
            _ => self.conversation.insert(0, system),
        }
    }

    pub fn conversation_mut(&mut self) -> &mut Vec<Message> {
        &mut self.conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "You are a careful operator assistant.";

    fn auditor() -> ActivePersona {
        ActivePersona {
            name: "Auditor".into(),
            instruction: "Be terse and skeptical.".into(),
        }
    }

    #[test]
    fn test_new_session_has_base_system_turn() {
        let session = SessionState::new("m", BASE);
        assert_eq!(session.conversation.len(), 1);
        assert_eq!(session.conversation[0].role, Role::System);
        assert_eq!(session.conversation[0].content, BASE);
    }

    #[test]
    fn test_persona_off_reverts_to_base_exactly() {
        let mut session = SessionState::new("m", BASE);
        session.set_persona(Some(auditor()));
        assert!(session.conversation[0].content.contains("Be terse and skeptical."));

        session.set_persona(None);
        assert_eq!(session.conversation[0].content, BASE);
        assert_eq!(session.system_prompt(), BASE);
        assert!(session.persona().is_none());
    }

    #[test]
    fn test_persona_change_keeps_later_turns() {
        let mut session = SessionState::new("m", BASE);
        session.conversation_mut().push(Message::user("hi"));
        session.conversation_mut().push(Message::assistant("hello"));

        session.set_persona(Some(auditor()));
        let conv = &session.conversation;
        assert_eq!(conv.len(), 3);
        assert_eq!(conv.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(conv[1].content, "hi");
        assert_eq!(conv[2].content, "hello");
    }
}
