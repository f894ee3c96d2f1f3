//! Conversation transcript with a single-open-turn streaming invariant

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Agent,
}

/// A single chat turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    /// Model reasoning accumulated while the turn streamed. Survives text
    /// replacement so the thought trail stays visible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            reasoning: None,
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
            reasoning: None,
        }
    }
}

/// Append-only transcript. At most one Agent turn is open for streaming at
/// a time; deltas and text replacement apply to that turn only.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
    open: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a closed User turn, returning its index
    pub fn push_user(&mut self, text: impl Into<String>) -> usize {
        self.turns.push(ConversationTurn::user(text));
        self.turns.len() - 1
    }

    /// Append a closed Agent turn, returning its index
    pub fn push_agent(&mut self, text: impl Into<String>) -> usize {
        self.turns.push(ConversationTurn::agent(text));
        self.turns.len() - 1
    }

    /// Open an Agent turn for streaming. Returns the existing open turn's
    /// index if one is already active.
    pub fn open_agent(&mut self, text: impl Into<String>) -> usize {
        if let Some(index) = self.open {
            debug_assert!(false, "transcript already has an open turn");
            return index;
        }
        let index = self.push_agent(text);
        self.open = Some(index);
        index
    }

    pub fn open_index(&self) -> Option<usize> {
        self.open
    }

    /// Append an answer delta to the open turn
    pub fn append_answer(&mut self, delta: &str) {
        if let Some(index) = self.open {
            self.turns[index].text.push_str(delta);
        }
    }

    /// Append a reasoning delta to the open turn
    pub fn append_reasoning(&mut self, delta: &str) {
        if let Some(index) = self.open {
            self.turns[index]
                .reasoning
                .get_or_insert_with(String::new)
                .push_str(delta);
        }
    }

    /// Replace the open turn's text, keeping its accumulated reasoning
    pub fn replace_open_text(&mut self, text: impl Into<String>) {
        if let Some(index) = self.open {
            self.turns[index].text = text.into();
        }
    }

    /// Close the open turn, returning its index
    pub fn close_open(&mut self) -> Option<usize> {
        self.open.take()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&ConversationTurn> {
        self.turns.get(index)
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Short title for a reasoning block: the last **bolded** phrase the model
/// wrote, or a generic label when there is none.
pub fn reasoning_title(reasoning: &str) -> String {
    static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
    BOLD.captures_iter(reasoning)
        .last()
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| "Thinking Process".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_returns_sequential_indices() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.push_agent("hello"), 0);
        assert_eq!(transcript.push_user("make a cup"), 1);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.turns()[1].speaker, Speaker::User);
    }

    #[test]
    fn deltas_accumulate_on_the_open_turn() {
        let mut transcript = Transcript::new();
        let index = transcript.open_agent("");
        transcript.append_answer("cube(");
        transcript.append_answer("10);");
        transcript.append_reasoning("first ");
        transcript.append_reasoning("thought");
        assert_eq!(transcript.turns()[index].text, "cube(10);");
        assert_eq!(
            transcript.turns()[index].reasoning.as_deref(),
            Some("first thought")
        );
    }

    #[test]
    fn deltas_without_an_open_turn_are_ignored() {
        let mut transcript = Transcript::new();
        transcript.push_agent("closed");
        transcript.append_answer("ignored");
        assert_eq!(transcript.turns()[0].text, "closed");
    }

    #[test]
    fn replace_keeps_reasoning() {
        let mut transcript = Transcript::new();
        transcript.open_agent("");
        transcript.append_answer("raw code");
        transcript.append_reasoning("the plan");
        transcript.replace_open_text("✓ Code generated successfully");
        let index = transcript.close_open().unwrap();
        assert_eq!(transcript.turns()[index].text, "✓ Code generated successfully");
        assert_eq!(transcript.turns()[index].reasoning.as_deref(), Some("the plan"));
    }

    #[test]
    fn close_clears_the_open_slot() {
        let mut transcript = Transcript::new();
        transcript.open_agent("streaming");
        assert!(transcript.open_index().is_some());
        transcript.close_open();
        assert!(transcript.open_index().is_none());
        transcript.append_answer("ignored");
        assert_eq!(transcript.turns()[0].text, "streaming");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "already has an open turn")]
    fn double_open_trips_the_invariant() {
        let mut transcript = Transcript::new();
        transcript.open_agent("first");
        transcript.open_agent("second");
    }

    #[test]
    fn reasoning_title_picks_the_last_bold_phrase() {
        let title = reasoning_title(
            "**Sizing the base**\nI will start with a cylinder.\n\n**Final Shape**\nA cup with a handle.",
        );
        assert_eq!(title, "Final Shape");
    }

    #[test]
    fn reasoning_title_trims_whitespace() {
        assert_eq!(reasoning_title("** Handle Placement **"), "Handle Placement");
    }

    #[test]
    fn reasoning_title_falls_back_without_bold() {
        assert_eq!(reasoning_title("no markdown here"), "Thinking Process");
    }
}
