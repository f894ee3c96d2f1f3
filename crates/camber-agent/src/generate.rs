//! Generation adapter: transcript in, streamed OpenSCAD code out

use async_trait::async_trait;
use camber_ai::stream::MessageEventStream;
use camber_ai::{Content, Context, GeminiClient, GenerationOptions, Message, Model};

use crate::mode::Mode;
use crate::ports::Snapshot;
use crate::transcript::{ConversationTurn, Speaker};

/// Sampling temperature for code generation
const GENERATION_TEMPERATURE: f32 = 0.1;

/// Streams model responses for generation cycles
#[async_trait]
pub trait Generator: Send + Sync {
    async fn stream(&self, api_key: &str, context: Context) -> camber_ai::Result<MessageEventStream>;
}

/// Generator backed by the Gemini API. A client is built per call so a
/// key changed mid-session is honored.
pub struct GeminiGenerator {
    model: Model,
}

impl GeminiGenerator {
    pub fn new(model: Model) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn stream(&self, api_key: &str, context: Context) -> camber_ai::Result<MessageEventStream> {
        let client = GeminiClient::new(api_key);
        let options = GenerationOptions {
            temperature: Some(GENERATION_TEMPERATURE),
            include_thoughts: true,
            ..Default::default()
        };
        client.stream(&self.model, &context, &options)
    }
}

/// Build the request context for a generation cycle. Every transcript turn
/// is sent; the current snapshot is attached to the final message when
/// that message is a user turn, so the model sees what its last code
/// actually rendered as.
pub fn build_context(
    mode: Mode,
    current_code: &str,
    turns: &[ConversationTurn],
    snapshot: Option<&Snapshot>,
) -> Context {
    let mut context = Context {
        system_instruction: Some(mode.system_instruction(current_code)),
        messages: Vec::with_capacity(turns.len()),
    };

    let last = turns.len().saturating_sub(1);
    for (index, turn) in turns.iter().enumerate() {
        let mut message = match turn.speaker {
            Speaker::User => Message::user(&turn.text),
            Speaker::Agent => Message::assistant(&turn.text),
        };
        if index == last && turn.speaker == Speaker::User {
            if let Some(shot) = snapshot {
                message.push(Content::image("image/png", shot.png_base64.clone()));
            }
        }
        context.push(message);
    }

    context
}

/// Strip a leading markdown code fence from a generated answer: the
/// opening token and the first closing fence are removed, anything after
/// the closing fence is left in place, and the result is trimmed.
pub fn strip_code_fences(text: &str) -> String {
    let stripped = if text.starts_with("```openscad") {
        text.replacen("```openscad", "", 1).replacen("```", "", 1)
    } else if text.starts_with("```") {
        text.replacen("```", "", 1).replacen("```", "", 1)
    } else {
        return text.trim().to_string();
    };
    stripped.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_openscad_fences() {
        let text = "```openscad\ncube([5, 5, 5]);\n```";
        assert_eq!(strip_code_fences(text), "cube([5, 5, 5]);");
    }

    #[test]
    fn strips_anonymous_fences() {
        let text = "```\nsphere(3);\n```";
        assert_eq!(strip_code_fences(text), "sphere(3);");
    }

    #[test]
    fn unfenced_text_is_only_trimmed() {
        assert_eq!(strip_code_fences("  cube(2);\n"), "cube(2);");
    }

    #[test]
    fn prose_after_the_closing_fence_survives() {
        let text = "```\ncube(1);\n```\nThe code above is centered.";
        assert_eq!(
            strip_code_fences(text),
            "cube(1);\n\nThe code above is centered."
        );
    }

    #[test]
    fn only_the_first_closing_fence_is_removed() {
        let text = "```openscad\ncube(1);\n```\n```\nleftover\n```";
        assert_eq!(strip_code_fences(text), "cube(1);\n\n```\nleftover\n```");
    }

    #[test]
    fn fences_mid_text_are_untouched() {
        let text = "cube(1); // see ```docs```";
        assert_eq!(strip_code_fences(text), text);
    }

    #[test]
    fn empty_answers_stay_empty() {
        assert_eq!(strip_code_fences(""), "");
        assert_eq!(strip_code_fences("``````"), "");
    }

    #[test]
    fn context_sends_every_turn_in_order() {
        let turns = vec![
            ConversationTurn::agent("Hello!"),
            ConversationTurn::user("make a cup"),
            ConversationTurn::agent("✓ Code generated successfully"),
            ConversationTurn::user("add a handle"),
        ];

        let context = build_context(Mode::General, "cube(1);", &turns, None);

        assert_eq!(context.messages.len(), 4);
        assert_eq!(context.messages[0].text(), Some("Hello!"));
        assert_eq!(context.messages[3].text(), Some("add a handle"));
        let instruction = context.system_instruction.unwrap();
        assert!(instruction.contains("Current Code:\ncube(1);"));
    }

    #[test]
    fn snapshot_attaches_to_a_final_user_turn() {
        let turns = vec![ConversationTurn::user("make a cup")];
        let shot = Snapshot {
            label: "Perspective view",
            png_base64: "cGl4ZWxz".into(),
        };

        let context = build_context(Mode::General, "", &turns, Some(&shot));

        let Message::User { content } = &context.messages[0] else {
            panic!("expected a user message");
        };
        assert_eq!(content.len(), 2);
        assert_eq!(
            content[1],
            Content::image("image/png", "cGl4ZWxz")
        );
    }

    #[test]
    fn snapshot_is_skipped_when_the_final_turn_is_the_agents() {
        let turns = vec![
            ConversationTurn::user("make a cup"),
            ConversationTurn::agent("✓ Code generated successfully"),
        ];
        let shot = Snapshot {
            label: "Perspective view",
            png_base64: "cGl4ZWxz".into(),
        };

        let context = build_context(Mode::General, "", &turns, Some(&shot));

        let Message::Assistant { content, .. } = &context.messages[1] else {
            panic!("expected an assistant message");
        };
        assert_eq!(content.len(), 1);
    }

    #[test]
    fn snapshot_only_lands_on_the_last_turn() {
        let turns = vec![
            ConversationTurn::user("make a cup"),
            ConversationTurn::user("wider"),
        ];
        let shot = Snapshot {
            label: "Perspective view",
            png_base64: "cGl4ZWxz".into(),
        };

        let context = build_context(Mode::General, "", &turns, Some(&shot));

        let Message::User { content } = &context.messages[0] else {
            panic!("expected a user message");
        };
        assert_eq!(content.len(), 1);
        let Message::User { content } = &context.messages[1] else {
            panic!("expected a user message");
        };
        assert_eq!(content.len(), 2);
    }
}
