//! Streaming event types for model responses

use crate::types::{Message, StopReason, Usage};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Events emitted while streaming a model response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageEvent {
    /// Stream opened; carries the empty assistant message shell
    Start { message: Message },
    /// Reasoning text delta from a thought-flagged part
    ThinkingDelta { delta: String },
    /// Answer text delta
    TextDelta { delta: String },
    /// Stream completed with the final assembled message
    Done {
        message: Message,
        stop_reason: StopReason,
        usage: Usage,
    },
    /// Stream failed
    Error { message: String },
}

impl MessageEvent {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageEvent::Done { .. } | MessageEvent::Error { .. })
    }
}

/// A pinned, boxed stream of message events
pub type MessageEventStream = Pin<Box<dyn Stream<Item = MessageEvent> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deltas_are_not_terminal() {
        assert!(!MessageEvent::TextDelta { delta: "x".into() }.is_terminal());
        assert!(!MessageEvent::ThinkingDelta { delta: "x".into() }.is_terminal());
        assert!(
            !MessageEvent::Start {
                message: Message::assistant(""),
            }
            .is_terminal()
        );
    }

    #[test]
    fn done_and_error_are_terminal() {
        let done = MessageEvent::Done {
            message: Message::assistant("out"),
            stop_reason: StopReason::Stop,
            usage: Usage::default(),
        };
        assert!(done.is_terminal());
        assert!(
            MessageEvent::Error {
                message: "boom".into(),
            }
            .is_terminal()
        );
    }

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = MessageEvent::ThinkingDelta {
            delta: "considering".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "thinking_delta");
        assert_eq!(json["delta"], "considering");
    }
}
