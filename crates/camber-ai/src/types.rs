//! Core message and request types

use serde::{Deserialize, Serialize};

/// A model the client can talk to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier, e.g. "gemini-3-pro-preview"
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// API base URL
    pub base_url: String,
    /// Context window size in tokens
    pub context_window: u32,
    /// Maximum output tokens per response
    pub max_output_tokens: u32,
}

/// One content block within a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Content {
    Text {
        text: String,
    },
    /// Inline image, base64-encoded
    Image {
        mime_type: String,
        data: String,
    },
    /// Model reasoning captured from thought parts
    Thinking {
        thinking: String,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Content::Image {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: Vec<Content>,
    },
    Assistant {
        content: Vec<Content>,
        #[serde(default)]
        metadata: AssistantMetadata,
    },
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::User {
            content: vec![Content::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Assistant {
            content: vec![Content::text(text)],
            metadata: AssistantMetadata::default(),
        }
    }

    /// Append a content block
    pub fn push(&mut self, block: Content) {
        match self {
            Message::User { content } | Message::Assistant { content, .. } => content.push(block),
        }
    }

    /// First text block, if any
    pub fn text(&self) -> Option<&str> {
        let content = match self {
            Message::User { content } | Message::Assistant { content, .. } => content,
        };
        content.iter().find_map(|block| match block {
            Content::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// First thinking block, if any
    pub fn thinking(&self) -> Option<&str> {
        let content = match self {
            Message::User { content } | Message::Assistant { content, .. } => content,
        };
        content.iter().find_map(|block| match block {
            Content::Thinking { thinking } => Some(thinking.as_str()),
            _ => None,
        })
    }
}

/// Metadata attached to assistant messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMetadata {
    pub model: Option<String>,
    pub stop_reason: Option<StopReason>,
    /// Unix milliseconds, set when the response completes
    #[serde(default)]
    pub timestamp: i64,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Stop,
    Length,
    Safety,
    Other,
}

/// Request context: an optional system instruction plus conversation history
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub system_instruction: Option<String>,
    pub messages: Vec<Message>,
}

impl Context {
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// Sampling and reasoning options for a request
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    /// Ask the model to emit its reasoning as thought parts
    pub include_thoughts: bool,
    pub max_output_tokens: Option<u32>,
}

/// Token usage reported by the API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
    pub thoughts: u32,
}
