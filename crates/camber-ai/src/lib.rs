//! Client for the Google Generative Language (Gemini) API.
//!
//! Supports SSE streaming with separate reasoning and answer deltas, and a
//! single-shot non-streaming call used for multimodal prompts that need a
//! whole reply at once.

pub mod error;
pub mod gemini;
pub mod models;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use gemini::GeminiClient;
pub use stream::{MessageEvent, MessageEventStream};
pub use types::{
    AssistantMetadata, Content, Context, GenerationOptions, Message, Model, StopReason, Usage,
};
