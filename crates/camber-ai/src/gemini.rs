//! Gemini API client: SSE streaming and single-shot generation

use crate::error::{Error, Result};
use crate::stream::{MessageEvent, MessageEventStream};
use crate::types::{
    AssistantMetadata, Content, Context, GenerationOptions, Message, Model, StopReason, Usage,
};
use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

/// Client for the Google Generative Language API
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Read the API key from GEMINI_API_KEY, falling back to GOOGLE_API_KEY
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("GOOGLE_API_KEY"))
            .map_err(|_| Error::InvalidApiKey)?;
        if api_key.is_empty() {
            return Err(Error::InvalidApiKey);
        }
        Ok(Self::new(api_key))
    }

    /// Stream a response over SSE. Thought-flagged parts surface as
    /// `ThinkingDelta` events, everything else as `TextDelta`.
    pub fn stream(
        &self,
        model: &Model,
        context: &Context,
        options: &GenerationOptions,
    ) -> Result<MessageEventStream> {
        let request = build_request(context, options);
        let endpoint = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            model.base_url, model.id
        );
        // the key rides the query string; log the endpoint without it
        tracing::debug!("Gemini API URL: {}", endpoint);
        let url = format!("{}&key={}", endpoint, self.api_key);

        let request_builder = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::sse(format!("failed to open event source: {e}")))?;

        Ok(Box::pin(create_stream(event_source, model.clone())))
    }

    /// Single-shot generation without streaming
    pub async fn generate(
        &self,
        model: &Model,
        context: &Context,
        options: &GenerationOptions,
    ) -> Result<Message> {
        let request = build_request(context, options);
        let endpoint = format!("{}/models/{}:generateContent", model.base_url, model.id);
        tracing::debug!("Gemini API URL: {}", endpoint);
        let url = format!("{}?key={}", endpoint, self.api_key);

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GeminiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(Error::api(status.as_u16(), message));
        }

        let body: GeminiResponse = response.json().await?;
        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::UnexpectedResponse("no candidates in response".into()))?;

        let mut thinking = String::new();
        let mut text = String::new();
        if let Some(content) = candidate.content {
            for part in content.parts {
                let Some(part_text) = part.text else { continue };
                if part.thought {
                    thinking.push_str(&part_text);
                } else {
                    text.push_str(&part_text);
                }
            }
        }

        let mut content = Vec::new();
        if !thinking.is_empty() {
            content.push(Content::Thinking { thinking });
        }
        if !text.is_empty() {
            content.push(Content::Text { text });
        }

        Ok(Message::Assistant {
            content,
            metadata: AssistantMetadata {
                model: Some(model.id.clone()),
                stop_reason: map_finish_reason(candidate.finish_reason.as_deref()),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        })
    }
}

fn create_stream(
    mut event_source: EventSource,
    model: Model,
) -> impl futures::Stream<Item = MessageEvent> {
    stream! {
        let mut accumulated_thinking = String::new();
        let mut accumulated_text = String::new();
        let mut finish_reason: Option<String> = None;
        let mut usage = Usage::default();

        yield MessageEvent::Start {
            message: Message::Assistant {
                content: vec![],
                metadata: AssistantMetadata {
                    model: Some(model.id.clone()),
                    ..Default::default()
                },
            },
        };

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data.is_empty() || msg.data == "[DONE]" {
                        continue;
                    }

                    match serde_json::from_str::<GeminiResponse>(&msg.data) {
                        Ok(chunk) => {
                            for candidate in &chunk.candidates {
                                if let Some(content) = &candidate.content {
                                    for part in &content.parts {
                                        let Some(text) = &part.text else { continue };
                                        if part.thought {
                                            accumulated_thinking.push_str(text);
                                            yield MessageEvent::ThinkingDelta { delta: text.clone() };
                                        } else {
                                            accumulated_text.push_str(text);
                                            yield MessageEvent::TextDelta { delta: text.clone() };
                                        }
                                    }
                                }
                                if let Some(reason) = &candidate.finish_reason {
                                    finish_reason = Some(reason.clone());
                                }
                            }
                            if let Some(meta) = &chunk.usage_metadata {
                                usage.input = meta.prompt_token_count.unwrap_or(0);
                                usage.output = meta.candidates_token_count.unwrap_or(0);
                                usage.thoughts = meta.thoughts_token_count.unwrap_or(0);
                            }
                        }
                        Err(parse_err) => {
                            if let Ok(err) = serde_json::from_str::<GeminiErrorResponse>(&msg.data) {
                                yield MessageEvent::Error { message: err.error.message };
                            } else {
                                yield MessageEvent::Error {
                                    message: format!("failed to parse stream chunk: {parse_err}"),
                                };
                            }
                            return;
                        }
                    }
                }
                // The server closes the connection when it is done; there is
                // no terminal event type.
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    yield MessageEvent::Error { message: format!("SSE error: {e}") };
                    return;
                }
            }
        }

        let mut content = Vec::new();
        if !accumulated_thinking.is_empty() {
            content.push(Content::Thinking { thinking: accumulated_thinking });
        }
        if !accumulated_text.is_empty() {
            content.push(Content::Text { text: accumulated_text });
        }

        let stop_reason = map_finish_reason(finish_reason.as_deref());

        yield MessageEvent::Done {
            message: Message::Assistant {
                content,
                metadata: AssistantMetadata {
                    model: Some(model.id.clone()),
                    stop_reason,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                },
            },
            stop_reason: stop_reason.unwrap_or(StopReason::Stop),
            usage,
        };
    }
}

fn build_request(context: &Context, options: &GenerationOptions) -> GeminiRequest {
    let contents = context.messages.iter().filter_map(convert_message).collect();

    let system_instruction = context.system_instruction.as_ref().map(|text| GeminiContent {
        role: None,
        parts: vec![GeminiPart::Text { text: text.clone() }],
    });

    let thinking_config = options.include_thoughts.then_some(GeminiThinkingConfig {
        include_thoughts: true,
    });

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: Some(GeminiGenerationConfig {
            temperature: options.temperature,
            max_output_tokens: options.max_output_tokens,
            thinking_config,
        }),
    }
}

/// Map a message onto the wire format. Thinking blocks are never echoed
/// back to the API.
fn convert_message(message: &Message) -> Option<GeminiContent> {
    let (role, content) = match message {
        Message::User { content } => ("user", content),
        Message::Assistant { content, .. } => ("model", content),
    };

    let parts: Vec<GeminiPart> = content
        .iter()
        .filter_map(|block| match block {
            Content::Text { text } => Some(GeminiPart::Text { text: text.clone() }),
            Content::Image { mime_type, data } => Some(GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                },
            }),
            Content::Thinking { .. } => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: Some(role.to_string()),
            parts,
        })
    }
}

fn map_finish_reason(reason: Option<&str>) -> Option<StopReason> {
    match reason {
        Some("STOP") => Some(StopReason::Stop),
        Some("MAX_TOKENS") => Some(StopReason::Length),
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => Some(StopReason::Safety),
        Some(_) => Some(StopReason::Other),
        None => None,
    }
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<GeminiThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiThinkingConfig {
    include_thoughts: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    thoughts_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiApiError,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    message: String,
}
