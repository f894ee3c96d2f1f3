//! Visual verification adapter: rendered snapshots in, verdict out

use async_trait::async_trait;
use camber_ai::{Content, Context, GeminiClient, GenerationOptions, Message, Model};

use crate::ports::Snapshot;

/// Sampling temperature for verification calls
const VERIFICATION_TEMPERATURE: f32 = 0.3;

/// Verdict used when the reply carries no text at all
pub const EMPTY_VERDICT: &str = "Visual check completed.";

/// Runs one visual verification round
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Returns the free-text verdict for the rendered snapshots
    async fn verify(
        &self,
        api_key: &str,
        request: &str,
        snapshots: &[Snapshot],
    ) -> camber_ai::Result<String>;
}

/// Verifier backed by a non-streaming Gemini call. No system instruction
/// and no thought parts; the verdict is the whole reply.
pub struct GeminiVerifier {
    model: Model,
}

impl GeminiVerifier {
    pub fn new(model: Model) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Verifier for GeminiVerifier {
    async fn verify(
        &self,
        api_key: &str,
        request: &str,
        snapshots: &[Snapshot],
    ) -> camber_ai::Result<String> {
        let client = GeminiClient::new(api_key);

        let mut message = Message::user(verification_prompt(request));
        for shot in snapshots {
            message.push(Content::image("image/png", shot.png_base64.clone()));
        }

        let context = Context {
            system_instruction: None,
            messages: vec![message],
        };
        let options = GenerationOptions {
            temperature: Some(VERIFICATION_TEMPERATURE),
            ..Default::default()
        };

        let reply = client.generate(&self.model, &context, &options).await?;
        Ok(reply
            .text()
            .map(str::to_string)
            .unwrap_or_else(|| EMPTY_VERDICT.to_string()))
    }
}

/// Prompt asking the model to compare the snapshots against the original
/// request
pub fn verification_prompt(request: &str) -> String {
    format!(
        r#"The user requested: "{request}"

I generated OpenSCAD code and here are screenshots of the rendered 3D model from 4 different angles:
1. Perspective view
2. Front view
3. Top view
4. Side view

Please briefly verify if the rendered model matches what the user requested. If it looks correct, say "✓ The model looks good!" If there are issues, briefly mention them."#
    )
}

/// A verdict passes when it contains the check mark or says the model
/// looks good; anything else counts as a failure.
pub fn verdict_passes(verdict: &str) -> bool {
    verdict.contains('✓') || verdict.to_lowercase().contains("looks good")
}
