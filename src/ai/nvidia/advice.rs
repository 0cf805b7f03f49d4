use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatMessageContent, ImageUrl,
    MessagePart,
};
use crate::ai::{parse_report, strip_code_fences, DiagnosisPrompt, DiagnosisProvider, Transport};
use crate::models::{MechanicResponse, MediaKind};
use crate::{prompts, schema, Error, Result};
use async_trait::async_trait;

pub const DEFAULT_MODEL: &str = "meta/llama-3.1-405b-instruct";
const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 4096;
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Fallback provider: a Llama model behind a chat-completions endpoint.
///
/// The model is not schema-constrained, so the schema travels in the system
/// prompt and every reply goes through fence stripping and validation.
pub struct NvidiaAdvisorClient {
    transport: Box<dyn Transport>,
    api_key: Option<String>,
    model: String,
}

impl NvidiaAdvisorClient {
    pub fn new(transport: Box<dyn Transport>, api_key: Option<String>, model: String) -> Self {
        Self {
            transport,
            api_key,
            model,
        }
    }

    fn system_prompt(system_instruction: &str) -> String {
        prompts::render(
            prompts::FALLBACK_SCHEMA,
            &[
                ("system", system_instruction),
                ("schema", &schema::mechanic_response().to_prompt_text()),
            ],
        )
    }

    fn user_parts(prompt: &DiagnosisPrompt) -> Vec<MessagePart> {
        let mut text = prompt.user_text.clone();
        let mut image = None;

        match &prompt.media {
            Some(media) if media.kind() == MediaKind::Image => {
                image = Some(MessagePart::ImageUrl {
                    image_url: ImageUrl {
                        url: media.data_url(),
                    },
                });
            }
            Some(media) if media.kind() == MediaKind::Audio => {
                tracing::warn!(
                    "Fallback provider cannot take {} input; sending text only",
                    media.mime_type
                );
                text.push_str("\n\n");
                text.push_str(prompts::FALLBACK_AUDIO_NOTE);
            }
            Some(media) => {
                tracing::warn!("Dropping unsupported {} attachment", media.mime_type);
            }
            None => {}
        }

        let mut parts = vec![MessagePart::Text { text }];
        parts.extend(image);
        parts
    }

    pub fn build_request(&self, prompt: &DiagnosisPrompt) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(ChatMessageContent::Text(Self::system_prompt(
                        &prompt.system_instruction,
                    ))),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(ChatMessageContent::Parts(Self::user_parts(prompt))),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        }
    }
}

#[async_trait]
impl DiagnosisProvider for NvidiaAdvisorClient {
    fn name(&self) -> &str {
        "nvidia"
    }

    async fn diagnose(
        &self,
        prompt: &DiagnosisPrompt,
        _credential: Option<&str>,
    ) -> Result<MechanicResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(Error::CredentialMissing)?;

        let body = serde_json::to_value(self.build_request(prompt))
            .map_err(|e| Error::MalformedResponse(format!("Failed to encode request: {}", e)))?;

        tracing::debug!(
            "Sending chat completion to fallback provider via {} transport",
            self.transport.name()
        );
        let reply = self
            .transport
            .post_json(CHAT_COMPLETIONS_PATH, &format!("Bearer {}", api_key), &body)
            .await?;

        let response: ChatCompletionResponse = serde_json::from_value(reply).map_err(|e| {
            Error::MalformedResponse(format!("Unexpected chat completion envelope: {}", e))
        })?;

        let content = response.content().ok_or_else(|| {
            tracing::error!("No content from fallback provider");
            Error::provider(None, "No content from fallback provider")
        })?;

        parse_report(&strip_code_fences(content))
    }
}
