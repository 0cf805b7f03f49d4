use super::client::GeminiHttpClient;
use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part,
    ThinkingConfig,
};
use crate::ai::{parse_report, DiagnosisPrompt, DiagnosisProvider};
use crate::models::{MechanicResponse, MediaKind};
use crate::{schema, Error, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const TEMPERATURE: f32 = 0.2;

/// Primary provider: Gemini with schema-constrained JSON output.
pub struct GeminiAdvisorClient {
    http: GeminiHttpClient,
}

impl GeminiAdvisorClient {
    pub fn new(model: String, timeout: Duration) -> Self {
        Self::new_with_client(model, timeout, reqwest::Client::new())
    }

    pub fn new_with_client(model: String, timeout: Duration, client: reqwest::Client) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(model, timeout, client),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    fn build_request(prompt: &DiagnosisPrompt) -> GenerateContentRequest {
        let mut parts = vec![Part::Text {
            text: prompt.user_text.clone(),
        }];
        if let Some(media) = &prompt.media {
            if media.kind() == MediaKind::Other {
                tracing::warn!("Gemini cannot take {} input; sending text only", media.mime_type);
            } else {
                parts.push(Part::InlineData {
                    inline_data: InlineData {
                        mime_type: media.mime_type.clone(),
                        data: media.payload().to_string(),
                    },
                });
            }
        }

        GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::Text {
                    text: prompt.system_instruction.clone(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema::mechanic_response().to_json(),
                temperature: TEMPERATURE,
                thinking_config: ThinkingConfig { thinking_budget: 0 },
            },
        }
    }
}

#[async_trait]
impl DiagnosisProvider for GeminiAdvisorClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn diagnose(
        &self,
        prompt: &DiagnosisPrompt,
        credential: Option<&str>,
    ) -> Result<MechanicResponse> {
        let api_key = credential
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(Error::CredentialMissing)?;

        let request = Self::build_request(prompt);
        let response: GenerateContentResponse =
            self.http.generate_content(api_key, &request).await?;

        let text = response.text().ok_or_else(|| {
            let reason = response
                .candidates
                .first()
                .and_then(|c| c.finish_reason.clone())
                .unwrap_or_else(|| "no candidates".to_string());
            tracing::error!("Gemini returned no text (finish reason: {})", reason);
            Error::provider(None, format!("No text in Gemini response ({})", reason))
        })?;

        parse_report(&text)
    }
}
