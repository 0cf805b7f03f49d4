//! AI provider integration for diagnosis reports
//!
//! Provides the schema-native Gemini adapter and the chat-completions
//! fallback adapter behind one [`DiagnosisProvider`] trait, plus the
//! transports the fallback uses to reach its endpoint.

pub mod gemini;
pub mod mime;
pub mod mock;
pub mod nvidia;
pub mod transport;

pub use gemini::GeminiAdvisorClient;
pub use mock::MockDiagnosisProvider;
pub use nvidia::NvidiaAdvisorClient;
pub use transport::{NativeTransport, Platform, ProxyTransport, Transport};

use crate::models::{MechanicResponse, MediaInput};
use crate::{schema, Error, Result};
use async_trait::async_trait;

/// Provider-neutral diagnosis request.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisPrompt {
    pub system_instruction: String,
    pub user_text: String,
    pub media: Option<MediaInput>,
}

#[async_trait]
pub trait DiagnosisProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a report for `prompt`.
    ///
    /// `credential` is the caller-supplied key. Providers that carry their
    /// own key ignore it.
    async fn diagnose(
        &self,
        prompt: &DiagnosisPrompt,
        credential: Option<&str>,
    ) -> Result<MechanicResponse>;
}

/// Remove markdown code-fence markers around a JSON reply.
pub fn strip_code_fences(content: &str) -> String {
    content.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse reply text, check it against the report schema, then deserialize.
pub fn parse_report(text: &str) -> Result<MechanicResponse> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        tracing::error!("Reply is not valid JSON: {}\nBody: {}", e, text);
        Error::MalformedResponse(format!("reply is not valid JSON: {}", e))
    })?;

    schema::mechanic_response().validate(&value).map_err(|violation| {
        tracing::error!("Reply violates the report schema: {}", violation);
        Error::MalformedResponse(violation.to_string())
    })?;

    serde_json::from_value(value).map_err(|e| Error::MalformedResponse(e.to_string()))
}
