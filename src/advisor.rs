//! Diagnosis orchestration.
//!
//! Routing is decided once per request by credential presence: a usable key
//! goes to the primary provider only, and no key goes to the fallback only.
//! A failure from the chosen provider is returned as is.

use crate::ai::{
    transport, DiagnosisPrompt, DiagnosisProvider, GeminiAdvisorClient, NvidiaAdvisorClient,
};
use crate::config::Config;
use crate::models::{MechanicResponse, MediaInput, MediaKind, VehicleInfo};
use crate::prompts::PromptComposer;
use crate::video::VideoLinkPolicy;
use crate::{Error, Result};
use tracing::{info, Instrument};
use uuid::Uuid;

pub struct MechanicAdvisor {
    composer: PromptComposer,
    primary: Box<dyn DiagnosisProvider>,
    fallback: Box<dyn DiagnosisProvider>,
    video_policy: VideoLinkPolicy,
}

/// Injectable provider bundle used to construct [`MechanicAdvisor`] in tests.
pub struct AdvisorServices {
    pub primary: Box<dyn DiagnosisProvider>,
    pub fallback: Box<dyn DiagnosisProvider>,
}

fn usable(credential: Option<&str>) -> Option<&str> {
    credential.map(str::trim).filter(|key| !key.is_empty())
}

impl MechanicAdvisor {
    pub fn with_services(
        services: AdvisorServices,
        composer: PromptComposer,
        video_policy: VideoLinkPolicy,
    ) -> Self {
        Self {
            composer,
            primary: services.primary,
            fallback: services.fallback,
            video_policy,
        }
    }

    /// Wire the real providers. The fallback transport is chosen here, once.
    pub fn from_config(config: &Config) -> Self {
        // Reuse one HTTP connection pool across provider clients.
        let http_client = reqwest::Client::new();

        let primary = GeminiAdvisorClient::new_with_client(
            config.gemini_model.clone(),
            config.request_timeout,
            http_client.clone(),
        )
        .with_base_url(config.gemini_base_url.clone());

        let fallback_transport = transport::select(
            config.platform,
            http_client,
            &config.proxy_origin,
            &config.nvidia_base_url,
            config.request_timeout,
        );
        let fallback = NvidiaAdvisorClient::new(
            fallback_transport,
            config.nvidia_api_key.clone(),
            config.nvidia_model.clone(),
        );

        info!(
            "Primary provider: Gemini (model: {}), fallback: {} (model: {})",
            config.gemini_model,
            fallback.name(),
            config.nvidia_model
        );

        Self::with_services(
            AdvisorServices {
                primary: Box::new(primary),
                fallback: Box::new(fallback),
            },
            PromptComposer::new(config.explanation_language.clone()),
            VideoLinkPolicy::new(config.video_search_only),
        )
    }

    /// Produce a repair report for free-form text and optional media.
    pub async fn advise(
        &self,
        text: &str,
        media: Option<MediaInput>,
        credential: Option<&str>,
    ) -> Result<MechanicResponse> {
        self.advise_with_vehicle(text, media, None, credential).await
    }

    /// Same as [`advise`](Self::advise), with the text enriched by a decoded
    /// vehicle description.
    pub async fn advise_with_vehicle(
        &self,
        text: &str,
        media: Option<MediaInput>,
        vehicle: Option<&VehicleInfo>,
        credential: Option<&str>,
    ) -> Result<MechanicResponse> {
        if let Some(media) = media.as_ref().filter(|m| m.kind() == MediaKind::Other) {
            return Err(Error::UnsupportedMedia(format!(
                "{} attachments cannot be diagnosed; attach a photo or an engine recording",
                media.mime_type
            )));
        }

        let prompt = self.composer.compose(text, media, vehicle);
        let span = tracing::info_span!("advise", request_id = %Uuid::new_v4());
        self.run(&prompt, credential).instrument(span).await
    }

    async fn run(
        &self,
        prompt: &DiagnosisPrompt,
        credential: Option<&str>,
    ) -> Result<MechanicResponse> {
        let mut report = match usable(credential) {
            Some(key) => {
                info!("Routing diagnosis to primary provider {}", self.primary.name());
                self.primary.diagnose(prompt, Some(key)).await?
            }
            None => {
                info!(
                    "No API key configured; routing diagnosis to fallback provider {}",
                    self.fallback.name()
                );
                self.fallback.diagnose(prompt, None).await?
            }
        };

        self.video_policy.apply(&mut report);
        Ok(report)
    }
}
