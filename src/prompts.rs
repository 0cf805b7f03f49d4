//! Prompt templates and the diagnosis prompt composer.

use crate::ai::DiagnosisPrompt;
use crate::models::{MediaInput, MediaKind, VehicleInfo};
use crate::video::SEARCH_URL_PREFIX;

pub const SYSTEM_INSTRUCTION: &str = include_str!("../data/prompts/system_instruction.txt");
pub const USER_REQUEST: &str = include_str!("../data/prompts/user_request.txt");
pub const MEDIA_IMAGE: &str = include_str!("../data/prompts/media_image.txt");
pub const MEDIA_AUDIO: &str = include_str!("../data/prompts/media_audio.txt");
pub const FALLBACK_SCHEMA: &str = include_str!("../data/prompts/fallback_schema.txt");
pub const FALLBACK_AUDIO_NOTE: &str = include_str!("../data/prompts/fallback_audio_note.txt");

pub const DEFAULT_LANGUAGE: &str = "Bahasa Indonesia";

/// Replace `{{key}}` placeholders in a template string.
///
/// Single pass over the template: substituted values are never scanned
/// again, and unknown placeholders are left as they are.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            let key = &after[..end];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });
        match value {
            Some((value, end)) => {
                result.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                result.push_str("{{");
                rest = after;
            }
        }
    }

    result.push_str(rest);
    result
}

/// Prefix the free-form text with the decoded vehicle, unless the user
/// already named the model.
pub fn enrich_with_vehicle(text: &str, vehicle: &VehicleInfo) -> String {
    if !vehicle.model.is_empty() && text.contains(&vehicle.model) {
        return text.to_string();
    }
    let line = format!("Vehicle: {}", vehicle.describe());
    if text.trim().is_empty() {
        line
    } else {
        format!("{}\n{}", line, text)
    }
}

/// Builds the system instruction and the composite user request.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    language: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl PromptComposer {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn system_instruction(&self) -> String {
        render(
            SYSTEM_INSTRUCTION,
            &[
                ("language", &self.language),
                ("search_prefix", SEARCH_URL_PREFIX),
            ],
        )
    }

    pub fn compose(
        &self,
        text: &str,
        media: Option<MediaInput>,
        vehicle: Option<&VehicleInfo>,
    ) -> DiagnosisPrompt {
        let text = match vehicle {
            Some(vehicle) => enrich_with_vehicle(text.trim(), vehicle),
            None => text.trim().to_string(),
        };

        let media_instruction = match media.as_ref().map(MediaInput::kind) {
            Some(MediaKind::Image) => MEDIA_IMAGE,
            Some(MediaKind::Audio) => MEDIA_AUDIO,
            Some(MediaKind::Other) | None => "",
        };

        let user_text = render(
            USER_REQUEST,
            &[("text", &text), ("media_instruction", media_instruction)],
        );

        DiagnosisPrompt {
            system_instruction: self.system_instruction(),
            user_text,
            media,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle() -> VehicleInfo {
        VehicleInfo {
            make: "TOYOTA".to_string(),
            model: "Innova".to_string(),
            year: "2019".to_string(),
            body_class: String::new(),
            engine: "2.4L V4 Diesel".to_string(),
            fuel: "Diesel".to_string(),
        }
    }

    #[test]
    fn test_render_multiple_vars() {
        assert_eq!(
            render("{{a}} and {{b}}", &[("a", "cats"), ("b", "dogs")]),
            "cats and dogs"
        );
    }

    #[test]
    fn test_render_does_not_rescan_substituted_values() {
        assert_eq!(
            render("{{a}}|{{b}}", &[("a", "{{b}}"), ("b", "x")]),
            "{{b}}|x"
        );
        assert_eq!(render("{{unknown}} {{a}}", &[("a", "1")]), "{{unknown}} 1");
        assert_eq!(render("open {{a", &[("a", "1")]), "open {{a");
    }

    #[test]
    fn test_user_text_placeholders_kept_verbatim() {
        let text = "literal {{media_instruction}} here";
        let prompt = PromptComposer::default().compose(text, None, None);
        assert!(prompt.user_text.starts_with(text));
    }

    #[test]
    fn test_prompts_are_non_empty() {
        assert!(!SYSTEM_INSTRUCTION.is_empty());
        assert!(!MEDIA_IMAGE.is_empty());
        assert!(!MEDIA_AUDIO.is_empty());
        assert!(!FALLBACK_AUDIO_NOTE.is_empty());
        assert!(FALLBACK_SCHEMA.contains("{{schema}}"));
        assert!(USER_REQUEST.contains("{{text}}"));
    }

    #[test]
    fn test_every_request_demands_full_report() {
        let prompt = PromptComposer::default().compose("engine rattles at idle", None, None);
        assert!(prompt.user_text.starts_with("engine rattles at idle"));
        assert!(prompt.user_text.contains("FULL STANDARD REPORT"));
        assert!(!prompt.user_text.contains(MEDIA_IMAGE));
        assert!(!prompt.user_text.contains(MEDIA_AUDIO));
        assert!(prompt.media.is_none());
    }

    #[test]
    fn test_image_adds_visual_analysis() {
        let media = MediaInput::new("AAAA".to_string(), "image/jpeg".to_string());
        let prompt = PromptComposer::default().compose("brake squeal", Some(media.clone()), None);
        assert!(prompt.user_text.contains(MEDIA_IMAGE));
        assert_eq!(prompt.media, Some(media));
    }

    #[test]
    fn test_audio_adds_acoustic_classification() {
        let media = MediaInput::new("AAAA".to_string(), "audio/webm".to_string());
        let prompt = PromptComposer::default().compose("", Some(media), None);
        assert!(prompt.user_text.contains(MEDIA_AUDIO));
        assert!(prompt.user_text.contains("knocking/hissing/grinding"));
    }

    #[test]
    fn test_other_media_gets_no_media_instruction() {
        let media = MediaInput::new("JVBERi0=".to_string(), "application/pdf".to_string());
        let prompt = PromptComposer::default().compose("check this", Some(media), None);
        assert!(!prompt.user_text.contains(MEDIA_AUDIO));
        assert!(!prompt.user_text.contains(MEDIA_IMAGE));
        assert!(!prompt.user_text.contains("ENGINE SOUND"));
    }

    #[test]
    fn test_system_instruction_carries_language_and_video_policies() {
        let system = PromptComposer::new("Bahasa Melayu").system_instruction();
        assert!(system.contains("plain Bahasa Melayu"));
        assert!(system.contains("NEVER translate established technical terms"));
        assert!(system.contains(SEARCH_URL_PREFIX));
        assert!(!system.contains("{{"));
    }

    #[test]
    fn test_vehicle_enrichment_prefixes_text() {
        let text = enrich_with_vehicle("rough idle", &vehicle());
        assert_eq!(text, "Vehicle: 2019 TOYOTA Innova (2.4L V4 Diesel)\nrough idle");
    }

    #[test]
    fn test_vehicle_enrichment_skips_when_model_named() {
        let text = enrich_with_vehicle("Innova rough idle", &vehicle());
        assert_eq!(text, "Innova rough idle");
    }
}
