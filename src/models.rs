//! Data models and structures
//!
//! Defines the structured repair report returned by both providers and the
//! media attachment carried by a diagnosis request.

use crate::ai::mime::detect_media_mime;
use crate::{Error, Result};
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// One attached photo or audio clip, base64 encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInput {
    pub data: String,
    pub mime_type: String,
}

/// Classified from the mime type prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    /// Neither provider can diagnose from it.
    Other,
}

impl MediaInput {
    pub fn new(data: String, mime_type: String) -> Self {
        Self { data, mime_type }
    }

    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.to_string(),
        }
    }

    /// Read a photo or recording from disk, sniffing its mime type.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime = detect_media_mime(&bytes).ok_or_else(|| {
            Error::UnsupportedMedia(format!(
                "{} is not a recognized image or audio file",
                path.display()
            ))
        })?;
        Ok(Self::from_bytes(&bytes, mime))
    }

    pub fn kind(&self) -> MediaKind {
        let mime = self.mime_type.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else {
            MediaKind::Other
        }
    }

    /// Base64 payload without any `data:<mime>;base64,` prefix.
    pub fn payload(&self) -> &str {
        match self.data.strip_prefix("data:") {
            Some(rest) => rest
                .split_once(";base64,")
                .map(|(_, payload)| payload)
                .unwrap_or(&self.data),
            None => &self.data,
        }
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DtcItem {
    pub code: String,
    pub definition: String,
    pub possible_cause: String,
    pub related_components: String,
    pub symptoms: String,
    pub fix_suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TsbItem {
    pub id: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoTutorial {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarCase {
    pub case_name: String,
    pub relevance_score: String,
    pub related_dtc: Vec<String>,
    pub culprit_component: String,
    pub symptoms_match: String,
    pub solution_steps: Vec<String>,
    pub video_ref: VideoTutorial,
    pub image_search_keywords: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AftermarketPart {
    pub brand: String,
    pub part_number: String,
    pub estimated_price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceItem {
    pub item: String,
    pub spec: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oem_part_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oem_brand: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub aftermarket_parts: Vec<AftermarketPart>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TorqueSpec {
    pub part: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimation {
    pub parts_total: String,
    pub labor_cost: String,
    pub hourly_rate: String,
    pub total_estimate: String,
}

/// The full structured repair report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicResponse {
    pub vehicle_info: String,
    pub component_id: String,
    pub component_name: String,
    pub diagnosis: Vec<String>,
    /// Ranked by relevance, most relevant first.
    pub similar_cases: Vec<SimilarCase>,
    pub dtc_list: Vec<DtcItem>,
    pub tsb_list: Vec<TsbItem>,
    pub manual_summary: String,
    pub wiring_diagram_desc: String,
    pub wiring_search_keywords: String,
    pub maintenance_data: Vec<MaintenanceItem>,
    pub torque_specs: Vec<TorqueSpec>,
    pub tools_list: Vec<String>,
    pub safety_warning: Vec<String>,
    /// Sequential repair steps.
    pub sop_steps: Vec<String>,
    pub video_tutorials: Vec<VideoTutorial>,
    pub estimated_work_time: String,
    pub cost_estimation: CostEstimation,
}

/// Vehicle description decoded from a VIN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub make: String,
    pub model: String,
    pub year: String,
    pub body_class: String,
    pub engine: String,
    pub fuel: String,
}

impl VehicleInfo {
    pub fn describe(&self) -> String {
        let base = format!("{} {} {}", self.year, self.make, self.model);
        let base = base.trim();
        if self.engine.is_empty() {
            base.to_string()
        } else {
            format!("{} ({})", base, self.engine)
        }
    }
}
