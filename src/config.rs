//! Session-scoped configuration loaded from the environment.

use crate::ai::gemini::{advice as gemini_advice, client as gemini_client};
use crate::ai::nvidia::advice as nvidia_advice;
use crate::ai::Platform;
use crate::{prompts, vin, Error, Result};
use std::time::Duration;

pub const DEFAULT_NVIDIA_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
pub const DEFAULT_PROXY_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub nvidia_api_key: Option<String>,
    pub nvidia_model: String,
    pub nvidia_base_url: String,
    pub platform: Platform,
    pub proxy_origin: String,
    pub request_timeout: Duration,
    pub port: u16,
    pub explanation_language: String,
    pub video_search_only: bool,
    pub nhtsa_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let platform = match get("MECOPILOT_PLATFORM") {
            Some(value) => value.parse()?,
            None => Platform::detect(),
        };

        let timeout_secs = match get("REQUEST_TIMEOUT_SECS") {
            Some(value) => parse_number::<u64>("REQUEST_TIMEOUT_SECS", &value)?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(Error::Config(
                "REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let port = match get("PORT") {
            Some(value) => parse_number::<u16>("PORT", &value)?,
            None => DEFAULT_PORT,
        };

        let video_search_only = match get("VIDEO_SEARCH_ONLY") {
            Some(value) => parse_bool("VIDEO_SEARCH_ONLY", &value)?,
            None => false,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get_or("GEMINI_MODEL", gemini_advice::DEFAULT_MODEL),
            gemini_base_url: get_or("GEMINI_BASE_URL", gemini_client::DEFAULT_BASE_URL),
            nvidia_api_key: get("NVIDIA_API_KEY"),
            nvidia_model: get_or("NVIDIA_MODEL", nvidia_advice::DEFAULT_MODEL),
            nvidia_base_url: get_or("NVIDIA_BASE_URL", DEFAULT_NVIDIA_BASE_URL),
            platform,
            proxy_origin: get_or("MECOPILOT_PROXY_ORIGIN", DEFAULT_PROXY_ORIGIN),
            request_timeout: Duration::from_secs(timeout_secs),
            port,
            explanation_language: get_or("EXPLANATION_LANGUAGE", prompts::DEFAULT_LANGUAGE),
            video_search_only,
            nhtsa_base_url: get_or("NHTSA_BASE_URL", vin::DEFAULT_BASE_URL),
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{} must be true or false, got '{}'",
            key, value
        ))),
    }
}
