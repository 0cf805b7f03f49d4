//! Error handling and custom error types
//!
//! A diagnosis request fails with one of three kinds: no credential, an
//! upstream provider failure, or a reply that does not satisfy the report
//! schema. The remaining variants cover session guards, configuration and
//! local IO.

use thiserror::Error;

pub const GENERIC_FAILURE_MESSAGE: &str =
    "Analysis failed. Check your connection or API key and try again.";
pub const CREDENTIAL_MESSAGE: &str =
    "The API key is missing or invalid. Configure one in the settings.";

#[derive(Error, Debug)]
pub enum Error {
    #[error("No API credential configured")]
    CredentialMissing,

    #[error("Provider error (status {}): {body}", display_status(.status))]
    Provider { status: Option<u16>, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Nothing to diagnose: describe the problem or attach a photo or recording")]
    EmptyRequest,

    #[error("A diagnosis request is already in flight")]
    Busy,

    #[error("A recording session is already active")]
    RecordingActive,

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("VIN lookup error: {0}")]
    Vin(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn display_status(status: &Option<u16>) -> String {
    status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl Error {
    pub fn provider(status: Option<u16>, body: impl Into<String>) -> Self {
        Self::Provider {
            status,
            body: body.into(),
        }
    }

    /// True for failures the user fixes by configuring a different key.
    pub fn is_credential_problem(&self) -> bool {
        match self {
            Self::CredentialMissing => true,
            Self::Provider {
                status: Some(401 | 403),
                ..
            } => true,
            Self::Provider { body, .. } => {
                let body = body.to_ascii_lowercase();
                body.contains("api key") || body.contains("api_key")
            }
            _ => false,
        }
    }

    /// Message shown to the person who submitted the diagnosis.
    pub fn user_message(&self) -> &'static str {
        if self.is_credential_problem() {
            CREDENTIAL_MESSAGE
        } else {
            GENERIC_FAILURE_MESSAGE
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        if e.is_timeout() {
            return Self::provider(status, format!("request timed out: {}", e));
        }
        Self::provider(status, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_missing_maps_to_credential_message() {
        assert_eq!(Error::CredentialMissing.user_message(), CREDENTIAL_MESSAGE);
    }

    #[test]
    fn test_rejected_key_maps_to_credential_message() {
        let err = Error::provider(Some(403), "forbidden");
        assert!(err.is_credential_problem());

        let err = Error::provider(Some(400), r#"{"error":{"message":"API key not valid"}}"#);
        assert_eq!(err.user_message(), CREDENTIAL_MESSAGE);
    }

    #[test]
    fn test_other_failures_map_to_generic_message() {
        assert_eq!(
            Error::provider(Some(503), "overloaded").user_message(),
            GENERIC_FAILURE_MESSAGE
        );
        assert_eq!(
            Error::MalformedResponse("missing field".to_string()).user_message(),
            GENERIC_FAILURE_MESSAGE
        );
        assert_eq!(
            Error::provider(None, "connection refused").user_message(),
            GENERIC_FAILURE_MESSAGE
        );
    }

    #[test]
    fn test_provider_display_includes_status() {
        let err = Error::provider(Some(429), "rate limited");
        assert_eq!(err.to_string(), "Provider error (status 429): rate limited");
    }
}
