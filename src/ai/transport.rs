//! HTTP transports for the chat-completions fallback.
//!
//! A web build cannot call the upstream directly because of cross-origin
//! restrictions, so it goes through the same-origin proxy. A native build
//! uses its own HTTP stack against the upstream. Both are picked once at
//! startup and injected into the fallback adapter.

use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const NVIDIA_PROVIDER: &str = "nvidia";

#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// POST a JSON body to `path` (for example `/chat/completions`) and
    /// return the parsed reply body.
    async fn post_json(&self, path: &str, authorization: &str, body: &Value) -> Result<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Web,
    Native,
}

impl Platform {
    /// Capability detection: a wasm32 build runs in a browser.
    pub fn detect() -> Self {
        if cfg!(target_arch = "wasm32") {
            Platform::Web
        } else {
            Platform::Native
        }
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" | "browser" => Ok(Platform::Web),
            "native" => Ok(Platform::Native),
            other => Err(Error::Config(format!(
                "Unknown platform '{}'. Expected 'web' or 'native'",
                other
            ))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Web => write!(f, "web"),
            Platform::Native => write!(f, "native"),
        }
    }
}

async fn send_json(
    client: &Client,
    url: &str,
    authorization: &str,
    body: &Value,
    timeout: Duration,
) -> Result<Value> {
    tracing::debug!("POST {}", url);

    let response = client
        .post(url)
        .timeout(timeout)
        .header("Authorization", authorization)
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| {
            tracing::error!("Failed to send request to {}: {}", url, e);
            e
        })?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await?;
        tracing::error!("Upstream error (status {}): {}", status, error_text);
        return Err(Error::provider(Some(status.as_u16()), error_text));
    }

    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        tracing::error!("Failed to parse upstream response: {}\nBody: {}", e, text);
        Error::MalformedResponse(format!("Failed to parse upstream response: {}", e))
    })
}

/// Calls go through the same-origin `/api/<provider>` proxy.
pub struct ProxyTransport {
    client: Client,
    origin: String,
    provider: String,
    timeout: Duration,
}

impl ProxyTransport {
    pub fn new(client: Client, origin: &str, provider: &str, timeout: Duration) -> Self {
        Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
            provider: provider.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Transport for ProxyTransport {
    fn name(&self) -> &str {
        "proxy"
    }

    async fn post_json(&self, path: &str, authorization: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/api/{}{}", self.origin, self.provider, path);
        send_json(&self.client, &url, authorization, body, self.timeout).await
    }
}

/// Calls go straight to the upstream from the native HTTP stack.
pub struct NativeTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl NativeTransport {
    pub fn new(client: Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl Transport for NativeTransport {
    fn name(&self) -> &str {
        "native"
    }

    async fn post_json(&self, path: &str, authorization: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        send_json(&self.client, &url, authorization, body, self.timeout).await
    }
}

/// Pick the transport for `platform`.
pub fn select(
    platform: Platform,
    client: Client,
    proxy_origin: &str,
    upstream_base_url: &str,
    timeout: Duration,
) -> Box<dyn Transport> {
    tracing::info!("Fallback transport: {}", platform);
    match platform {
        Platform::Web => Box::new(ProxyTransport::new(
            client,
            proxy_origin,
            NVIDIA_PROVIDER,
            timeout,
        )),
        Platform::Native => Box::new(NativeTransport::new(client, upstream_base_url, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_proxy_transport_uses_same_origin_path() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/nvidia/chat/completions"))
            .and(header("Authorization", "Bearer k"))
            .and(body_json(json!({ "model": "m" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ProxyTransport::new(
            Client::new(),
            &server.uri(),
            NVIDIA_PROVIDER,
            Duration::from_secs(5),
        );
        let reply = transport
            .post_json("/chat/completions", "Bearer k", &json!({ "model": "m" }))
            .await
            .unwrap();
        assert_eq!(reply, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_native_transport_calls_upstream_directly() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/v1", server.uri());
        let transport = NativeTransport::new(Client::new(), &base, Duration::from_secs(5));
        transport
            .post_json("/chat/completions", "Bearer k", &json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_success_keeps_status_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string(r#"{"error":"x"}"#))
            .mount(&server)
            .await;

        let transport = NativeTransport::new(Client::new(), &server.uri(), Duration::from_secs(5));
        let err = transport
            .post_json("/chat/completions", "Bearer k", &json!({}))
            .await
            .unwrap_err();

        match err {
            Error::Provider { status, body } => {
                assert_eq!(status, Some(503));
                assert_eq!(body, r#"{"error":"x"}"#);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_provider_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let transport =
            NativeTransport::new(Client::new(), &server.uri(), Duration::from_millis(50));
        let err = transport
            .post_json("/chat/completions", "Bearer k", &json!({}))
            .await
            .unwrap_err();

        match err {
            Error::Provider { status, body } => {
                assert_eq!(status, None);
                assert!(body.contains("timed out"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_platform_parsing() {
        assert_eq!("web".parse::<Platform>().unwrap(), Platform::Web);
        assert_eq!(" Native ".parse::<Platform>().unwrap(), Platform::Native);
        assert!("desktop".parse::<Platform>().is_err());
        assert_eq!(Platform::detect(), Platform::Native);
    }

    #[test]
    fn test_select_matches_platform() {
        let web = select(
            Platform::Web,
            Client::new(),
            "http://localhost:3000",
            "https://integrate.api.nvidia.com/v1",
            Duration::from_secs(1),
        );
        assert_eq!(web.name(), "proxy");

        let native = select(
            Platform::Native,
            Client::new(),
            "http://localhost:3000",
            "https://integrate.api.nvidia.com/v1",
            Duration::from_secs(1),
        );
        assert_eq!(native.name(), "native");
    }
}
