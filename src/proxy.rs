//! Same-origin reverse proxy for browser builds.
//!
//! `POST /api/<provider>/chat/completions` forwards the `Authorization`
//! header and the raw JSON body to the provider's upstream. Upstream errors
//! are relayed with their status and body untouched.

use crate::ai::transport::NVIDIA_PROVIDER;
use crate::config::Config;
use crate::Result;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Base64 photos and recordings make request bodies large.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct ProxyState {
    client: reqwest::Client,
    upstreams: Arc<HashMap<String, String>>,
    timeout: Duration,
}

impl ProxyState {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            upstreams: Arc::new(HashMap::new()),
            timeout,
        }
    }

    /// Register the chat-completions base URL for `provider`.
    pub fn with_upstream(mut self, provider: &str, base_url: &str) -> Self {
        Arc::make_mut(&mut self.upstreams).insert(
            provider.to_string(),
            base_url.trim_end_matches('/').to_string(),
        );
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(reqwest::Client::new(), config.request_timeout)
            .with_upstream(NVIDIA_PROVIDER, &config.nvidia_base_url)
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route("/api/:provider/chat/completions", post(chat_completions))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn chat_completions(
    State(state): State<ProxyState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(base_url) = state.upstreams.get(&provider) else {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Unknown provider '{}'", provider),
        );
    };
    let url = format!("{}/chat/completions", base_url);

    let mut request = state
        .client
        .post(&url)
        .timeout(state.timeout)
        .header(header::CONTENT_TYPE.as_str(), "application/json")
        .body(body);
    if let Some(authorization) = headers.get(header::AUTHORIZATION) {
        request = request.header(header::AUTHORIZATION.as_str(), authorization.as_bytes());
    }

    let upstream = match request.send().await {
        Ok(upstream) => upstream,
        Err(e) => {
            error!("Proxy error for {}: {}", provider, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to fetch from {} API", provider),
            );
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let text = match upstream.text().await {
        Ok(text) => text,
        Err(e) => {
            error!("Proxy failed reading {} response: {}", provider, e);
            return error_response(
                StatusCode::BAD_GATEWAY,
                format!("Failed to read {} API response", provider),
            );
        }
    };

    if !status.is_success() {
        error!("{} API error: {} {}", provider, status, text);
        return (status, text).into_response();
    }

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(value) => Json(value).into_response(),
        Err(e) => {
            error!("{} API returned non-JSON body: {}", provider, e);
            error_response(
                StatusCode::BAD_GATEWAY,
                format!("Invalid JSON from {} API", provider),
            )
        }
    }
}

/// Bind to `port` on all interfaces and serve the proxy until shutdown.
pub async fn serve(state: ProxyState, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Proxy listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
