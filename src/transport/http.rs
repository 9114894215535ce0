//! HTTP transport: one JSON POST per attempt.

use std::time::Duration;
use url::Url;

use crate::config::BackendConfig;
use crate::error::{BuildError, TransportError};
use crate::transport::wire::{decode_response, BackendRequest, ModelOutput};
use crate::types::InferenceMode;

/// Bound on establishing a TCP connection to the backend.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(config: &BackendConfig) -> Result<Self, BuildError> {
        let base: Url = config
            .base_url
            .parse()
            .map_err(|e: url::ParseError| BuildError::BackendUrl(e.to_string()))?;
        let endpoint = base
            .join(&config.infer_path)
            .map_err(|e| BuildError::BackendUrl(e.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("ai-brain/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BuildError::HttpClient(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send one attempt. The caller bounds it with the attempt timeout.
    pub async fn call(&self, mode: InferenceMode, payload: &str) -> Result<ModelOutput, TransportError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&BackendRequest { mode, payload })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(status = %status, "Inference backend returned error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: truncate(&body, 256),
            });
        }

        decode_response(mode, &body)
    }
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_join() {
        let config = BackendConfig {
            base_url: "http://gpu-box:8000".to_string(),
            infer_path: "/v1/infer".to_string(),
            ..BackendConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(transport.endpoint().as_str(), "http://gpu-box:8000/v1/infer");
    }

    #[test]
    fn test_invalid_base_url() {
        let config = BackendConfig {
            base_url: "::not-a-url".to_string(),
            ..BackendConfig::default()
        };
        assert!(matches!(HttpTransport::new(&config), Err(BuildError::BackendUrl(_))));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_connect_error() {
        let config = BackendConfig {
            // Port 9 (discard) on localhost is closed in test environments
            base_url: "http://127.0.0.1:9".to_string(),
            ..BackendConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let err = transport.call(InferenceMode::Chat, "hello").await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_) | TransportError::Request(_)), "{err:?}");
    }
}
