//! [`InferenceClient`] – the console's side of `/process-image`.
//!
//! Every request carries a hard timeout; a slow model surfaces as
//! [`ClientError::Timeout`] instead of a hung console.

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::api::{HealthResponse, ProcessImageRequest};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("inference request timed out")]
    Timeout,
    #[error("API returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("Unexpected API response")]
    UnexpectedResponse,
    #[error("request failed: {0}")]
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(e)
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceClient {
    base_url: String,
    client: reqwest::Client,
}

impl InferenceClient {
    /// Client for the service at `base_url` (e.g. `http://localhost:5000`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Transport)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the service for commands for `image` and the operator's
    /// `prompt`.  Returns the raw model text.
    ///
    /// # Errors
    ///
    /// [`ClientError::Status`] for any non-200 reply,
    /// [`ClientError::UnexpectedResponse`] if a 200 reply has no string
    /// `commands`, [`ClientError::Timeout`] or [`ClientError::Transport`]
    /// otherwise.
    pub async fn process_image(&self, image: &Path, prompt: &str) -> Result<String, ClientError> {
        let body = ProcessImageRequest {
            image_path: Some(image.display().to_string()),
            user_prompt: Some(prompt.to_string()),
        };
        let response = self
            .client
            .post(format!("{}/process-image", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|_| ClientError::UnexpectedResponse)?;
        value
            .get("commands")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or(ClientError::UnexpectedResponse)
    }

    /// `GET /health`.
    ///
    /// # Errors
    ///
    /// Same classes as [`process_image`][Self::process_image].
    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                code: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        response
            .json()
            .await
            .map_err(|_| ClientError::UnexpectedResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::Router;
    use axum::routing::post;
    use tokio::net::TcpListener;

    use crate::model::{ModelError, VisionModel};
    use crate::server::{AppState, ServerConfig, router};

    struct Echo;

    #[async_trait]
    impl VisionModel for Echo {
        async fn generate(&self, _image: &Path, _prompt: &str) -> Result<String, ModelError> {
            Ok("[turn_left(90)]".into())
        }
    }

    struct Slow;

    #[async_trait]
    impl VisionModel for Slow {
        async fn generate(&self, _image: &Path, _prompt: &str) -> Result<String, ModelError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    async fn spawn(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn spawn_service(model: Arc<dyn VisionModel>) -> String {
        spawn(router(AppState::new(model), &ServerConfig::default())).await
    }

    #[tokio::test]
    async fn roundtrip_against_live_server() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("rosbot_image_3.bmp");
        std::fs::write(&image, b"BM").unwrap();

        let url = spawn_service(Arc::new(Echo)).await;
        let client = InferenceClient::new(url, Duration::from_secs(5)).unwrap();
        assert_eq!(client.health().await.unwrap(), HealthResponse::up());
        assert_eq!(
            client.process_image(&image, "turn").await.unwrap(),
            "[turn_left(90)]"
        );
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let url = spawn_service(Arc::new(Echo)).await;
        let client = InferenceClient::new(url, Duration::from_secs(5)).unwrap();
        match client.process_image(Path::new("/nope.bmp"), "").await {
            Err(ClientError::Status { code, body }) => {
                assert_eq!(code, 400);
                assert!(body.contains("Image path does not exist"));
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_payload_is_rejected() {
        let url = spawn_service(Arc::new(Echo)).await;
        let resp = reqwest::Client::new()
            .post(format!("{url}/process-image"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"], "Invalid JSON payload");
    }

    #[tokio::test]
    async fn reply_without_commands_is_unexpected() {
        let app = Router::new().route(
            "/process-image",
            post(|| async { axum::Json(serde_json::json!({"result": "?"})) }),
        );
        let url = spawn(app).await;
        let client = InferenceClient::new(url, Duration::from_secs(5)).unwrap();
        let err = client.process_image(Path::new("/x"), "").await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse));
        assert_eq!(err.to_string(), "Unexpected API response");
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("f.bmp");
        std::fs::write(&image, b"BM").unwrap();

        let url = spawn_service(Arc::new(Slow)).await;
        let client = InferenceClient::new(url, Duration::from_millis(200)).unwrap();
        let err = client.process_image(&image, "").await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout));
    }
}
