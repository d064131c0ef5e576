//! [`VisionModel`] – the vision-language backend behind `/process-image`.
//!
//! The service treats the model as a black box: image plus prompt in, text
//! out.  [`OllamaVision`] talks to a local [Ollama](https://ollama.com)
//! server's `/api/chat` endpoint, sending the image base64-encoded.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Used when the operator sends an empty instruction.
pub const DEFAULT_INSTRUCTION: &str =
    "Based on this image, generate robot commands for the most logical task.";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("cannot read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
}

#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Run the model on the image at `image` with `prompt`; returns its raw
    /// text.
    async fn generate(&self, image: &Path, prompt: &str) -> Result<String, ModelError>;
}

/// Full model prompt for an operator instruction.
pub fn build_prompt(instruction: &str) -> String {
    let instruction = match instruction.trim() {
        "" => DEFAULT_INSTRUCTION,
        s => s,
    };
    format!(
        r#"You are a Vision-Language-Action (VLA) model controlling a robot. Based on the image and the user's instruction: "{instruction}", generate a sequence of robot commands.

Available functions:
- go_ahead(distance_meters): Move forward by the specified distance
- go_back(distance_meters): Move backward by the specified distance
- turn_left(angle_degrees): Turn left by the specified angle in degrees
- turn_right(angle_degrees): Turn right by the specified angle in degrees
- change_speed(speed_percent): Change the robot's movement speed

Provide your response as a list of function calls with appropriate parameters. For example:
[
    "go_ahead(1.5)",
    "turn_left(45)",
]

Return ONLY the command list with NO explanations or additional text.
"#
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Ollama backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
    images: [String; 1],
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct OllamaVision {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaVision {
    /// `base_url` e.g. `"http://localhost:11434"`, `model` e.g. `"gemma3:4b"`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl VisionModel for OllamaVision {
    async fn generate(&self, image: &Path, prompt: &str) -> Result<String, ModelError> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|source| ModelError::Image {
                path: image.to_path_buf(),
                source,
            })?;
        debug!(image = %image.display(), bytes = bytes.len(), model = %self.model, "querying vision model");

        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
                images: [STANDARD.encode(&bytes)],
            }],
            stream: false,
        };
        let url = format!("{}/api/chat", self.base_url);
        let response: ChatResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .message
            .map(|m| m.content)
            .ok_or_else(|| ModelError::BadResponse("missing message.content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_instruction_and_vocabulary() {
        let prompt = build_prompt("find the red ball");
        assert!(prompt.contains("\"find the red ball\""));
        for f in ["go_ahead", "go_back", "turn_left", "turn_right", "change_speed"] {
            assert!(prompt.contains(f), "{f} missing from prompt");
        }
        assert!(prompt.contains("Return ONLY the command list"));
    }

    #[test]
    fn empty_instruction_uses_default() {
        assert!(build_prompt("   ").contains(DEFAULT_INSTRUCTION));
    }

    #[test]
    fn request_body_shape() {
        let body = ChatRequest {
            model: "gemma3:4b",
            messages: [ChatMessage {
                role: "user",
                content: "hi",
                images: [STANDARD.encode(b"BM")],
            }],
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "gemma3:4b");
        assert_eq!(json["messages"][0]["images"][0], "Qk0=");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let m = OllamaVision::new("http://localhost:11434/", "gemma3:4b");
        assert_eq!(m.base_url, "http://localhost:11434");
        assert_eq!(m.model(), "gemma3:4b");
    }

    #[tokio::test]
    async fn missing_image_is_reported_before_any_request() {
        let m = OllamaVision::new("http://127.0.0.1:9", "gemma3:4b");
        let err = m
            .generate(Path::new("/definitely/not/here.bmp"), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::Image { .. }));
    }
}
