//! Wire types of the inference service.
//!
//! | Method | Path | Body | Success | Failure |
//! |---|---|---|---|---|
//! | `POST` | `/process-image` | [`ProcessImageRequest`] | 200 [`ProcessImageResponse`] | 4xx/5xx [`ErrorResponse`] |
//! | `GET` | `/health` | – | 200 [`HealthResponse`] | – |

use serde::{Deserialize, Serialize};

pub const SERVICE_NAME: &str = "VLA Robot Command Service";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessImageRequest {
    /// Path to a frame on the shared filesystem.  May be wrapped in one pair
    /// of matching quotes.
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

/// Raw model text.  Not validated: interpretation happens on the robot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessImageResponse {
    pub commands: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

impl HealthResponse {
    pub fn up() -> Self {
        Self {
            status: "up".to_string(),
            service: SERVICE_NAME.to_string(),
        }
    }
}

/// Trim `raw` and drop one layer of matching surrounding quotes.
pub fn normalize_image_path(raw: &str) -> &str {
    let trimmed = raw.trim();
    for q in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
        {
            return inner;
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_whitespace_are_stripped_once() {
        assert_eq!(normalize_image_path("  /tmp/a.bmp "), "/tmp/a.bmp");
        assert_eq!(normalize_image_path("\"/tmp/a b.bmp\""), "/tmp/a b.bmp");
        assert_eq!(normalize_image_path("'/tmp/a.bmp'"), "/tmp/a.bmp");
        assert_eq!(normalize_image_path("\"'/tmp/a.bmp'\""), "'/tmp/a.bmp'");
        assert_eq!(normalize_image_path("\"/tmp/a.bmp'"), "\"/tmp/a.bmp'");
        assert_eq!(normalize_image_path("\""), "\"");
    }

    #[test]
    fn request_fields_are_optional_on_the_wire() {
        let req: ProcessImageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req, ProcessImageRequest::default());
        let req: ProcessImageRequest =
            serde_json::from_str(r#"{"image_path": "/x.bmp", "user_prompt": "go"}"#).unwrap();
        assert_eq!(req.image_path.as_deref(), Some("/x.bmp"));
    }

    #[test]
    fn health_payload_is_fixed() {
        let json = serde_json::to_value(HealthResponse::up()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "up", "service": "VLA Robot Command Service"})
        );
    }
}
