use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{AspectRatio, GroundingSource, Role};

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Rate limited: retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Quota exhaustion is reported either as HTTP 429 or in the error text.
    pub fn is_quota(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            other => {
                let text = other.to_string();
                text.contains("quota") || text.contains("RESOURCE_EXHAUSTED")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl ImageAttachment {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    pub fn from_base64(mime_type: &str, data: &str) -> Result<Self, ProviderError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| ProviderError::InvalidResponse(format!("Bad image data: {}", e)))?;
        Ok(Self {
            mime_type: mime_type.to_string(),
            data: bytes,
        })
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn from_data_uri(uri: &str) -> Result<Self, ProviderError> {
        let (mime_type, data) = uri
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(";base64,"))
            .ok_or_else(|| ProviderError::InvalidResponse("Not a base64 data URI".to_string()))?;
        Self::from_base64(mime_type, data)
    }

    /// Mime type guessed from a file extension; unknown extensions read as PNG.
    pub fn mime_for_extension(ext: &str) -> &'static str {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "image/png",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub images: Vec<ImageAttachment>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }
}

/// What kind of payload the caller expects back from `generate`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    Json { schema: serde_json::Value },
    Image { aspect_ratio: Option<AspectRatio> },
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub format: ResponseFormat,
    pub google_search: bool,
}

impl GenerateRequest {
    pub fn text(model: &str, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.to_string(),
            messages,
            system_prompt: None,
            temperature: None,
            format: ResponseFormat::Text,
            google_search: false,
        }
    }

    pub fn prompt(model: &str, prompt: impl Into<String>) -> Self {
        Self::text(model, vec![ChatMessage::user(prompt)])
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub images: Vec<ImageAttachment>,
    pub sources: Vec<GroundingSource>,
    pub model: String,
    pub tokens_in: Option<i64>,
    pub tokens_out: Option<i64>,
}

/// Request for the dedicated image model (Imagen `:predict`).
#[derive(Debug, Clone)]
pub struct ImagenRequest {
    pub model: String,
    pub prompt: String,
    pub count: u8,
    pub aspect_ratio: AspectRatio,
    pub mime_type: String,
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Token(String),
    Done {
        tokens_in: Option<i64>,
        tokens_out: Option<i64>,
    },
    Error(ProviderError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_detection() {
        assert!(ProviderError::RateLimited { retry_after_secs: None }.is_quota());
        assert!(ProviderError::RequestFailed("HTTP 400: RESOURCE_EXHAUSTED".into()).is_quota());
        assert!(ProviderError::RequestFailed("You exceeded your current quota".into()).is_quota());
        assert!(!ProviderError::NetworkError("connection reset".into()).is_quota());
    }

    #[test]
    fn test_data_uri() {
        let img = ImageAttachment {
            mime_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        };
        assert_eq!(img.to_data_uri(), "data:image/png;base64,AQID");
        let back = ImageAttachment::from_base64("image/png", "AQID").unwrap();
        assert_eq!(back, img);
        assert_eq!(ImageAttachment::from_data_uri("data:image/png;base64,AQID").unwrap(), img);
        assert!(ImageAttachment::from_data_uri("https://example.com/a.png").is_err());
    }

    #[test]
    fn test_extensions() {
        assert_eq!(ImageAttachment::mime_for_extension("JPG"), "image/jpeg");
        assert_eq!(ImageAttachment::mime_for_extension("bmp"), "image/png");
        let img = ImageAttachment {
            mime_type: "image/jpeg".to_string(),
            data: vec![],
        };
        assert_eq!(img.file_extension(), "jpg");
    }
}
