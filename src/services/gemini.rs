// src/services/gemini.rs
use crate::errors::RenderError;
use crate::services::retry::classify_failure;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// One part of a multi-part generation request. Image data is carried
/// base64-encoded, ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Image { mime_type: String, data: String },
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageConfig {
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
}

/// Ordered multi-part request; built fresh per call, never mutated after
/// submission.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub parts: Vec<Part>,
    pub image_config: ImageConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

/// Pluggable remote-invocation adapter. Credential sourcing and model
/// routing stay behind this seam.
#[async_trait]
pub trait ImageModelClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, RenderError>;
}

pub struct GeminiClient {
    api_key: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ImageModelClient for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, RenderError> {
        let parts: Vec<serde_json::Value> = request
            .parts
            .iter()
            .map(|part| match part {
                Part::Image { mime_type, data } => json!({
                    "inlineData": { "mimeType": mime_type, "data": data }
                }),
                Part::Text(text) => json!({ "text": text }),
            })
            .collect();

        let mut image_config = serde_json::Map::new();
        if let Some(ratio) = &request.image_config.aspect_ratio {
            image_config.insert("aspectRatio".to_string(), json!(ratio));
        }
        if let Some(size) = &request.image_config.image_size {
            image_config.insert("imageSize".to_string(), json!(size));
        }

        let mut body = json!({
            "contents": [{ "parts": parts }]
        });
        if !image_config.is_empty() {
            body["generationConfig"] = json!({ "imageConfig": image_config });
        }

        let url = format!("{}/{}:generateContent", API_BASE, request.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_failure(&format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = flatten_error_body(&text);
            return Err(classify_failure(&format!("{} {}", status.as_u16(), message)));
        }

        response
            .json::<GenerationResponse>()
            .await
            .map_err(|e| RenderError::Unclassified(format!("Failed to parse model response: {}", e)))
    }
}

/// Reduces an API error payload to a flat message string. Handles the
/// `{"error": {"message": ...}}` envelope; anything else passes through
/// as the raw body text, so the result is always serializable.
pub fn flatten_error_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value["error"]["message"].as_str() {
            return message.to_string();
        }
        if let Some(message) = value["message"].as_str() {
            return message.to_string();
        }
    }
    if body.is_empty() {
        "Unknown error".to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_extracts_nested_error_message() {
        let body = r#"{"error":{"message":"The model is overloaded","code":503}}"#;
        assert_eq!(flatten_error_body(body), "The model is overloaded");
    }

    #[test]
    fn flatten_extracts_top_level_message() {
        let body = r#"{"message":"rate limit exceeded"}"#;
        assert_eq!(flatten_error_body(body), "rate limit exceeded");
    }

    #[test]
    fn flatten_passes_through_plain_text() {
        assert_eq!(flatten_error_body("<html>bad gateway</html>"), "<html>bad gateway</html>");
        assert_eq!(flatten_error_body(""), "Unknown error");
    }

    #[test]
    fn response_tolerates_empty_candidates() {
        let parsed: GenerationResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }

    #[test]
    fn response_parses_inline_image_part() {
        let raw = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "here you go" },
                        { "inlineData": { "mimeType": "image/png", "data": "QUJD" } }
                    ]
                }
            }]
        }"#;
        let parsed: GenerationResponse = serde_json::from_str(raw).unwrap();
        let content = parsed.candidates[0].content.as_ref().unwrap();
        assert_eq!(content.parts.len(), 2);
        assert_eq!(content.parts[0].text.as_deref(), Some("here you go"));
        let inline = content.parts[1].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "QUJD");
    }

    #[test]
    fn response_tolerates_candidate_without_content() {
        let raw = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let parsed: GenerationResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.candidates[0].content.is_none());
    }
}
