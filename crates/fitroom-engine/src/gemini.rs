use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::codec::EncodedImage;
use crate::composer::{ComposedImage, GarmentComposer};
use crate::error::EditError;
use crate::truncate_text;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: GEMINI_API_BASE.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Rejects a blank credential before any network activity.
    pub fn new(config: GeminiConfig) -> Result<Self, EditError> {
        if config.api_key.trim().is_empty() {
            return Err(EditError::MissingApiKey);
        }
        Ok(Self {
            config,
            http: reqwest::Client::new(),
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{base}/models/{}:generateContent", self.config.model)
    }
}

#[async_trait]
impl GarmentComposer for GeminiClient {
    async fn compose(
        &self,
        directive: &str,
        subject: &EncodedImage,
        garment: &EncodedImage,
    ) -> Result<ComposedImage, EditError> {
        let endpoint = self.endpoint();
        let payload = build_edit_payload(directive, subject, garment);
        debug!(model = %self.config.model, "submitting garment composition request");

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.config.api_key.as_str())])
            .timeout(self.config.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| EditError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| EditError::Transport(format!("response body read failed: {err}")))?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|_| EditError::Api {
            status: status.as_u16(),
            body: "invalid JSON payload".to_string(),
        })?;
        let (mime_type, data) = extract_inline_image(&parsed).ok_or(EditError::Extraction)?;
        Ok(ComposedImage {
            image: EncodedImage::new(data),
            mime_type: mime_type.unwrap_or_else(|| "image/jpeg".to_string()),
            confidence: extract_confidence(&parsed),
            model: self.config.model.clone(),
        })
    }
}

fn build_edit_payload(directive: &str, subject: &EncodedImage, garment: &EncodedImage) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": directive },
                { "inlineData": { "mimeType": "image/jpeg", "data": subject.as_str() } },
                { "inlineData": { "mimeType": "image/jpeg", "data": garment.as_str() } },
            ],
        }],
        "generationConfig": {
            "temperature": 0.1,
            "topK": 32,
            "topP": 0.95,
            "maxOutputTokens": 1024,
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "object",
                "properties": {
                    "success": { "type": "boolean" },
                    "confidence": { "type": "number" },
                    "appliedInstructions": {
                        "type": "array",
                        "items": { "type": "string" },
                    },
                },
            },
        },
    })
}

fn classify_status(status: u16, body: &str) -> EditError {
    match status {
        429 => EditError::RateLimited,
        403 => EditError::Unauthorized,
        400 => EditError::BadRequest,
        status => EditError::Api {
            status,
            body: truncate_text(body, MAX_ERROR_BODY_CHARS),
        },
    }
}

/// Walks the first candidate's parts and returns the first inline payload.
/// Both `inlineData` and `inline_data` spellings appear in the wild.
fn extract_inline_image(payload: &Value) -> Option<(Option<String>, String)> {
    let parts = candidate_parts(payload)?;
    for part in parts {
        let inline = match part.get("inlineData").or_else(|| part.get("inline_data")) {
            Some(value) => value,
            None => continue,
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Some((mime_type, data.to_string()));
    }
    None
}

fn extract_confidence(payload: &Value) -> Option<f64> {
    let parts = candidate_parts(payload)?;
    for part in parts {
        if let Some(value) = part.get("confidence").and_then(Value::as_f64) {
            return Some(value.clamp(0.0, 1.0));
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            if let Ok(parsed) = serde_json::from_str::<Value>(text) {
                if let Some(value) = parsed.get("confidence").and_then(Value::as_f64) {
                    return Some(value.clamp(0.0, 1.0));
                }
            }
        }
    }
    None
}

fn candidate_parts(payload: &Value) -> Option<&Vec<Value>> {
    payload
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()
}
