use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::debug;

use crate::error::EditError;

pub const MIN_IMAGE_BYTES: u64 = 1024;
pub const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;
pub const SUPPORTED_FORMATS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Base64 image payload in canonical form, scheme prefix already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(BASE64.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Size estimate from the text length alone; padding can overshoot the
    /// decoded size by up to two bytes.
    pub fn estimated_size_bytes(&self) -> u64 {
        (self.0.len() as u64 * 3).div_ceil(4)
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(self.0.as_bytes())
    }

    pub fn to_data_url(&self, mime_type: &str) -> String {
        format!("data:{mime_type};base64,{}", self.0)
    }
}

/// Normalizes one image reference to its encoded payload: data URLs are
/// stripped, remote URLs fetched and re-encoded, bare local paths rejected
/// without any network attempt.
pub async fn resolve_image_ref(
    http: &reqwest::Client,
    reference: &str,
) -> Result<EncodedImage, EditError> {
    if let Some(rest) = reference.strip_prefix("data:") {
        let payload = rest.split_once(',').map(|(_, payload)| payload).ok_or_else(|| {
            EditError::ImageConversion("malformed data URL, missing payload".to_string())
        })?;
        return Ok(EncodedImage::new(payload));
    }
    if reference.starts_with("http") {
        debug!(url = reference, "fetching remote image");
        let response = http
            .get(reference)
            .send()
            .await
            .map_err(|err| EditError::ImageConversion(format!("failed to fetch image: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EditError::ImageConversion(format!(
                "failed to fetch image ({status})"
            )));
        }
        let bytes = response.bytes().await.map_err(|err| {
            EditError::ImageConversion(format!("failed to read image body: {err}"))
        })?;
        return Ok(EncodedImage::from_bytes(&bytes));
    }
    Err(EditError::LocalFileRef)
}

/// Ordered payload checks; the first failure wins. The extension check only
/// fires when `name` carries a real dotted extension, so pipeline labels
/// like `subject-image` skip it.
pub fn validate_payload(image: &EncodedImage, name: &str) -> Result<(), EditError> {
    if image.is_empty() {
        return Err(EditError::InvalidImage(
            "Invalid image data: empty or not a string".to_string(),
        ));
    }
    let estimated = image.estimated_size_bytes();
    if estimated < MIN_IMAGE_BYTES {
        return Err(EditError::InvalidImage(
            "Image too small: must be at least 1KB".to_string(),
        ));
    }
    if estimated > MAX_IMAGE_BYTES {
        let actual_mb = estimated as f64 / 1024.0 / 1024.0;
        return Err(EditError::InvalidImage(format!(
            "Image size exceeds {}MB limit (actual: {actual_mb:.2}MB)",
            MAX_IMAGE_BYTES / 1024 / 1024
        )));
    }
    if !is_canonical_base64(image.as_str()) {
        return Err(EditError::InvalidImage(
            "Invalid base64 image format".to_string(),
        ));
    }
    if let Some(extension) = known_extension(name) {
        if !SUPPORTED_FORMATS.contains(&extension.as_str()) {
            return Err(EditError::InvalidImage(format!(
                "Unsupported image format: {extension}. Supported: {}",
                SUPPORTED_FORMATS.join(", ")
            )));
        }
    }
    Ok(())
}

fn is_canonical_base64(payload: &str) -> bool {
    let trimmed = payload.trim_end_matches('=');
    if payload.len() - trimmed.len() > 2 {
        return false;
    }
    trimmed
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'+' || byte == b'/')
}

fn known_extension(name: &str) -> Option<String> {
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}
