use thiserror::Error;

use fitroom_contracts::request::ValidationError;

use crate::history_store::HistoryError;
use crate::upload::UploadError;

/// Everything a single edit can fail with. Only the fatal classes
/// ([`EditError::is_fatal`]) escape [`crate::TryOnService::edit`] as `Err`;
/// the rest are demoted to a failed result carrying the `Display` text.
#[derive(Debug, Error)]
pub enum EditError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Gemini API key not configured")]
    MissingApiKey,
    #[error("Image conversion failed: {0}")]
    ImageConversion(String),
    #[error("Local file URIs not supported. Please upload the image first.")]
    LocalFileRef,
    #[error("Image validation failed: {0}")]
    InvalidImage(String),
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("Invalid API key or insufficient permissions.")]
    Unauthorized,
    #[error("Invalid request. Please check image formats and sizes.")]
    BadRequest,
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },
    #[error("model request failed: {0}")]
    Transport(String),
    #[error("Failed to extract edited image from API response")]
    Extraction,
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("History persistence failed: {0}")]
    History(#[from] HistoryError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EditError {
    /// Fatal classes abort the caller's flow instead of producing a failed
    /// result: a missing credential or a rejected one cannot be fixed by
    /// retrying the edit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingApiKey | Self::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classes_are_the_credential_ones() {
        assert!(EditError::MissingApiKey.is_fatal());
        assert!(EditError::Unauthorized.is_fatal());
        assert!(!EditError::RateLimited.is_fatal());
        assert!(!EditError::Extraction.is_fatal());
        assert!(!EditError::BadRequest.is_fatal());
        assert!(!EditError::Api {
            status: 503,
            body: "overloaded".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn messages_stay_caller_facing() {
        assert_eq!(
            EditError::RateLimited.to_string(),
            "Rate limit exceeded. Please try again later."
        );
        assert_eq!(
            EditError::Unauthorized.to_string(),
            "Invalid API key or insufficient permissions."
        );
        assert_eq!(
            EditError::BadRequest.to_string(),
            "Invalid request. Please check image formats and sizes."
        );
        assert_eq!(
            EditError::Api {
                status: 502,
                body: "bad gateway".to_string()
            }
            .to_string(),
            "API error: 502 - bad gateway"
        );
        assert_eq!(
            EditError::Extraction.to_string(),
            "Failed to extract edited image from API response"
        );
    }

    #[test]
    fn validation_errors_pass_through_transparently() {
        let err: EditError = ValidationError {
            violations: vec!["Garment image is required".to_string()],
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Validation failed: Garment image is required"
        );
        assert!(!err.is_fatal());
    }
}
