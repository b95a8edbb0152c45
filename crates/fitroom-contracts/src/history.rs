use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::instructions::compose_directive;
use crate::request::{EditRequest, Fit, Placement, RenderStyle, ValidationError};
use crate::result::EditResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditStatus {
    Completed,
    Failed,
}

impl EditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One stored edit, as persistence backends return it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub user_id: String,
    pub subject_image_url: String,
    pub garment_image_url: String,
    pub composite_image_url: Option<String>,
    pub instructions: String,
    pub placement: Placement,
    pub fit: Fit,
    pub style: RenderStyle,
    pub confidence: Option<f64>,
    pub status: EditStatus,
    pub processing_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Insert DTO; the backend assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryRecord {
    pub user_id: String,
    pub subject_image_url: String,
    pub garment_image_url: String,
    pub composite_image_url: Option<String>,
    pub instructions: String,
    pub placement: Placement,
    pub fit: Fit,
    pub style: RenderStyle,
    pub confidence: Option<f64>,
    pub status: EditStatus,
    pub processing_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl NewHistoryRecord {
    /// Derives the stored row from a request and its result. The persisted
    /// instruction text is recomposed with the same directive builder the
    /// pipeline used, so record and model call always agree.
    pub fn from_edit(
        user_id: impl Into<String>,
        request: &EditRequest,
        result: &EditResult,
    ) -> Result<Self, ValidationError> {
        let params = request.resolved_params()?;
        let directive = compose_directive(&params, request.custom_instructions.as_deref());
        let success = result.success();
        Ok(Self {
            user_id: user_id.into(),
            subject_image_url: request.subject_image.clone(),
            garment_image_url: request.garment_image.clone(),
            composite_image_url: success.map(|s| s.composite_url.clone()),
            instructions: directive,
            placement: params.placement,
            fit: params.fit,
            style: params.style,
            confidence: success.map(|s| s.confidence),
            status: result.status(),
            processing_time_ms: Some(result.processing_time_ms),
            created_at: Utc::now(),
        })
    }

    pub fn into_record(self, id: impl Into<String>) -> HistoryRecord {
        HistoryRecord {
            id: id.into(),
            user_id: self.user_id,
            subject_image_url: self.subject_image_url,
            garment_image_url: self.garment_image_url,
            composite_image_url: self.composite_image_url,
            instructions: self.instructions,
            placement: self.placement,
            fit: self.fit,
            style: self.style,
            confidence: self.confidence,
            status: self.status,
            processing_time_ms: self.processing_time_ms,
            created_at: self.created_at,
        }
    }
}
