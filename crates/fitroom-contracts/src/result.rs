use serde::{Deserialize, Serialize};

use crate::history::EditStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditDetails {
    pub model: String,
    #[serde(default)]
    pub applied_instructions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditSuccess {
    pub composite_url: String,
    pub preview_data_url: String,
    pub confidence: f64,
    pub details: EditDetails,
}

/// Success carries its payload, failure carries its message; no boolean flag
/// that can disagree with the fields next to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditOutcome {
    Completed(EditSuccess),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditResult {
    #[serde(flatten)]
    pub outcome: EditOutcome,
    pub processing_time_ms: u64,
}

impl EditResult {
    pub fn completed(success: EditSuccess, processing_time_ms: u64) -> Self {
        Self {
            outcome: EditOutcome::Completed(success),
            processing_time_ms,
        }
    }

    pub fn failed(error: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            outcome: EditOutcome::Failed {
                error: error.into(),
            },
            processing_time_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, EditOutcome::Completed(_))
    }

    pub fn success(&self) -> Option<&EditSuccess> {
        match &self.outcome {
            EditOutcome::Completed(success) => Some(success),
            EditOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            EditOutcome::Completed(_) => None,
            EditOutcome::Failed { error } => Some(error),
        }
    }

    pub fn status(&self) -> EditStatus {
        if self.is_success() {
            EditStatus::Completed
        } else {
            EditStatus::Failed
        }
    }
}
