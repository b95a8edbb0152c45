use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_INSTRUCTION_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    UpperBody,
    LowerBody,
    #[default]
    FullBody,
    Accessory,
}

impl Placement {
    pub const NAMES: [&'static str; 4] = ["upper-body", "lower-body", "full-body", "accessory"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upper-body" => Some(Self::UpperBody),
            "lower-body" => Some(Self::LowerBody),
            "full-body" => Some(Self::FullBody),
            "accessory" => Some(Self::Accessory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UpperBody => "upper-body",
            Self::LowerBody => "lower-body",
            Self::FullBody => "full-body",
            Self::Accessory => "accessory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    Snug,
    #[default]
    Regular,
    Loose,
}

impl Fit {
    pub const NAMES: [&'static str; 3] = ["snug", "regular", "loose"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "snug" => Some(Self::Snug),
            "regular" => Some(Self::Regular),
            "loose" => Some(Self::Loose),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snug => "snug",
            Self::Regular => "regular",
            Self::Loose => "loose",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStyle {
    #[default]
    Realistic,
    Stylized,
    Enhanced,
}

impl RenderStyle {
    pub const NAMES: [&'static str; 3] = ["realistic", "stylized", "enhanced"];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "realistic" => Some(Self::Realistic),
            "stylized" => Some(Self::Stylized),
            "enhanced" => Some(Self::Enhanced),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realistic => "realistic",
            Self::Stylized => "stylized",
            Self::Enhanced => "enhanced",
        }
    }
}

/// A single try-on request as callers submit it.
///
/// Placement, fit, and style travel as raw strings so validation can report
/// every bad value at once instead of failing at the first parse. The typed
/// form lives in [`EditParams`]. Serde aliases keep the legacy wire names
/// (`position`, `instructions`) accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRequest {
    pub subject_image: String,
    pub garment_image: String,
    #[serde(default, alias = "position", skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, alias = "instructions", skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditParams {
    pub placement: Placement,
    pub fit: Fit,
    pub style: RenderStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed: {}", .violations.join("; "))]
pub struct ValidationError {
    pub violations: Vec<String>,
}

impl EditRequest {
    pub fn new(subject_image: impl Into<String>, garment_image: impl Into<String>) -> Self {
        Self {
            subject_image: subject_image.into(),
            garment_image: garment_image.into(),
            placement: None,
            fit: None,
            style: None,
            custom_instructions: None,
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement.as_str().to_string());
        self
    }

    pub fn with_fit(mut self, fit: Fit) -> Self {
        self.fit = Some(fit.as_str().to_string());
        self
    }

    pub fn with_style(mut self, style: RenderStyle) -> Self {
        self.style = Some(style.as_str().to_string());
        self
    }

    pub fn with_instructions(mut self, text: impl Into<String>) -> Self {
        self.custom_instructions = Some(text.into());
        self
    }

    /// Collects every violation before failing; a request with three bad
    /// fields reports all three.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        if self.subject_image.trim().is_empty() {
            violations.push("Subject image is required".to_string());
        }
        if self.garment_image.trim().is_empty() {
            violations.push("Garment image is required".to_string());
        }
        if let Some(value) = non_empty(&self.placement) {
            if Placement::parse(value).is_none() {
                violations.push(format!(
                    "Invalid position: {value}. Valid options: {}",
                    Placement::NAMES.join(", ")
                ));
            }
        }
        if let Some(value) = non_empty(&self.fit) {
            if Fit::parse(value).is_none() {
                violations.push(format!(
                    "Invalid fit: {value}. Valid options: {}",
                    Fit::NAMES.join(", ")
                ));
            }
        }
        if let Some(value) = non_empty(&self.style) {
            if RenderStyle::parse(value).is_none() {
                violations.push(format!(
                    "Invalid style: {value}. Valid options: {}",
                    RenderStyle::NAMES.join(", ")
                ));
            }
        }
        if let Some(text) = self.custom_instructions.as_deref() {
            if text.chars().count() > MAX_INSTRUCTION_CHARS {
                violations.push(format!(
                    "Instructions too long: maximum {MAX_INSTRUCTION_CHARS} characters"
                ));
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }

    /// Validates, then resolves absent or blank fields to their defaults
    /// (full-body, regular, realistic).
    pub fn resolved_params(&self) -> Result<EditParams, ValidationError> {
        self.validate()?;
        Ok(EditParams {
            placement: non_empty(&self.placement)
                .and_then(Placement::parse)
                .unwrap_or_default(),
            fit: non_empty(&self.fit).and_then(Fit::parse).unwrap_or_default(),
            style: non_empty(&self.style)
                .and_then(RenderStyle::parse)
                .unwrap_or_default(),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}
