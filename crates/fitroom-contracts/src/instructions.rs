use crate::request::{EditParams, Fit, Placement, RenderStyle};

const BASE_DIRECTIVE: &str = "Create a realistic virtual try-on image by overlaying the garment \
onto the user photo. Ensure natural fitting, proper shadows, and realistic blending.";

impl Placement {
    pub fn directive_clause(&self) -> &'static str {
        match self {
            Self::UpperBody => {
                "Focus on upper body placement. Ensure proper alignment with shoulders, chest, and arms."
            }
            Self::LowerBody => {
                "Focus on lower body placement. Ensure proper alignment with waist, hips, and legs."
            }
            Self::FullBody => "Place garment on appropriate body section with full-body visibility.",
            Self::Accessory => {
                "Position accessory naturally on the user (hat on head, bag in hand, watch on wrist, etc.)."
            }
        }
    }
}

impl Fit {
    pub fn directive_clause(&self) -> &'static str {
        match self {
            Self::Snug => "Apply with close fit to body, showing natural contours.",
            Self::Regular => "Apply with standard fit, neither too tight nor too loose.",
            Self::Loose => "Apply with relaxed fit, showing natural draping and movement.",
        }
    }
}

impl RenderStyle {
    pub fn directive_clause(&self) -> &'static str {
        match self {
            Self::Realistic => {
                "Create photorealistic result with accurate lighting, shadows, and textures."
            }
            Self::Stylized => "Apply artistic enhancement while maintaining recognizable features.",
            Self::Enhanced => {
                "Improve overall appearance with subtle enhancements to lighting and colors."
            }
        }
    }
}

/// Builds the model-facing directive for one edit. Deterministic: the same
/// params and custom text always produce the same string, and the identical
/// string is what history stores.
pub fn compose_directive(params: &EditParams, custom: Option<&str>) -> String {
    let mut directive = String::from(BASE_DIRECTIVE);
    directive.push(' ');
    directive.push_str(params.placement.directive_clause());
    directive.push(' ');
    directive.push_str(params.fit.directive_clause());
    directive.push(' ');
    directive.push_str(params.style.directive_clause());
    if let Some(custom) = custom.filter(|text| !text.is_empty()) {
        directive.push_str(" Additional requirements: ");
        directive.push_str(custom);
    }
    directive
}
