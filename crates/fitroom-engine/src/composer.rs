use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};

use crate::codec::EncodedImage;
use crate::error::EditError;

/// Confidence reported when the model omits its own estimate.
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

const DRYRUN_EDGE: u32 = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedImage {
    pub image: EncodedImage,
    pub mime_type: String,
    pub confidence: Option<f64>,
    pub model: String,
}

/// Produces the composite for one edit. Implementations own their transport;
/// the pipeline only sees the directive and the two encoded inputs.
#[async_trait]
pub trait GarmentComposer: Send + Sync {
    async fn compose(
        &self,
        directive: &str,
        subject: &EncodedImage,
        garment: &EncodedImage,
    ) -> Result<ComposedImage, EditError>;
}

/// Offline composer: a solid-color frame derived from a digest of the
/// directive, so repeated runs are comparable without any credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryrunComposer;

#[async_trait]
impl GarmentComposer for DryrunComposer {
    async fn compose(
        &self,
        directive: &str,
        subject: &EncodedImage,
        garment: &EncodedImage,
    ) -> Result<ComposedImage, EditError> {
        let seed = (subject.as_str().len() + garment.as_str().len()) as u64;
        let (r, g, b) = color_from_directive(directive, seed);
        let mut frame = RgbImage::new(DRYRUN_EDGE, DRYRUN_EDGE);
        for pixel in frame.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        let mut cursor = Cursor::new(Vec::new());
        frame
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| EditError::Internal(format!("dryrun frame encode failed: {err}")))?;
        Ok(ComposedImage {
            image: EncodedImage::from_bytes(&cursor.into_inner()),
            mime_type: "image/png".to_string(),
            confidence: None,
            model: "dryrun-tryon-1".to_string(),
        })
    }
}

fn color_from_directive(directive: &str, seed: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(directive.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}
