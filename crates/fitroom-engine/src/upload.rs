use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::EncodedImage;
use crate::storage::{ObjectStore, PutOptions, StorageError};
use crate::{timestamp_millis, Sleeper};

/// Below this the payload cannot be a real composite, so no attempt is made.
const MIN_COMPOSITE_BYTES: u64 = 100;
const BASE_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 5000;
const UPLOAD_CACHE_CONTROL: &str = "max-age=3600";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Fatal(StorageError),
    #[error("Upload failed after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: StorageError },
}

/// Stores an extracted composite under the user's namespace and returns its
/// public URL. Transient storage errors are retried with exponential backoff;
/// structural ones (missing bucket, permissions, quota) abort at once.
pub(crate) async fn upload_composite(
    store: &dyn ObjectStore,
    sleeper: &dyn Sleeper,
    user_id: &str,
    image: &EncodedImage,
    mime_type: &str,
    max_attempts: u32,
) -> Result<String, UploadError> {
    if image.estimated_size_bytes() < MIN_COMPOSITE_BYTES {
        return Err(UploadError::InvalidPayload(
            "Invalid composite image: too small or empty".to_string(),
        ));
    }
    let bytes = image.decode().map_err(|err| {
        UploadError::InvalidPayload(format!("Failed to convert base64 to blob: {err}"))
    })?;
    if (bytes.len() as u64) < MIN_COMPOSITE_BYTES {
        return Err(UploadError::InvalidPayload(
            "Generated image too small for upload".to_string(),
        ));
    }

    let max_attempts = max_attempts.max(1);
    let extension = extension_for_mime(mime_type);
    for attempt in 1..=max_attempts {
        let key = format!("{user_id}/{}-composite.{extension}", timestamp_millis());
        let options = PutOptions {
            content_type: mime_type.to_string(),
            cache_control: UPLOAD_CACHE_CONTROL.to_string(),
            // Overwrite is only safe once we own a key from a prior attempt.
            upsert: attempt > 1,
        };
        match store.put_object(&key, &bytes, &options).await {
            Ok(()) => {
                let url = store.public_url(&key);
                debug!(%key, attempt, "composite upload succeeded");
                return Ok(url);
            }
            Err(err) if err.is_fatal() => return Err(UploadError::Fatal(err)),
            Err(err) if attempt == max_attempts => {
                return Err(UploadError::Exhausted {
                    attempts: max_attempts,
                    source: err,
                });
            }
            Err(err) => {
                let delay = backoff_delay(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "composite upload attempt failed"
                );
                sleeper.sleep(delay).await;
            }
        }
    }
    unreachable!("upload retry loop always returns")
}

pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64 << attempt.saturating_sub(1).min(31);
    Duration::from_millis((BASE_BACKOFF_MS * factor).min(MAX_BACKOFF_MS))
}

pub(crate) fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}
