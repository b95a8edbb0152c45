use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use fitroom_contracts::history::{HistoryRecord, NewHistoryRecord};
use fitroom_contracts::instructions::compose_directive;
use fitroom_contracts::request::EditRequest;
use fitroom_contracts::result::{EditDetails, EditResult, EditSuccess};
use fitroom_contracts::usage::{summarize, UsageSummary};

pub mod batch;
pub mod codec;
pub mod composer;
pub mod error;
pub mod gemini;
pub mod history_store;
pub mod storage;
#[cfg(test)]
pub(crate) mod testing;
pub mod upload;

use composer::GarmentComposer;
use error::EditError;
use history_store::HistoryStore;
use storage::ObjectStore;

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Cooperative wait used for retry backoff and batch pacing. Injected so
/// tests observe delays instead of serving them.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub max_upload_attempts: u32,
    pub batch_pause: Duration,
    pub default_confidence: f64,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            max_upload_attempts: 3,
            batch_pause: Duration::from_secs(1),
            default_confidence: composer::DEFAULT_CONFIDENCE,
        }
    }
}

/// The try-on pipeline for one user: validate, resolve images, compose via
/// the model, upload the composite, record history.
pub struct TryOnService {
    composer: Arc<dyn GarmentComposer>,
    store: Arc<dyn ObjectStore>,
    history: Arc<dyn HistoryStore>,
    sleeper: Arc<dyn Sleeper>,
    http: reqwest::Client,
    user_id: String,
    options: ServiceOptions,
}

impl TryOnService {
    pub fn new(
        user_id: impl Into<String>,
        composer: Arc<dyn GarmentComposer>,
        store: Arc<dyn ObjectStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            composer,
            store,
            history,
            sleeper: Arc::new(TokioSleeper),
            http: reqwest::Client::new(),
            user_id: user_id.into(),
            options: ServiceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Runs one edit end to end. Fatal conditions (missing or rejected
    /// credential) propagate as errors; every other failure comes back as a
    /// failed [`EditResult`], so callers always receive a result object.
    pub async fn edit(&self, request: &EditRequest) -> Result<EditResult, EditError> {
        let started = Instant::now();
        match self.run_pipeline(request).await {
            Ok(success) => Ok(EditResult::completed(success, elapsed_ms(started))),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(error = %err, "edit failed");
                Ok(EditResult::failed(err.to_string(), elapsed_ms(started)))
            }
        }
    }

    async fn run_pipeline(&self, request: &EditRequest) -> Result<EditSuccess, EditError> {
        let params = request.resolved_params()?;
        let directive = compose_directive(&params, request.custom_instructions.as_deref());

        let subject = codec::resolve_image_ref(&self.http, &request.subject_image).await?;
        let garment = codec::resolve_image_ref(&self.http, &request.garment_image).await?;
        codec::validate_payload(&subject, "subject-image")?;
        codec::validate_payload(&garment, "garment-image")?;

        let composed = self.composer.compose(&directive, &subject, &garment).await?;
        let composite_url = upload::upload_composite(
            self.store.as_ref(),
            self.sleeper.as_ref(),
            &self.user_id,
            &composed.image,
            &composed.mime_type,
            self.options.max_upload_attempts,
        )
        .await?;

        let confidence = composed
            .confidence
            .unwrap_or(self.options.default_confidence)
            .clamp(0.0, 1.0);
        let mut applied = vec![
            params.placement.directive_clause().to_string(),
            params.fit.directive_clause().to_string(),
            params.style.directive_clause().to_string(),
        ];
        if let Some(custom) = request
            .custom_instructions
            .as_deref()
            .filter(|text| !text.is_empty())
        {
            applied.push(custom.to_string());
        }

        Ok(EditSuccess {
            preview_data_url: composed.image.to_data_url(&composed.mime_type),
            composite_url,
            confidence,
            details: EditDetails {
                model: composed.model,
                applied_instructions: applied,
            },
        })
    }

    /// Persists one edit attempt and returns the new row id. Never mutates
    /// the result it records.
    pub async fn save_history(
        &self,
        request: &EditRequest,
        result: &EditResult,
    ) -> Result<String, EditError> {
        let record = NewHistoryRecord::from_edit(&self.user_id, request, result)?;
        Ok(self.history.insert(record).await?)
    }

    pub async fn get_history(&self, limit: Option<u32>) -> Result<Vec<HistoryRecord>, EditError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        Ok(self.history.list(&self.user_id, limit).await?)
    }

    /// Deletes one record, removing its stored composite first when the URL
    /// maps back to a key in our store. Cleanup failures are logged and do
    /// not block the row deletion.
    pub async fn delete_history(&self, id: &str) -> Result<bool, EditError> {
        if let Some(record) = self.history.find(id, &self.user_id).await? {
            if let Some(url) = record.composite_image_url.as_deref() {
                match self.store.key_for_url(url) {
                    Some(key) => {
                        if let Err(err) = self.store.remove_object(&key).await {
                            warn!(%key, error = %err, "composite cleanup failed");
                        }
                    }
                    None => debug!(%url, "composite URL not owned by this store"),
                }
            }
        }
        Ok(self.history.delete(id, &self.user_id).await?)
    }

    pub async fn usage_stats(&self) -> Result<UsageSummary, EditError> {
        let records = self.history.all(&self.user_id).await?;
        Ok(summarize(&records, Utc::now()))
    }
}

pub(crate) fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

pub(crate) fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
