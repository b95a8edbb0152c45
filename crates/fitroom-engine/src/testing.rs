//! Shared in-memory fakes for the pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use fitroom_contracts::history::{EditStatus, HistoryRecord, NewHistoryRecord};
use fitroom_contracts::progress::ProgressObserver;
use fitroom_contracts::request::{Fit, Placement, RenderStyle};
use fitroom_contracts::result::EditResult;

use crate::codec::EncodedImage;
use crate::composer::{ComposedImage, GarmentComposer};
use crate::error::EditError;
use crate::history_store::{HistoryError, HistoryStore};
use crate::storage::{ObjectStore, PutOptions, StorageError};
use crate::Sleeper;

pub(crate) fn data_url_bytes(len: usize) -> String {
    EncodedImage::from_bytes(&vec![5u8; len]).to_data_url("image/jpeg")
}

pub(crate) fn composed_image(confidence: Option<f64>) -> ComposedImage {
    ComposedImage {
        image: EncodedImage::from_bytes(&[9u8; 2048]),
        mime_type: "image/jpeg".to_string(),
        confidence,
        model: "gemini-2.5-flash-image".to_string(),
    }
}

pub(crate) fn history_record(user_id: &str, created_at: &str) -> NewHistoryRecord {
    NewHistoryRecord {
        user_id: user_id.to_string(),
        subject_image_url: "data:image/jpeg;base64,YQ==".to_string(),
        garment_image_url: "https://cdn.test/garment.png".to_string(),
        composite_image_url: Some("https://cdn.test/u/1-composite.jpg".to_string()),
        instructions: "directive".to_string(),
        placement: Placement::FullBody,
        fit: Fit::Regular,
        style: RenderStyle::Realistic,
        confidence: Some(0.8),
        status: EditStatus::Completed,
        processing_time_ms: Some(1200),
        created_at: created_at.parse().expect("test timestamp parses"),
    }
}

/// Composer that replays scripted outcomes in order and records every
/// directive it was handed.
pub(crate) struct StubComposer {
    outcomes: Mutex<VecDeque<Result<ComposedImage, EditError>>>,
    directives: Mutex<Vec<String>>,
}

impl StubComposer {
    pub fn with_outcomes(outcomes: Vec<Result<ComposedImage, EditError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            directives: Mutex::new(Vec::new()),
        }
    }

    pub fn directives(&self) -> Vec<String> {
        self.directives.lock().unwrap().clone()
    }
}

#[async_trait]
impl GarmentComposer for StubComposer {
    async fn compose(
        &self,
        directive: &str,
        _subject: &EncodedImage,
        _garment: &EncodedImage,
    ) -> Result<ComposedImage, EditError> {
        self.directives.lock().unwrap().push(directive.to_string());
        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(EditError::Internal(
                "stub composer has no scripted outcome".to_string(),
            ))
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PutCall {
    pub key: String,
    pub upsert: bool,
    pub content_type: String,
}

/// Object store that fails a scripted number of puts with a transient error,
/// or every put with a fixed fatal one.
pub(crate) struct FlakyStore {
    remaining_failures: AtomicU32,
    fatal: Option<StorageError>,
    puts: Mutex<Vec<PutCall>>,
    removed: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn failing(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            fatal: None,
            puts: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub fn fatal(error: StorageError) -> Self {
        Self {
            remaining_failures: AtomicU32::new(0),
            fatal: Some(error),
            puts: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub fn puts(&self) -> Vec<PutCall> {
        self.puts.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn put_object(
        &self,
        key: &str,
        _bytes: &[u8],
        options: &PutOptions,
    ) -> Result<(), StorageError> {
        self.puts.lock().unwrap().push(PutCall {
            key: key.to_string(),
            upsert: options.upsert,
            content_type: options.content_type.clone(),
        });
        if let Some(error) = &self.fatal {
            return Err(error.clone());
        }
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::Other("503: flaky backend".to_string()));
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/{key}")
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix("https://cdn.test/").map(str::to_string)
    }

    async fn remove_object(&self, key: &str) -> Result<(), StorageError> {
        self.removed.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
pub(crate) struct MemoryHistory {
    rows: Mutex<Vec<HistoryRecord>>,
    next_id: AtomicU32,
    fail_inserts: bool,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_inserts() -> Self {
        Self {
            fail_inserts: true,
            ..Self::default()
        }
    }

    pub async fn seed(&self, record: NewHistoryRecord) -> String {
        let id = format!("row-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.rows.lock().unwrap().push(record.into_record(id.clone()));
        id
    }

    pub fn rows(&self) -> Vec<HistoryRecord> {
        self.rows.lock().unwrap().clone()
    }

    fn sorted_for(&self, user_id: &str) -> Vec<HistoryRecord> {
        let mut records: Vec<HistoryRecord> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }
}

#[async_trait]
impl HistoryStore for MemoryHistory {
    async fn insert(&self, record: NewHistoryRecord) -> Result<String, HistoryError> {
        if self.fail_inserts {
            return Err(HistoryError::Request("insert disabled".to_string()));
        }
        Ok(self.seed(record).await)
    }

    async fn list(&self, user_id: &str, limit: u32) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut records = self.sorted_for(user_id);
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn find(&self, id: &str, user_id: &str) -> Result<Option<HistoryRecord>, HistoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.id == id && record.user_id == user_id)
            .cloned())
    }

    async fn delete(&self, id: &str, user_id: &str) -> Result<bool, HistoryError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|record| !(record.id == id && record.user_id == user_id));
        Ok(rows.len() != before)
    }

    async fn all(&self, user_id: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
        Ok(self.sorted_for(user_id))
    }
}

/// Observer that records `(completed, total, current_is_success)` per call.
#[derive(Default)]
pub(crate) struct RecordingObserver {
    calls: Mutex<Vec<(usize, usize, Option<bool>)>>,
}

impl RecordingObserver {
    pub fn calls(&self) -> Vec<(usize, usize, Option<bool>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingObserver {
    fn on_progress(&self, completed: usize, total: usize, current: Option<&EditResult>) {
        self.calls
            .lock()
            .unwrap()
            .push((completed, total, current.map(EditResult::is_success)));
    }
}
