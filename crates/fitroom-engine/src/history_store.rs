use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use fitroom_contracts::history::{HistoryRecord, NewHistoryRecord};

use crate::truncate_text;

pub const DEFAULT_HISTORY_TABLE: &str = "tryon_history";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history backend returned {status}: {body}")]
    Backend { status: u16, body: String },
    #[error("history request failed: {0}")]
    Request(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stores one record and returns the backend-assigned id.
    async fn insert(&self, record: NewHistoryRecord) -> Result<String, HistoryError>;

    /// The user's records, newest first, capped at `limit`.
    async fn list(&self, user_id: &str, limit: u32) -> Result<Vec<HistoryRecord>, HistoryError>;

    async fn find(&self, id: &str, user_id: &str) -> Result<Option<HistoryRecord>, HistoryError>;

    /// Removes one record; `false` when nothing matched.
    async fn delete(&self, id: &str, user_id: &str) -> Result<bool, HistoryError>;

    /// Every record for the user, newest first.
    async fn all(&self, user_id: &str) -> Result<Vec<HistoryRecord>, HistoryError>;
}

#[derive(Debug, Clone)]
pub struct SupabaseHistoryConfig {
    pub base_url: String,
    pub table: String,
    pub service_key: String,
}

impl SupabaseHistoryConfig {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            table: DEFAULT_HISTORY_TABLE.to_string(),
            service_key: service_key.into(),
        }
    }
}

pub struct SupabaseHistory {
    config: SupabaseHistoryConfig,
    http: reqwest::Client,
}

impl SupabaseHistory {
    pub fn new(mut config: SupabaseHistoryConfig) -> Self {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.config.base_url, self.config.table)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
    }

    async fn rows_or_error(response: reqwest::Response) -> Result<Vec<HistoryRecord>, HistoryError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| HistoryError::Request(format!("response body read failed: {err}")))?;
        if !status.is_success() {
            return Err(HistoryError::Backend {
                status: status.as_u16(),
                body: truncate_text(&body, 256),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl HistoryStore for SupabaseHistory {
    async fn insert(&self, record: NewHistoryRecord) -> Result<String, HistoryError> {
        debug!(user_id = %record.user_id, "inserting history row");
        let response = self
            .authed(self.http.post(self.endpoint()))
            .header("Prefer", "return=representation")
            .json(&record)
            .send()
            .await
            .map_err(|err| HistoryError::Request(err.to_string()))?;
        let rows = Self::rows_or_error(response).await?;
        rows.into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| HistoryError::Request("insert returned no representation".to_string()))
    }

    async fn list(&self, user_id: &str, limit: u32) -> Result<Vec<HistoryRecord>, HistoryError> {
        let response = self
            .authed(self.http.get(self.endpoint()))
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("order", "created_at.desc".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|err| HistoryError::Request(err.to_string()))?;
        Self::rows_or_error(response).await
    }

    async fn find(&self, id: &str, user_id: &str) -> Result<Option<HistoryRecord>, HistoryError> {
        let response = self
            .authed(self.http.get(self.endpoint()))
            .query(&[
                ("id", format!("eq.{id}")),
                ("user_id", format!("eq.{user_id}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|err| HistoryError::Request(err.to_string()))?;
        Ok(Self::rows_or_error(response).await?.into_iter().next())
    }

    async fn delete(&self, id: &str, user_id: &str) -> Result<bool, HistoryError> {
        let response = self
            .authed(self.http.delete(self.endpoint()))
            .header("Prefer", "return=representation")
            .query(&[
                ("id", format!("eq.{id}")),
                ("user_id", format!("eq.{user_id}")),
            ])
            .send()
            .await
            .map_err(|err| HistoryError::Request(err.to_string()))?;
        Ok(!Self::rows_or_error(response).await?.is_empty())
    }

    async fn all(&self, user_id: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
        let response = self
            .authed(self.http.get(self.endpoint()))
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await
            .map_err(|err| HistoryError::Request(err.to_string()))?;
        Self::rows_or_error(response).await
    }
}

/// Append-only JSONL history for tests and offline runs. Lines that fail to
/// parse are skipped on read.
pub struct JsonlHistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(raw
                .lines()
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn insert(&self, record: NewHistoryRecord) -> Result<String, HistoryError> {
        let id = Uuid::new_v4().to_string();
        let line = serde_json::to_string(&record.into_record(id.clone()))?;

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        Ok(id)
    }

    async fn list(&self, user_id: &str, limit: u32) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut records = self.all(user_id).await?;
        records.truncate(limit as usize);
        Ok(records)
    }

    async fn find(&self, id: &str, user_id: &str) -> Result<Option<HistoryRecord>, HistoryError> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|record| record.id == id && record.user_id == user_id))
    }

    async fn delete(&self, id: &str, user_id: &str) -> Result<bool, HistoryError> {
        let _guard = self.lock.lock().await;
        let records = self.load().await?;
        let kept: Vec<&HistoryRecord> = records
            .iter()
            .filter(|record| !(record.id == id && record.user_id == user_id))
            .collect();
        if kept.len() == records.len() {
            return Ok(false);
        }
        let mut out = String::new();
        for record in kept {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        tokio::fs::write(&self.path, out).await?;
        Ok(true)
    }

    async fn all(&self, user_id: &str) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut records: Vec<HistoryRecord> = self
            .load()
            .await?
            .into_iter()
            .filter(|record| record.user_id == user_id)
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use fitroom_contracts::history::EditStatus;
    use fitroom_contracts::request::{Fit, Placement, RenderStyle};

    use super::*;

    fn record_for(user_id: &str, created_at: &str) -> NewHistoryRecord {
        NewHistoryRecord {
            user_id: user_id.to_string(),
            subject_image_url: "data:image/jpeg;base64,YQ==".to_string(),
            garment_image_url: "https://cdn.test/g.png".to_string(),
            composite_image_url: Some("https://cdn.test/out.jpg".to_string()),
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

    #[test]
    fn supabase_endpoint_uses_rest_v1_and_table() {
        let store = SupabaseHistory::new(SupabaseHistoryConfig::new(
            "https://proj.supabase.co/",
            "service-key",
        ));
        assert_eq!(store.endpoint(), "https://proj.supabase.co/rest/v1/tryon_history");
    }

    #[tokio::test]
    async fn jsonl_store_lists_newest_first_per_user() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = JsonlHistoryStore::new(temp.path().join("history.jsonl"));

        store.insert(record_for("u1", "2026-08-01T10:00:00Z")).await?;
        store.insert(record_for("u1", "2026-08-03T10:00:00Z")).await?;
        store.insert(record_for("u2", "2026-08-02T10:00:00Z")).await?;

        let records = store.all("u1").await?;
        assert_eq!(records.len(), 2);
        assert!(records[0].created_at > records[1].created_at);

        let limited = store.list("u1", 1).await?;
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].created_at, records[0].created_at);
        Ok(())
    }

    #[tokio::test]
    async fn jsonl_store_finds_and_deletes_scoped_to_user() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = JsonlHistoryStore::new(temp.path().join("history.jsonl"));
        let id = store.insert(record_for("u1", "2026-08-01T10:00:00Z")).await?;

        assert!(store.find(&id, "u1").await?.is_some());
        assert!(store.find(&id, "u2").await?.is_none());

        assert!(!store.delete(&id, "u2").await?);
        assert!(store.delete(&id, "u1").await?);
        assert!(!store.delete(&id, "u1").await?);
        assert!(store.all("u1").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn jsonl_store_treats_missing_file_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store = JsonlHistoryStore::new(temp.path().join("absent.jsonl"));
        assert!(store.all("u1").await?.is_empty());
        assert!(store.list("u1", 20).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn jsonl_store_skips_corrupt_lines() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("history.jsonl");
        let store = JsonlHistoryStore::new(&path);
        store.insert(record_for("u1", "2026-08-01T10:00:00Z")).await?;

        let mut raw = std::fs::read_to_string(&path)?;
        raw.push_str("{not json}\n");
        std::fs::write(&path, raw)?;

        assert_eq!(store.all("u1").await?.len(), 1);
        Ok(())
    }
}
