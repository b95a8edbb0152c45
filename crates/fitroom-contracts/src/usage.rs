use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::history::{EditStatus, HistoryRecord};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    pub total_edits: u64,
    pub successful_edits: u64,
    pub this_month_edits: u64,
    pub average_processing_time_ms: f64,
}

/// Rolls up usage figures from stored records. Pure; callers pass `now` so
/// the month window is testable.
pub fn summarize(records: &[HistoryRecord], now: DateTime<Utc>) -> UsageSummary {
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single();
    let successful_edits = records
        .iter()
        .filter(|record| record.status == EditStatus::Completed)
        .count() as u64;
    let this_month_edits = records
        .iter()
        .filter(|record| {
            month_start
                .map(|start| record.created_at >= start)
                .unwrap_or(false)
        })
        .count() as u64;
    let durations: Vec<u64> = records
        .iter()
        .filter_map(|record| record.processing_time_ms)
        .collect();
    let average_processing_time_ms = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<u64>() as f64 / durations.len() as f64
    };
    UsageSummary {
        total_edits: records.len() as u64,
        successful_edits,
        this_month_edits,
        average_processing_time_ms,
    }
}
