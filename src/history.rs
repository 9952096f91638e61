//! Assessment history: the remote canonical list plus local pins.
//!
//! Remote entries are loosely shaped; [`normalize_entry`] turns one into a
//! [`RiskRecord`] or rejects it. Rejected entries are counted, not reported.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{risk_category, Identity, MedicationEntry, PatientProfile, PinnedEntry, RiskRecord};
use crate::remote::{AnalysisUpload, HistorySource, PredictPayload, RemoteError};
use crate::store::LocalStore;

/// Notice attached to a batch when the remote history could not be fetched.
pub const HISTORY_UNAVAILABLE: &str = "Failed to fetch analysis history";

/// One fetch of the remote history, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryBatch {
    pub records: Vec<RiskRecord>,
    /// Entries dropped for missing or malformed fields.
    pub dropped: usize,
    /// Transient message for the user when the fetch failed.
    pub notice: Option<String>,
}

impl HistoryBatch {
    fn unavailable() -> Self {
        Self {
            notice: Some(HISTORY_UNAVAILABLE.to_string()),
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Normalization
// ═══════════════════════════════════════════════════════════

/// A remote history entry as a record, or `None` when `input_data`,
/// `result` or `created_at.seconds` is missing or `result.overallRisk` is
/// not a number in [0, 1].
pub fn normalize_entry(entry: &Value) -> Option<RiskRecord> {
    let input = entry.get("input_data").filter(|v| v.is_object())?;
    let result = entry.get("result").filter(|v| v.is_object())?;
    let seconds = entry.get("created_at")?.get("seconds")?.as_i64()?;
    let date = DateTime::<Utc>::from_timestamp(seconds, 0)?;

    let probability = result.get("overallRisk")?.as_f64()?;
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return None;
    }

    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let medications: Vec<MedicationEntry> = input
        .get("currentMedications")
        .and_then(Value::as_array)
        .map(|meds| {
            meds.iter()
                .filter_map(|m| serde_json::from_value(m.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    let recommendations: Vec<String> = result
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|recs| recs.iter().filter_map(|r| r.as_str().map(str::to_string)).collect())
        .filter(|recs: &Vec<String>| !recs.is_empty())
        .unwrap_or_else(|| risk_category(probability).default_recommendations());

    let total_mme = result
        .get("totalMME")
        .and_then(Value::as_f64)
        .filter(|m| m.is_finite());

    Some(RiskRecord::new(id, date, medications, probability, recommendations, total_mme))
}

// ═══════════════════════════════════════════════════════════
// HistoryStore
// ═══════════════════════════════════════════════════════════

pub struct HistoryStore {
    store: LocalStore,
    remote: Arc<dyn HistorySource>,
}

impl HistoryStore {
    pub fn new(store: LocalStore, remote: Arc<dyn HistorySource>) -> Self {
        Self { store, remote }
    }

    /// Fetch and normalize the remote history of `identity`. Never fails:
    /// a remote error yields an empty batch carrying a notice.
    pub async fn fetch_history(&self, identity: &Identity) -> HistoryBatch {
        let raw = match self.remote.fetch_analyses(&identity.email).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "History fetch failed");
                return HistoryBatch::unavailable();
            }
        };

        let total = raw.len();
        let mut records: Vec<RiskRecord> = raw.iter().filter_map(normalize_entry).collect();
        let dropped = total - records.len();
        if dropped > 0 {
            tracing::debug!(dropped, total, "Dropped incomplete history entries");
        }
        records.sort_by(|a, b| b.date().cmp(&a.date()));

        HistoryBatch {
            records,
            dropped,
            notice: None,
        }
    }

    /// Write an assessment to the remote history. Returns the remote id.
    pub async fn record(
        &self,
        identity: &Identity,
        record: &RiskRecord,
        profile: &PatientProfile,
    ) -> Result<String, RemoteError> {
        let input_data = serde_json::to_value(PredictPayload::from(profile))
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        let upload = AnalysisUpload {
            email: identity.email.clone(),
            input_data,
            result: json!({
                "overallRisk": record.risk_probability(),
                "riskCategory": record.risk_category(),
                "recommendations": record.recommendations(),
                "totalMME": record.total_mme(),
            }),
            pinned: false,
            summary: Some(record.risk_category().interpretation().to_string()),
        };

        match self.remote.save_analysis(&upload).await {
            Ok(id) => {
                tracing::info!(remote_id = %id, "Assessment saved to history");
                Ok(id)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Saving assessment to history failed");
                Err(e)
            }
        }
    }

    // ── Local pins ──────────────────────────────────────────

    /// Pin a snapshot of `record`. Pinning the same record twice gives two entries.
    pub fn pin(&self, record: &RiskRecord) -> Result<PinnedEntry, DatabaseError> {
        let entry = self.store.pin(record)?;
        tracing::debug!(pin_id = entry.id, record = record.id(), "Record pinned");
        Ok(entry)
    }

    pub fn unpin(&self, pin_id: i64) -> Result<bool, DatabaseError> {
        self.store.unpin(pin_id)
    }

    /// Pinned entries, most recent first.
    pub fn list_pinned(&self) -> Result<Vec<PinnedEntry>, DatabaseError> {
        self.store.pinned()
    }
}
