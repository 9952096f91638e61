//! Prediction service contract.
//!
//! Three traits describe what the client needs from the service; the HTTP
//! implementation lives in [`http`], a configurable in-memory stand-in in
//! [`mock`].

pub mod http;
pub mod mock;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::mme;
use crate::models::enums::Gender;
use crate::models::{MedicationEntry, PatientProfile, RemoteProfile};

pub use http::RemoteClient;
pub use mock::MockRemote;

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    #[error("Cannot reach prediction service at {0}")]
    Connection(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Prediction service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("HTTP client error: {0}")]
    Http(String),
}

impl RemoteError {
    /// Transport failures, timeouts, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_) | Self::Http(_) => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════

/// Body of `POST /predict`. Field names follow the service's feature names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictPayload {
    pub age: u32,
    pub weight: f64,
    pub weight_kg: f64,
    pub height: f64,
    pub height_cm: f64,
    pub gender: Gender,
    #[serde(rename = "medicalHistory")]
    pub medical_history: Vec<String>,
    #[serde(rename = "currentMedications")]
    pub current_medications: Vec<MedicationEntry>,
    pub has_chronic_pain: bool,
    pub has_mental_health_dx: bool,
    pub history_of_substance_abuse: bool,
    pub liver_disease: bool,
    pub kidney_disease: bool,
    pub respiratory_disease: bool,
    pub treatment_duration_months: u32,
    pub concurrent_benzos: bool,
    pub concurrent_muscle_relaxants: bool,
    pub concurrent_sleep_meds: bool,
    pub concurrent_antidepressants: bool,
    pub tobacco_use: bool,
    pub previous_overdose: bool,
    /// Empty when not answered.
    pub alcohol_use: String,
    pub primary_opioid: String,
    pub daily_dosage_mg: f64,
    pub daily_mme: f64,
    pub risk_factors_count: u32,
}

impl From<&PatientProfile> for PredictPayload {
    fn from(profile: &PatientProfile) -> Self {
        let flags = profile.history.flags();
        let totals = mme::roster_totals(&profile.medications);
        let height = profile.height.unwrap_or(0.0);
        Self {
            age: profile.age,
            weight: profile.weight,
            weight_kg: profile.weight,
            height,
            height_cm: height,
            gender: profile.gender,
            medical_history: profile.history.conditions().to_vec(),
            current_medications: profile.medications.clone(),
            has_chronic_pain: flags.chronic_pain(),
            has_mental_health_dx: flags.mental_health_dx(),
            history_of_substance_abuse: flags.substance_abuse_history(),
            liver_disease: flags.liver_disease(),
            kidney_disease: flags.kidney_disease(),
            respiratory_disease: flags.respiratory_disease(),
            treatment_duration_months: profile.treatment_duration_months,
            concurrent_benzos: profile.lifestyle.concurrent_benzos,
            concurrent_muscle_relaxants: profile.lifestyle.concurrent_muscle_relaxants,
            concurrent_sleep_meds: profile.lifestyle.concurrent_sleep_meds,
            concurrent_antidepressants: profile.lifestyle.concurrent_antidepressants,
            tobacco_use: profile.lifestyle.tobacco_use,
            previous_overdose: profile.lifestyle.previous_overdose,
            alcohol_use: profile
                .lifestyle
                .alcohol_use
                .map(|a| a.as_str().to_string())
                .unwrap_or_default(),
            primary_opioid: totals.primary_opioid.unwrap_or_default(),
            daily_dosage_mg: totals.daily_dosage_mg,
            daily_mme: totals.daily_mme,
            risk_factors_count: profile.risk_factors_count(),
        }
    }
}

/// The `prediction` object of a `POST /predict` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Per-sample class probabilities; `[0][1]` is the high-risk probability.
    #[serde(default)]
    pub risk_probability: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub recommendations: Option<Vec<String>>,
    #[serde(default, rename = "overallRisk")]
    pub overall_risk: Option<f64>,
    #[serde(default, rename = "totalMME")]
    pub total_mme: Option<f64>,
}

impl Prediction {
    /// A prediction carrying only `[[1 - p, p]]`.
    pub fn with_probability(high: f64) -> Self {
        Self {
            risk_probability: Some(vec![vec![1.0 - high, high]]),
            ..Default::default()
        }
    }

    /// The high-risk probability, if present, finite and within [0, 1].
    pub fn high_risk_probability(&self) -> Result<f64, RemoteError> {
        let value = self
            .risk_probability
            .as_ref()
            .and_then(|rows| rows.first())
            .and_then(|row| row.get(1))
            .copied()
            .ok_or_else(|| RemoteError::Malformed("risk_probability[0][1] missing".into()))?;
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(RemoteError::Malformed(format!(
                "risk probability {value} outside [0, 1]"
            )));
        }
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictEnvelope {
    pub prediction: Option<Prediction>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileEnvelope {
    #[serde(default)]
    pub profile: Option<RemoteProfile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnalysesEnvelope {
    #[serde(default)]
    pub analyses: Option<Vec<serde_json::Value>>,
}

/// Body of `POST /analysis`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisUpload {
    pub email: String,
    pub input_data: serde_json::Value,
    pub result: serde_json::Value,
    pub pinned: bool,
    pub summary: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Service contracts
// ═══════════════════════════════════════════════════════════

#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, payload: &PredictPayload) -> Result<Prediction, RemoteError>;
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// `Ok(None)` when the service has no profile for `email`.
    async fn fetch_profile(&self, email: &str) -> Result<Option<RemoteProfile>, RemoteError>;

    async fn save_profile(&self, email: &str, profile: &RemoteProfile) -> Result<(), RemoteError>;
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Raw analysis entries; shape checking is the caller's job.
    async fn fetch_analyses(&self, email: &str) -> Result<Vec<serde_json::Value>, RemoteError>;

    /// Store an analysis; returns the id the service assigned.
    async fn save_analysis(&self, analysis: &AnalysisUpload) -> Result<String, RemoteError>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::tests_support::profile;
    use crate::models::CHRONIC_PAIN;

    #[test]
    fn payload_carries_derived_fields() {
        let payload = PredictPayload::from(&profile());
        assert!(payload.has_chronic_pain);
        assert!(!payload.liver_disease);
        assert_eq!(payload.primary_opioid, "Oxycodone");
        assert_eq!(payload.daily_dosage_mg, 20.0);
        assert_eq!(payload.daily_mme, 30.0);
        assert_eq!(payload.risk_factors_count, 2);
        assert_eq!(payload.height, 0.0);
    }

    #[test]
    fn payload_uses_service_field_names() {
        let json = serde_json::to_value(PredictPayload::from(&profile())).unwrap();
        assert_eq!(json["gender"], "male");
        assert_eq!(json["alcohol_use"], "Moderate");
        assert_eq!(json["weight_kg"], 80.0);
        assert_eq!(json["currentMedications"][0]["name"], "Oxycodone");
        assert_eq!(json["medicalHistory"][0], CHRONIC_PAIN);
    }

    #[test]
    fn unanswered_alcohol_is_empty_string() {
        let mut p = profile();
        p.lifestyle.alcohol_use = None;
        assert_eq!(PredictPayload::from(&p).alcohol_use, "");
    }

    #[test]
    fn high_risk_probability_reads_second_column() {
        let prediction: Prediction =
            serde_json::from_str(r#"{"risk_probability":[[0.2,0.75]],"prediction":[1]}"#).unwrap();
        assert_eq!(prediction.high_risk_probability().unwrap(), 0.75);
    }

    #[test]
    fn high_risk_probability_rejects_bad_shapes() {
        let empty = Prediction::default();
        assert!(matches!(empty.high_risk_probability(), Err(RemoteError::Malformed(_))));

        let short = Prediction {
            risk_probability: Some(vec![vec![0.4]]),
            ..Default::default()
        };
        assert!(short.high_risk_probability().is_err());

        let out_of_range = Prediction {
            risk_probability: Some(vec![vec![-0.5, 1.5]]),
            ..Default::default()
        };
        assert!(out_of_range.high_risk_probability().is_err());
    }

    #[test]
    fn retryable_errors() {
        assert!(RemoteError::Connection("x".into()).is_retryable());
        assert!(RemoteError::Timeout("x".into()).is_retryable());
        assert!(RemoteError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(RemoteError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(!RemoteError::Status { status: 404, body: String::new() }.is_retryable());
        assert!(!RemoteError::Malformed("x".into()).is_retryable());
    }
}
