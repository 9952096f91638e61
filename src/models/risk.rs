use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::RiskCategory;
use super::medication::MedicationEntry;

/// Probability above which a result is banded High.
pub const HIGH_RISK_THRESHOLD: f64 = 0.6;
/// Probability above which a result is banded Moderate.
pub const MODERATE_RISK_THRESHOLD: f64 = 0.3;

/// The single banding rule used by the result view, the history view and pinning.
///
/// Upper bounds are inclusive: 0.3 is Low, 0.6 is Moderate. Non-finite input
/// bands as Low.
pub fn risk_category(probability: f64) -> RiskCategory {
    if probability > HIGH_RISK_THRESHOLD {
        RiskCategory::High
    } else if probability > MODERATE_RISK_THRESHOLD {
        RiskCategory::Moderate
    } else {
        RiskCategory::Low
    }
}

impl RiskCategory {
    /// Interpretation line shown with the result.
    pub fn interpretation(&self) -> &'static str {
        match self {
            Self::Low => "Current medication regimen appears to have manageable risk. Continue as directed and monitor for any side effects.",
            Self::Moderate => "Some potential for adverse effects. Follow dosing schedule carefully and be aware of warning signs of overdose.",
            Self::High => "Significant risk of adverse effects or overdose. Consult healthcare provider immediately about safer pain management options.",
        }
    }

    /// Recommendations used when the prediction service returns none.
    pub fn default_recommendations(&self) -> Vec<String> {
        let mut recs = vec![
            "Take medications exactly as prescribed.".to_string(),
            "Never combine opioids with alcohol or sedatives unless directed by your prescriber.".to_string(),
        ];
        match self {
            Self::Low => {}
            Self::Moderate => {
                recs.push("Keep naloxone available and make sure family members know how to use it.".to_string());
            }
            Self::High => {
                recs.push("Keep naloxone available and make sure family members know how to use it.".to_string());
                recs.push("Contact your healthcare provider promptly to review your pain management plan.".to_string());
            }
        }
        recs
    }
}

/// The canonical result of one assessment. Immutable once created.
///
/// Deserializing ignores any stored `riskCategory` and bands the probability again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredRiskRecord")]
pub struct RiskRecord {
    id: String,
    date: DateTime<Utc>,
    medications: Vec<MedicationEntry>,
    risk_probability: f64,
    risk_category: RiskCategory,
    recommendations: Vec<String>,
    #[serde(default)]
    total_mme: Option<f64>,
}

impl RiskRecord {
    /// Build a record; the category is always derived from `risk_probability`.
    pub fn new(
        id: String,
        date: DateTime<Utc>,
        medications: Vec<MedicationEntry>,
        risk_probability: f64,
        recommendations: Vec<String>,
        total_mme: Option<f64>,
    ) -> Self {
        Self {
            id,
            date,
            medications,
            risk_probability,
            risk_category: risk_category(risk_probability),
            recommendations,
            total_mme,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn medications(&self) -> &[MedicationEntry] {
        &self.medications
    }

    pub fn risk_probability(&self) -> f64 {
        self.risk_probability
    }

    pub fn risk_category(&self) -> RiskCategory {
        self.risk_category
    }

    pub fn recommendations(&self) -> &[String] {
        &self.recommendations
    }

    pub fn total_mme(&self) -> Option<f64> {
        self.total_mme
    }

    /// Whole-percent risk for display, e.g. 0.754 → 75.
    pub fn risk_percent(&self) -> u8 {
        (self.risk_probability.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRiskRecord {
    id: String,
    date: DateTime<Utc>,
    medications: Vec<MedicationEntry>,
    risk_probability: f64,
    recommendations: Vec<String>,
    #[serde(default)]
    total_mme: Option<f64>,
}

impl From<StoredRiskRecord> for RiskRecord {
    fn from(stored: StoredRiskRecord) -> Self {
        RiskRecord::new(
            stored.id,
            stored.date,
            stored.medications,
            stored.risk_probability,
            stored.recommendations,
            stored.total_mme,
        )
    }
}

/// A locally pinned snapshot of a record. Never synchronized to the remote history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedEntry {
    pub id: i64,
    pub pinned_at: DateTime<Utc>,
    pub record: RiskRecord,
}
