//! Turns a submitted profile into a RiskRecord.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::mme;
use crate::models::{risk_category, PatientProfile, RiskRecord};
use crate::remote::{PredictPayload, PredictionService, RemoteError};

/// The one failure callers see. The cause is logged, never surfaced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssessmentError {
    #[error("Failed to analyze medications. Please try again.")]
    AnalysisFailed,
}

pub struct RiskAssessmentClient {
    service: Arc<dyn PredictionService>,
}

impl RiskAssessmentClient {
    pub fn new(service: Arc<dyn PredictionService>) -> Self {
        Self { service }
    }

    /// Submit `profile` for prediction and build the resulting record.
    ///
    /// Either a complete record comes back or `AnalysisFailed`; a response
    /// without a usable probability never yields a partial record.
    pub async fn assess(&self, profile: &PatientProfile) -> Result<RiskRecord, AssessmentError> {
        let payload = PredictPayload::from(profile);
        tracing::info!(
            medications = profile.medications.len(),
            risk_factors = payload.risk_factors_count,
            "Submitting assessment"
        );

        let prediction = self.service.predict(&payload).await.map_err(log_failure)?;
        let probability = prediction.high_risk_probability().map_err(log_failure)?;
        let category = risk_category(probability);

        let recommendations = match prediction.recommendations {
            Some(recs) if !recs.is_empty() => recs,
            _ => category.default_recommendations(),
        };

        let total_mme = prediction
            .total_mme
            .filter(|m| m.is_finite() && *m >= 0.0)
            .or_else(|| {
                let local = mme::roster_totals(&profile.medications).daily_mme;
                (local > 0.0).then_some(local)
            });

        let record = RiskRecord::new(
            Uuid::new_v4().to_string(),
            Utc::now(),
            profile.medications.clone(),
            probability,
            recommendations,
            total_mme,
        );
        tracing::info!(id = record.id(), category = %category, "Assessment complete");
        Ok(record)
    }
}

fn log_failure(e: RemoteError) -> AssessmentError {
    tracing::warn!(error = %e, "Assessment failed");
    AssessmentError::AnalysisFailed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::RiskCategory;
    use crate::remote::tests_support::profile;
    use crate::remote::{MockRemote, Prediction};

    fn client(mock: MockRemote) -> (RiskAssessmentClient, Arc<MockRemote>) {
        let mock = Arc::new(mock);
        (RiskAssessmentClient::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn high_probability_bands_high() {
        let (client, mock) = client(MockRemote::new().with_prediction(Prediction::with_probability(0.75)));
        let record = client.assess(&profile()).await.unwrap();

        assert_eq!(record.risk_probability(), 0.75);
        assert_eq!(record.risk_category(), RiskCategory::High);
        assert_eq!(record.risk_percent(), 75);
        assert_eq!(record.medications().len(), 1);
        assert_eq!(mock.predict_calls(), 1);
    }

    #[tokio::test]
    async fn missing_recommendations_use_band_defaults() {
        let (client, _) = client(MockRemote::new().with_prediction(Prediction::with_probability(0.1)));
        let record = client.assess(&profile()).await.unwrap();
        assert_eq!(
            record.recommendations(),
            RiskCategory::Low.default_recommendations().as_slice()
        );
    }

    #[tokio::test]
    async fn remote_recommendations_are_kept() {
        let prediction = Prediction {
            recommendations: Some(vec!["See your doctor".into()]),
            ..Prediction::with_probability(0.4)
        };
        let (client, _) = client(MockRemote::new().with_prediction(prediction));
        let record = client.assess(&profile()).await.unwrap();
        assert_eq!(record.recommendations(), ["See your doctor".to_string()]);
        assert_eq!(record.risk_category(), RiskCategory::Moderate);
    }

    #[tokio::test]
    async fn remote_total_mme_takes_precedence() {
        let prediction = Prediction {
            total_mme: Some(45.0),
            ..Prediction::with_probability(0.4)
        };
        let (client, _) = client(MockRemote::new().with_prediction(prediction));
        let record = client.assess(&profile()).await.unwrap();
        assert_eq!(record.total_mme(), Some(45.0));
    }

    #[tokio::test]
    async fn local_mme_estimate_fills_gap() {
        let (client, _) = client(MockRemote::new().with_prediction(Prediction::with_probability(0.4)));
        let record = client.assess(&profile()).await.unwrap();
        assert_eq!(record.total_mme(), Some(30.0));
    }

    #[tokio::test]
    async fn transport_failure_is_analysis_failed() {
        let (client, _) = client(
            MockRemote::new().with_prediction_error(RemoteError::Connection("http://x".into())),
        );
        assert_eq!(client.assess(&profile()).await, Err(AssessmentError::AnalysisFailed));
    }

    #[tokio::test]
    async fn malformed_probability_is_analysis_failed() {
        for bad in [
            Prediction::default(),
            Prediction::with_probability(1.5),
            Prediction::with_probability(f64::NAN),
        ] {
            let (client, _) = client(MockRemote::new().with_prediction(bad));
            assert_eq!(client.assess(&profile()).await, Err(AssessmentError::AnalysisFailed));
        }
    }

    #[tokio::test]
    async fn each_assessment_gets_a_fresh_id() {
        let (client, _) = client(MockRemote::new());
        let a = client.assess(&profile()).await.unwrap();
        let b = client.assess(&profile()).await.unwrap();
        assert_ne!(a.id(), b.id());
    }
}
