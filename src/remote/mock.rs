use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{
    AnalysisUpload, HistorySource, PredictPayload, Prediction, PredictionService, ProfileSource,
    RemoteError,
};
use crate::models::RemoteProfile;

/// In-memory prediction service for tests. Returns configurable responses
/// and records what it was sent.
pub struct MockRemote {
    prediction: Mutex<Result<Prediction, RemoteError>>,
    predict_delay: Option<Duration>,
    profile_delay: Option<Duration>,
    profiles: Mutex<HashMap<String, RemoteProfile>>,
    profile_error: Mutex<Option<RemoteError>>,
    analyses: Mutex<Result<Vec<serde_json::Value>, RemoteError>>,
    predict_calls: AtomicU32,
    profile_fetches: AtomicU32,
    payloads: Mutex<Vec<PredictPayload>>,
    saved_profiles: Mutex<Vec<(String, RemoteProfile)>>,
    saved_analyses: Mutex<Vec<AnalysisUpload>>,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    /// A service that predicts 0.5 and knows no profiles or history.
    pub fn new() -> Self {
        Self {
            prediction: Mutex::new(Ok(Prediction::with_probability(0.5))),
            predict_delay: None,
            profile_delay: None,
            profiles: Mutex::new(HashMap::new()),
            profile_error: Mutex::new(None),
            analyses: Mutex::new(Ok(Vec::new())),
            predict_calls: AtomicU32::new(0),
            profile_fetches: AtomicU32::new(0),
            payloads: Mutex::new(Vec::new()),
            saved_profiles: Mutex::new(Vec::new()),
            saved_analyses: Mutex::new(Vec::new()),
        }
    }

    pub fn with_prediction(self, prediction: Prediction) -> Self {
        self.set_prediction(Ok(prediction));
        self
    }

    pub fn with_prediction_error(self, error: RemoteError) -> Self {
        self.set_prediction(Err(error));
        self
    }

    /// Hold every prediction for `delay` before answering.
    pub fn with_predict_delay(mut self, delay: Duration) -> Self {
        self.predict_delay = Some(delay);
        self
    }

    /// Hold every profile fetch for `delay` before answering.
    pub fn with_profile_delay(mut self, delay: Duration) -> Self {
        self.profile_delay = Some(delay);
        self
    }

    pub fn with_profile(self, email: &str, profile: RemoteProfile) -> Self {
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(email.to_string(), profile);
        }
        self
    }

    pub fn with_analyses(self, analyses: Vec<serde_json::Value>) -> Self {
        if let Ok(mut slot) = self.analyses.lock() {
            *slot = Ok(analyses);
        }
        self
    }

    pub fn with_history_error(self, error: RemoteError) -> Self {
        if let Ok(mut slot) = self.analyses.lock() {
            *slot = Err(error);
        }
        self
    }

    pub fn set_prediction(&self, result: Result<Prediction, RemoteError>) {
        if let Ok(mut slot) = self.prediction.lock() {
            *slot = result;
        }
    }

    /// Make profile fetches and saves fail with `error` until cleared with `None`.
    pub fn set_profile_error(&self, error: Option<RemoteError>) {
        if let Ok(mut slot) = self.profile_error.lock() {
            *slot = error;
        }
    }

    pub fn predict_calls(&self) -> u32 {
        self.predict_calls.load(Ordering::SeqCst)
    }

    pub fn profile_fetches(&self) -> u32 {
        self.profile_fetches.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<PredictPayload> {
        self.payloads.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn saved_profiles(&self) -> Vec<(String, RemoteProfile)> {
        self.saved_profiles.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn saved_analyses(&self) -> Vec<AnalysisUpload> {
        self.saved_analyses.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn profile_error(&self) -> Option<RemoteError> {
        self.profile_error.lock().ok().and_then(|e| e.clone())
    }
}

fn poisoned() -> RemoteError {
    RemoteError::Http("mock state poisoned".into())
}

#[async_trait::async_trait]
impl PredictionService for MockRemote {
    async fn predict(&self, payload: &PredictPayload) -> Result<Prediction, RemoteError> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.push(payload.clone());
        }
        if let Some(delay) = self.predict_delay {
            tokio::time::sleep(delay).await;
        }
        self.prediction.lock().map_err(|_| poisoned())?.clone()
    }
}

#[async_trait::async_trait]
impl ProfileSource for MockRemote {
    async fn fetch_profile(&self, email: &str) -> Result<Option<RemoteProfile>, RemoteError> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.profile_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(e) = self.profile_error() {
            return Err(e);
        }
        let profiles = self.profiles.lock().map_err(|_| poisoned())?;
        Ok(profiles.get(email).cloned())
    }

    async fn save_profile(&self, email: &str, profile: &RemoteProfile) -> Result<(), RemoteError> {
        if let Some(e) = self.profile_error() {
            return Err(e);
        }
        self.profiles
            .lock()
            .map_err(|_| poisoned())?
            .insert(email.to_string(), profile.clone());
        self.saved_profiles
            .lock()
            .map_err(|_| poisoned())?
            .push((email.to_string(), profile.clone()));
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistorySource for MockRemote {
    async fn fetch_analyses(&self, _email: &str) -> Result<Vec<serde_json::Value>, RemoteError> {
        self.analyses.lock().map_err(|_| poisoned())?.clone()
    }

    async fn save_analysis(&self, analysis: &AnalysisUpload) -> Result<String, RemoteError> {
        let mut saved = self.saved_analyses.lock().map_err(|_| poisoned())?;
        saved.push(analysis.clone());
        Ok(format!("mock-{}", saved.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_returns_configured_prediction() {
        let mock = MockRemote::new().with_prediction(Prediction::with_probability(0.9));
        let payload = crate::remote::tests_support::payload();
        let prediction = mock.predict(&payload).await.unwrap();
        assert_eq!(prediction.high_risk_probability().unwrap(), 0.9);
        assert_eq!(mock.predict_calls(), 1);
        assert_eq!(mock.payloads().len(), 1);
    }

    #[tokio::test]
    async fn mock_profile_error_can_be_toggled() {
        let mock = MockRemote::new().with_profile("a@b.c", RemoteProfile::default());
        assert!(mock.fetch_profile("a@b.c").await.unwrap().is_some());

        mock.set_profile_error(Some(RemoteError::Timeout("slow".into())));
        assert!(mock.fetch_profile("a@b.c").await.is_err());

        mock.set_profile_error(None);
        assert!(mock.fetch_profile("x@b.c").await.unwrap().is_none());
        assert_eq!(mock.profile_fetches(), 3);
    }

    #[tokio::test]
    async fn mock_records_saved_analyses() {
        let mock = MockRemote::new();
        let upload = AnalysisUpload {
            email: "a@b.c".into(),
            input_data: serde_json::json!({}),
            result: serde_json::json!({}),
            pinned: false,
            summary: None,
        };
        assert_eq!(mock.save_analysis(&upload).await.unwrap(), "mock-1");
        assert_eq!(mock.saved_analyses(), vec![upload]);
    }
}
