use std::future::Future;

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::retry::with_retry;
use super::{
    AnalysesEnvelope, AnalysisUpload, HistorySource, PredictEnvelope, PredictPayload, Prediction,
    PredictionService, ProfileEnvelope, ProfileSource, RemoteError,
};
use crate::config::RemoteConfig;
use crate::models::RemoteProfile;

/// HTTP client for the prediction service.
pub struct RemoteClient {
    base_url: Url,
    client: reqwest::Client,
    config: RemoteConfig,
}

#[derive(Deserialize)]
struct SavedAnalysis {
    #[serde(default)]
    id: Option<String>,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| RemoteError::Http(format!("Invalid base URL {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::Http(format!(
                "Invalid base URL {}",
                config.base_url
            )));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Http(e.to_string()))?;

        Ok(Self {
            base_url,
            client,
            config,
        })
    }

    /// Client configured from the environment.
    pub fn from_env() -> Result<Self, RemoteError> {
        Self::new(RemoteConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn map_send_error(&self, e: reqwest::Error) -> RemoteError {
        if e.is_connect() {
            RemoteError::Connection(self.base_url.to_string())
        } else if e.is_timeout() {
            RemoteError::Timeout(format!(
                "no response within {}s",
                self.config.request_timeout.as_secs()
            ))
        } else {
            RemoteError::Http(e.to_string())
        }
    }

    /// One request, no retry. `Ok(None)` on 404 when `not_found_is_none`.
    async fn send_once<B, T>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
        not_found_is_none: bool,
    ) -> Result<Option<T>, RemoteError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if not_found_is_none && status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| self.map_send_error(e))?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    async fn retrying<T, F, Fut>(&self, what: &str, op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let result = with_retry(&self.config.retry, what, op).await;
        if let Err(e) = &result {
            tracing::warn!(operation = what, error = %e, "Remote call failed");
        }
        result
    }
}

#[async_trait::async_trait]
impl PredictionService for RemoteClient {
    async fn predict(&self, payload: &PredictPayload) -> Result<Prediction, RemoteError> {
        let url = self.endpoint(&["predict"]);
        let envelope: PredictEnvelope = self
            .retrying("predict", || {
                self.send_once::<_, PredictEnvelope>(Method::POST, url.clone(), Some(payload), false)
            })
            .await?
            .ok_or_else(|| RemoteError::Malformed("empty response".into()))?;

        envelope
            .prediction
            .ok_or_else(|| RemoteError::Malformed("response has no prediction".into()))
    }
}

#[async_trait::async_trait]
impl ProfileSource for RemoteClient {
    async fn fetch_profile(&self, email: &str) -> Result<Option<RemoteProfile>, RemoteError> {
        let url = self.endpoint(&["profile", email]);
        let envelope = self
            .retrying("fetch_profile", || {
                self.send_once::<(), ProfileEnvelope>(Method::GET, url.clone(), None, true)
            })
            .await?;
        Ok(envelope.and_then(|e| e.profile))
    }

    async fn save_profile(&self, email: &str, profile: &RemoteProfile) -> Result<(), RemoteError> {
        let url = self.endpoint(&["profile", email]);
        self.retrying("save_profile", || {
            self.send_once::<_, serde_json::Value>(Method::PUT, url.clone(), Some(profile), false)
        })
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl HistorySource for RemoteClient {
    async fn fetch_analyses(&self, email: &str) -> Result<Vec<serde_json::Value>, RemoteError> {
        let url = self.endpoint(&["analysis", email]);
        let envelope = self
            .retrying("fetch_analyses", || {
                self.send_once::<(), AnalysesEnvelope>(Method::GET, url.clone(), None, false)
            })
            .await?;
        Ok(envelope.and_then(|e| e.analyses).unwrap_or_default())
    }

    async fn save_analysis(&self, analysis: &AnalysisUpload) -> Result<String, RemoteError> {
        let url = self.endpoint(&["analysis"]);
        let saved = self
            .retrying("save_analysis", || {
                self.send_once::<_, SavedAnalysis>(Method::POST, url.clone(), Some(analysis), false)
            })
            .await?;
        saved
            .and_then(|s| s.id)
            .ok_or_else(|| RemoteError::Malformed("saved analysis has no id".into()))
    }
}
