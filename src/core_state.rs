//! Application state for one open view: the session gate in front of the
//! intake workflow, with profile prefill, assessment and history write-back
//! wired in.

use std::sync::Arc;

use crate::assessment::RiskAssessmentClient;
use crate::config::{self, RemoteConfig};
use crate::db::DatabaseError;
use crate::history::HistoryStore;
use crate::models::{Identity, PartialProfile, RiskRecord};
use crate::preferences::Preferences;
use crate::profile_cache::ProfileCache;
use crate::remote::{HistorySource, PredictionService, ProfileSource, RemoteClient, RemoteError};
use crate::session::{RouteAccess, SessionError, SessionGate};
use crate::store::LocalStore;
use crate::workflow::{IntakeWorkflow, WorkflowError};

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not logged in; continue at {redirect}")]
    NotAuthenticated { redirect: &'static str },
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Remote service error: {0}")]
    Remote(#[from] RemoteError),
}

/// A completed submission, with the outcome of the history write-back.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub record: RiskRecord,
    /// Remote id when the assessment was saved to history.
    pub history_id: Option<String>,
    /// Set when saving to history was requested and failed.
    pub history_notice: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    store: LocalStore,
    gate: Arc<SessionGate>,
    profiles: ProfileCache,
    history: HistoryStore,
    assessor: RiskAssessmentClient,
    preferences: Preferences,
}

impl CoreState {
    /// Wire every component to one store view and one remote service.
    pub fn new<R>(store: LocalStore, remote: Arc<R>) -> Self
    where
        R: PredictionService + ProfileSource + HistorySource + 'static,
    {
        let predictions: Arc<dyn PredictionService> = remote.clone();
        let profiles: Arc<dyn ProfileSource> = remote.clone();
        let history: Arc<dyn HistorySource> = remote;
        Self {
            gate: Arc::new(SessionGate::new(store.view())),
            profiles: ProfileCache::new(store.view(), profiles),
            history: HistoryStore::new(store.view(), history),
            assessor: RiskAssessmentClient::new(predictions),
            preferences: Preferences::new(store.view()),
            store,
        }
    }

    /// The default store and the HTTP service from `config`.
    pub fn open(remote_config: RemoteConfig) -> Result<Self, CoreError> {
        let store = LocalStore::open_default()?;
        let remote = Arc::new(RemoteClient::new(remote_config)?);
        tracing::info!(
            store = %config::store_path().display(),
            api = remote.base_url(),
            "{} {} ready",
            config::APP_NAME,
            config::APP_VERSION
        );
        Ok(Self::new(store, remote))
    }

    pub fn from_env() -> Result<Self, CoreError> {
        Self::open(RemoteConfig::from_env())
    }

    /// Another view of the same application: shares the store and its
    /// change notifications, has its own gate.
    pub fn new_view<R>(&self, remote: Arc<R>) -> Self
    where
        R: PredictionService + ProfileSource + HistorySource + 'static,
    {
        Self::new(self.store.view(), remote)
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn gate(&self) -> &Arc<SessionGate> {
        &self.gate
    }

    pub fn profiles(&self) -> &ProfileCache {
        &self.profiles
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn assessor(&self) -> &RiskAssessmentClient {
        &self.assessor
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    // ── Session ─────────────────────────────────────────────

    pub fn login(&self, identity: Identity) -> Result<(), CoreError> {
        Ok(self.gate.login(identity)?)
    }

    pub fn logout(&self) -> Result<(), CoreError> {
        Ok(self.gate.logout()?)
    }

    fn require_identity(&self) -> Result<Identity, CoreError> {
        match self.gate.mount() {
            RouteAccess::Granted(identity) => Ok(identity),
            RouteAccess::Redirect(redirect) => Err(CoreError::NotAuthenticated { redirect }),
            RouteAccess::Loading => Err(CoreError::NotAuthenticated {
                redirect: config::LOGIN_ROUTE,
            }),
        }
    }

    // ── Intake ──────────────────────────────────────────────

    /// Mount the intake view: guard, then prefill the Info stage from the
    /// locally cached profile. Never waits on the remote; follow up with
    /// [`Self::fetch_prefill`] and [`IntakeWorkflow::complete_prefill`].
    pub fn open_intake(&self) -> Result<IntakeWorkflow, CoreError> {
        let identity = self.require_identity()?;
        let mut workflow = IntakeWorkflow::new();
        workflow.apply_prefill(&self.profiles.local(&identity));
        Ok(workflow)
    }

    /// The remote profile for the current identity, to overlay on a
    /// mounted workflow. `None` when there is none or it could not be fetched.
    pub async fn fetch_prefill(&self) -> Result<Option<PartialProfile>, CoreError> {
        let identity = self.require_identity()?;
        Ok(self.profiles.fetch_remote(&identity).await)
    }

    /// Submit the workflow's draft. On success, optionally save the
    /// assessment to the remote history; a failed save is reported in the
    /// result and never undoes the assessment.
    ///
    /// `Ok(None)` when the workflow was reset or detached mid-flight.
    pub async fn submit(
        &self,
        workflow: &mut IntakeWorkflow,
        save_to_history: bool,
    ) -> Result<Option<Submission>, CoreError> {
        let identity = self.require_identity()?;
        let ticket = workflow.begin_submission()?;
        let profile = ticket.profile().clone();
        let outcome = self.assessor.assess(&profile).await;

        let Some(record) = workflow.complete_submission(ticket, outcome)? else {
            return Ok(None);
        };

        let mut submission = Submission {
            record,
            history_id: None,
            history_notice: None,
        };
        if save_to_history {
            match self.history.record(&identity, &submission.record, &profile).await {
                Ok(id) => submission.history_id = Some(id),
                Err(_) => {
                    submission.history_notice =
                        Some("Assessment complete, but it could not be saved to history".into());
                }
            }
        }
        Ok(Some(submission))
    }
}
