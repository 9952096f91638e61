//! Intake workflow: Info → Medications → Results.
//!
//! The workflow owns the draft (demographics, conditions, lifestyle answers,
//! roster) and the active result. The only way into `Results` is a completed
//! submission; submissions are split into [`IntakeWorkflow::begin_submission`]
//! and [`IntakeWorkflow::complete_submission`] so a completion that arrives
//! after [`IntakeWorkflow::reset`] or [`IntakeWorkflow::detach`] can be
//! recognized by its generation and dropped.

use serde::Serialize;

use crate::assessment::{AssessmentError, RiskAssessmentClient};
use crate::db::DatabaseError;
use crate::history::HistoryStore;
use crate::models::enums::{AlcoholUse, Gender};
use crate::models::{
    Demographics, Lifestyle, MedicalHistory, PartialProfile, PatientProfile, PinnedEntry,
    RiskRecord,
};
use crate::roster::MedicationRoster;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Info,
    Medications,
    Results,
}

/// Why a submission was blocked before reaching the remote service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("Please fill in required fields: {}", .0.join(", "))]
    MissingDemographics(Vec<&'static str>),
    #[error("Please add at least one medication")]
    EmptyRoster,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Assessment(#[from] AssessmentError),
    #[error("Action requires the {expected:?} stage, workflow is at {actual:?}")]
    WrongStage { expected: Stage, actual: Stage },
    #[error("{0:?} stage is not available yet")]
    StageLocked(Stage),
    #[error("An assessment is already in progress")]
    SubmissionInFlight,
    #[error("No assessment result to pin")]
    NoActiveRecord,
    #[error("This assessment is already pinned")]
    AlreadyPinned,
    #[error("Local store error: {0}")]
    Store(#[from] DatabaseError),
}

/// An outstanding submission. Hand it back to `complete_submission`.
#[derive(Debug)]
pub struct SubmissionTicket {
    generation: u64,
    profile: PatientProfile,
}

impl SubmissionTicket {
    pub fn profile(&self) -> &PatientProfile {
        &self.profile
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A remote prefill in progress. Hand it back to `complete_prefill`.
#[derive(Debug, Clone)]
pub struct PrefillTicket {
    generation: u64,
    age: Option<u32>,
    gender: Option<Gender>,
}

#[derive(Debug, Clone)]
pub struct IntakeWorkflow {
    stage: Stage,
    demographics: Demographics,
    history: MedicalHistory,
    lifestyle: Lifestyle,
    treatment_duration_months: u32,
    roster: MedicationRoster,
    active: Option<RiskRecord>,
    active_pin: Option<i64>,
    generation: u64,
    in_flight: Option<u64>,
}

impl Default for IntakeWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeWorkflow {
    pub fn new() -> Self {
        Self {
            stage: Stage::Info,
            demographics: Demographics::default(),
            history: MedicalHistory::new(),
            lifestyle: Lifestyle::default(),
            treatment_duration_months: 0,
            roster: MedicationRoster::new(),
            active: None,
            active_pin: None,
            generation: 0,
            in_flight: None,
        }
    }

    // ── Navigation ──────────────────────────────────────────

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn continue_to_medications(&mut self) -> Result<(), WorkflowError> {
        if self.stage != Stage::Info {
            return Err(WorkflowError::WrongStage {
                expected: Stage::Info,
                actual: self.stage,
            });
        }
        self.stage = Stage::Medications;
        Ok(())
    }

    /// Results is reachable only while there is an active record.
    pub fn is_stage_enabled(&self, stage: Stage) -> bool {
        match stage {
            Stage::Info | Stage::Medications => true,
            Stage::Results => self.active.is_some(),
        }
    }

    pub fn select_stage(&mut self, stage: Stage) -> Result<(), WorkflowError> {
        if !self.is_stage_enabled(stage) {
            return Err(WorkflowError::StageLocked(stage));
        }
        self.stage = stage;
        Ok(())
    }

    /// Back to Info with an empty draft. Any outstanding submission is orphaned.
    pub fn reset(&mut self) {
        self.stage = Stage::Info;
        self.demographics = Demographics::default();
        self.history = MedicalHistory::new();
        self.lifestyle = Lifestyle::default();
        self.treatment_duration_months = 0;
        self.roster.clear();
        self.active = None;
        self.active_pin = None;
        self.orphan_submission();
        tracing::debug!(generation = self.generation, "Workflow reset");
    }

    /// The owning view went away: later completions are discarded.
    pub fn detach(&mut self) {
        self.orphan_submission();
    }

    fn orphan_submission(&mut self) {
        self.generation += 1;
        self.in_flight = None;
    }

    // ── Draft editing ───────────────────────────────────────

    pub fn demographics(&self) -> &Demographics {
        &self.demographics
    }

    pub fn set_age(&mut self, age: Option<u32>) {
        self.demographics.age = age;
    }

    pub fn set_weight(&mut self, weight: Option<f64>) {
        self.demographics.weight = weight;
    }

    pub fn set_height(&mut self, height: Option<f64>) {
        self.demographics.height = height;
    }

    pub fn set_gender(&mut self, gender: Option<Gender>) {
        self.demographics.gender = gender;
    }

    pub fn history(&self) -> &MedicalHistory {
        &self.history
    }

    pub fn add_condition(&mut self, condition: &str) -> bool {
        self.history.add(condition)
    }

    pub fn remove_condition(&mut self, condition: &str) -> bool {
        self.history.remove(condition)
    }

    pub fn toggle_condition(&mut self, condition: &str) -> bool {
        self.history.toggle(condition)
    }

    pub fn set_conditions<I, S>(&mut self, conditions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.history.set(conditions);
    }

    pub fn lifestyle(&self) -> &Lifestyle {
        &self.lifestyle
    }

    pub fn set_lifestyle(&mut self, lifestyle: Lifestyle) {
        self.lifestyle = lifestyle;
    }

    pub fn set_alcohol_use(&mut self, alcohol_use: Option<AlcoholUse>) {
        self.lifestyle.alcohol_use = alcohol_use;
    }

    pub fn treatment_duration_months(&self) -> u32 {
        self.treatment_duration_months
    }

    pub fn set_treatment_duration_months(&mut self, months: u32) {
        self.treatment_duration_months = months;
    }

    pub fn roster(&self) -> &MedicationRoster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut MedicationRoster {
        &mut self.roster
    }

    /// Prefill the Info stage from a stored profile: age and gender, each
    /// only when the profile has a usable value.
    pub fn apply_prefill(&mut self, profile: &PartialProfile) {
        if let Some(age) = profile.age.filter(|a| *a > 0) {
            self.demographics.age = Some(age);
        }
        if let Some(gender) = profile.parsed_gender() {
            self.demographics.gender = Some(gender);
        }
    }

    /// Snapshot taken before fetching the remote profile.
    pub fn prefill_ticket(&self) -> PrefillTicket {
        PrefillTicket {
            generation: self.generation,
            age: self.demographics.age,
            gender: self.demographics.gender,
        }
    }

    /// Overlay the remote profile once it arrives. Fields edited since the
    /// ticket was taken keep the user's value. Returns false, changing
    /// nothing, when the workflow was reset or detached in the meantime.
    pub fn complete_prefill(&mut self, ticket: PrefillTicket, profile: &PartialProfile) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale profile prefill"
            );
            return false;
        }
        if self.demographics.age == ticket.age {
            if let Some(age) = profile.age.filter(|a| *a > 0) {
                self.demographics.age = Some(age);
            }
        }
        if self.demographics.gender == ticket.gender {
            if let Some(gender) = profile.parsed_gender() {
                self.demographics.gender = Some(gender);
            }
        }
        true
    }

    // ── Submission ──────────────────────────────────────────

    pub fn validate(&self) -> Result<(), ValidationFailure> {
        let missing = self.demographics.missing_required();
        if !missing.is_empty() {
            return Err(ValidationFailure::MissingDemographics(missing));
        }
        if self.roster.is_empty() {
            return Err(ValidationFailure::EmptyRoster);
        }
        Ok(())
    }

    /// The profile as it would be submitted now.
    pub fn build_profile(&self) -> Result<PatientProfile, ValidationFailure> {
        self.validate()?;
        let (Some(age), Some(weight), Some(gender)) = (
            self.demographics.age,
            self.demographics.weight,
            self.demographics.gender,
        ) else {
            return Err(ValidationFailure::MissingDemographics(
                self.demographics.missing_required(),
            ));
        };
        Ok(PatientProfile {
            age,
            weight,
            height: self.demographics.height.filter(|h| h.is_finite() && *h > 0.0),
            gender,
            history: self.history.clone(),
            lifestyle: self.lifestyle.clone(),
            treatment_duration_months: self.treatment_duration_months,
            medications: self.roster.entries().to_vec(),
        })
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn can_submit(&self) -> bool {
        self.stage == Stage::Medications && !self.is_submitting() && self.validate().is_ok()
    }

    /// Validate and mark a submission outstanding. Nothing is sent here;
    /// assess the ticket's profile, then hand both back.
    pub fn begin_submission(&mut self) -> Result<SubmissionTicket, WorkflowError> {
        if self.stage != Stage::Medications {
            return Err(WorkflowError::WrongStage {
                expected: Stage::Medications,
                actual: self.stage,
            });
        }
        if self.in_flight.is_some() {
            return Err(WorkflowError::SubmissionInFlight);
        }
        let profile = self.build_profile()?;
        self.in_flight = Some(self.generation);
        Ok(SubmissionTicket {
            generation: self.generation,
            profile,
        })
    }

    /// Apply the outcome of a submission.
    ///
    /// `Ok(Some(record))` moved the workflow to Results; `Ok(None)` means the
    /// ticket was stale and nothing changed. A failed assessment clears the
    /// outstanding flag and leaves the stage at Medications.
    pub fn complete_submission(
        &mut self,
        ticket: SubmissionTicket,
        outcome: Result<RiskRecord, AssessmentError>,
    ) -> Result<Option<RiskRecord>, WorkflowError> {
        if ticket.generation != self.generation || self.in_flight != Some(ticket.generation) {
            tracing::debug!(
                ticket = ticket.generation,
                current = self.generation,
                "Discarding stale assessment result"
            );
            return Ok(None);
        }
        self.in_flight = None;

        let record = outcome?;
        self.active = Some(record.clone());
        self.active_pin = None;
        self.stage = Stage::Results;
        Ok(Some(record))
    }

    /// Begin, assess and complete in one call.
    pub async fn submit(
        &mut self,
        assessor: &RiskAssessmentClient,
    ) -> Result<Option<RiskRecord>, WorkflowError> {
        let ticket = self.begin_submission()?;
        let outcome = assessor.assess(ticket.profile()).await;
        self.complete_submission(ticket, outcome)
    }

    // ── Result ──────────────────────────────────────────────

    pub fn active_record(&self) -> Option<&RiskRecord> {
        self.active.as_ref()
    }

    pub fn is_active_pinned(&self) -> bool {
        self.active_pin.is_some()
    }

    /// Pin the active record. Each assessment can be pinned once.
    pub fn pin_active(&mut self, history: &HistoryStore) -> Result<PinnedEntry, WorkflowError> {
        let record = self.active.as_ref().ok_or(WorkflowError::NoActiveRecord)?;
        if self.active_pin.is_some() {
            return Err(WorkflowError::AlreadyPinned);
        }
        let entry = history.pin(record)?;
        self.active_pin = Some(entry.id);
        Ok(entry)
    }
}
