use serde::{Deserialize, Serialize};

use super::enums::{AlcoholUse, Gender};
use super::medication::MedicationEntry;

// ═══════════════════════════════════════════
// Medical history and derived risk flags
// ═══════════════════════════════════════════

pub const CHRONIC_PAIN: &str = "Chronic Pain";
pub const MENTAL_HEALTH_DISORDERS: &str = "Mental Health Disorders";
pub const SUBSTANCE_ABUSE_HISTORY: &str = "Substance Abuse History";
pub const LIVER_DISEASE: &str = "Liver Disease";
pub const KIDNEY_DISEASE: &str = "Kidney Disease";
pub const RESPIRATORY_DISEASE: &str = "Respiratory Disease";
pub const ACUTE_PAIN: &str = "Acute Pain";

/// Conditions offered in the medical-history picker.
pub const COMMON_CONDITIONS: [&str; 7] = [
    CHRONIC_PAIN,
    MENTAL_HEALTH_DISORDERS,
    SUBSTANCE_ABUSE_HISTORY,
    LIVER_DISEASE,
    KIDNEY_DISEASE,
    RESPIRATORY_DISEASE,
    ACUTE_PAIN,
];

/// Risk flags projected from the condition set. No setters: the only way to
/// change a flag is to change the conditions it is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskFlags {
    #[serde(rename = "has_chronic_pain")]
    chronic_pain: bool,
    #[serde(rename = "has_mental_health_dx")]
    mental_health_dx: bool,
    #[serde(rename = "history_of_substance_abuse")]
    substance_abuse_history: bool,
    liver_disease: bool,
    kidney_disease: bool,
    respiratory_disease: bool,
}

impl RiskFlags {
    fn project(conditions: &[String]) -> Self {
        let has = |label: &str| conditions.iter().any(|c| c == label);
        Self {
            chronic_pain: has(CHRONIC_PAIN),
            mental_health_dx: has(MENTAL_HEALTH_DISORDERS),
            substance_abuse_history: has(SUBSTANCE_ABUSE_HISTORY),
            liver_disease: has(LIVER_DISEASE),
            kidney_disease: has(KIDNEY_DISEASE),
            respiratory_disease: has(RESPIRATORY_DISEASE),
        }
    }

    pub fn chronic_pain(&self) -> bool {
        self.chronic_pain
    }

    pub fn mental_health_dx(&self) -> bool {
        self.mental_health_dx
    }

    pub fn substance_abuse_history(&self) -> bool {
        self.substance_abuse_history
    }

    pub fn liver_disease(&self) -> bool {
        self.liver_disease
    }

    pub fn kidney_disease(&self) -> bool {
        self.kidney_disease
    }

    pub fn respiratory_disease(&self) -> bool {
        self.respiratory_disease
    }

    /// Number of flags set.
    pub fn count(&self) -> u32 {
        [
            self.chronic_pain,
            self.mental_health_dx,
            self.substance_abuse_history,
            self.liver_disease,
            self.kidney_disease,
            self.respiratory_disease,
        ]
        .iter()
        .filter(|f| **f)
        .count() as u32
    }
}

/// The medical-history condition set together with its derived flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MedicalHistory {
    conditions: Vec<String>,
    #[serde(flatten)]
    flags: RiskFlags,
}

impl MedicalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_conditions<I, S>(conditions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut history = Self::new();
        history.set(conditions);
        history
    }

    /// Add a condition. Blank and duplicate labels are ignored.
    pub fn add(&mut self, condition: &str) -> bool {
        let condition = condition.trim();
        if condition.is_empty() || self.contains(condition) {
            return false;
        }
        self.conditions.push(condition.to_string());
        self.reproject();
        true
    }

    pub fn remove(&mut self, condition: &str) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c != condition.trim());
        let removed = self.conditions.len() != before;
        self.reproject();
        removed
    }

    /// Replace the whole condition set.
    pub fn set<I, S>(&mut self, conditions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.conditions.clear();
        for condition in conditions {
            let condition = condition.as_ref().trim();
            if !condition.is_empty() && !self.contains(condition) {
                self.conditions.push(condition.to_string());
            }
        }
        self.reproject();
    }

    /// Add the condition if absent, remove it if present.
    pub fn toggle(&mut self, condition: &str) -> bool {
        if self.contains(condition.trim()) {
            self.remove(condition);
            false
        } else {
            self.add(condition)
        }
    }

    pub fn contains(&self, condition: &str) -> bool {
        self.conditions.iter().any(|c| c == condition)
    }

    pub fn conditions(&self) -> &[String] {
        &self.conditions
    }

    pub fn flags(&self) -> RiskFlags {
        self.flags
    }

    fn reproject(&mut self) {
        self.flags = RiskFlags::project(&self.conditions);
    }
}

// ═══════════════════════════════════════════
// Demographics and lifestyle
// ═══════════════════════════════════════════

/// Demographics as entered in the Info stage. Every field may still be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    /// Kilograms.
    pub weight: Option<f64>,
    /// Centimetres.
    pub height: Option<f64>,
    pub gender: Option<Gender>,
}

impl Demographics {
    /// Names of the required fields that are not filled in, in form order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.age.map_or(true, |a| a == 0) {
            missing.push("age");
        }
        if self.weight.map_or(true, |w| !w.is_finite() || w <= 0.0) {
            missing.push("weight");
        }
        if self.gender.is_none() {
            missing.push("gender");
        }
        missing
    }
}

/// Concurrent medication and habit answers from the Health & Lifestyle section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifestyle {
    pub concurrent_benzos: bool,
    pub concurrent_muscle_relaxants: bool,
    pub concurrent_sleep_meds: bool,
    pub concurrent_antidepressants: bool,
    pub tobacco_use: bool,
    pub previous_overdose: bool,
    pub alcohol_use: Option<AlcoholUse>,
}

impl Lifestyle {
    /// Lifestyle risk factors present; heavy drinking counts as one.
    pub fn risk_factor_count(&self) -> u32 {
        let flags = [
            self.concurrent_benzos,
            self.concurrent_muscle_relaxants,
            self.concurrent_sleep_meds,
            self.concurrent_antidepressants,
            self.tobacco_use,
            self.previous_overdose,
        ];
        let heavy = u32::from(self.alcohol_use == Some(AlcoholUse::Heavy));
        flags.iter().filter(|f| **f).count() as u32 + heavy
    }
}

/// A fully assembled profile, ready to submit. Only built once validation passes.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientProfile {
    pub age: u32,
    pub weight: f64,
    pub height: Option<f64>,
    pub gender: Gender,
    pub history: MedicalHistory,
    pub lifestyle: Lifestyle,
    pub treatment_duration_months: u32,
    pub medications: Vec<MedicationEntry>,
}

impl PatientProfile {
    /// Count of derived and lifestyle risk factors, sent as `risk_factors_count`.
    pub fn risk_factors_count(&self) -> u32 {
        self.history.flags().count() + self.lifestyle.risk_factor_count()
    }
}

// ═══════════════════════════════════════════
// Cached / remote demographic profile
// ═══════════════════════════════════════════

/// Demographic profile as known to the client; any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub medical_conditions: Option<String>,
    pub allergies: Option<String>,
    pub primary_physician: Option<String>,
}

impl PartialProfile {
    /// Apply `newer` on top of `self`: every field present in `newer` wins,
    /// absent fields keep their current value.
    pub fn overlay(&mut self, newer: &PartialProfile) {
        fn take<T: Clone>(slot: &mut Option<T>, newer: &Option<T>) {
            if newer.is_some() {
                slot.clone_from(newer);
            }
        }
        take(&mut self.name, &newer.name);
        take(&mut self.email, &newer.email);
        take(&mut self.phone, &newer.phone);
        take(&mut self.age, &newer.age);
        take(&mut self.gender, &newer.gender);
        take(&mut self.medical_conditions, &newer.medical_conditions);
        take(&mut self.allergies, &newer.allergies);
        take(&mut self.primary_physician, &newer.primary_physician);
    }

    pub fn is_empty(&self) -> bool {
        *self == PartialProfile::default()
    }

    /// The gender, when it is one of the values the intake form accepts.
    pub fn parsed_gender(&self) -> Option<Gender> {
        self.gender
            .as_deref()
            .and_then(|g| g.trim().to_lowercase().parse().ok())
    }
}

/// Wire shape of `GET/PUT /profile/{email}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phn: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, rename = "medCond")]
    pub med_cond: Option<String>,
    #[serde(default)]
    pub allergy: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
}

impl From<RemoteProfile> for PartialProfile {
    fn from(p: RemoteProfile) -> Self {
        Self {
            name: p.name,
            email: p.email,
            phone: p.phn,
            age: p.age,
            gender: p.gender,
            medical_conditions: p.med_cond,
            allergies: p.allergy,
            primary_physician: p.doc,
        }
    }
}

impl From<&PartialProfile> for RemoteProfile {
    fn from(p: &PartialProfile) -> Self {
        Self {
            name: p.name.clone(),
            email: p.email.clone(),
            phn: p.phone.clone(),
            age: p.age,
            gender: p.gender.clone(),
            med_cond: p.medical_conditions.clone(),
            allergy: p.allergies.clone(),
            doc: p.primary_physician.clone(),
        }
    }
}
