//! Medication roster: the ordered list of opioids the patient is taking.
//!
//! Entries get ids from a clock-seeded monotonic counter and a potency
//! resolved once from a static table.

use std::sync::atomic::{AtomicI64, Ordering};

use serde::Serialize;

use crate::models::enums::Potency;
use crate::models::{MedicationDraft, MedicationEntry};

/// Opioids offered by the intake form and their relative potency.
pub const OPIOID_POTENCY: [(&str, Potency); 6] = [
    ("Codeine", Potency::Low),
    ("Fentanyl", Potency::VeryHigh),
    ("Hydrocodone", Potency::Moderate),
    ("Morphine", Potency::High),
    ("Oxycodone", Potency::High),
    ("Tramadol", Potency::Low),
];

/// Potency for a medication name; names outside the table are `Unknown`.
pub fn potency_for(name: &str) -> Potency {
    let name = name.trim();
    OPIOID_POTENCY
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, potency)| *potency)
        .unwrap_or(Potency::Unknown)
}

/// Why a draft was not added.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    #[error("Medication is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

// ═══════════════════════════════════════════════════════════
// Id source
// ═══════════════════════════════════════════════════════════

/// Millisecond-clock ids that never repeat: each id is `max(now, last + 1)`.
#[derive(Debug, Default)]
struct IdSource {
    last: AtomicI64,
}

impl IdSource {
    fn next(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// Keep future ids above anything already handed out.
    fn observe(&self, id: i64) {
        self.last.fetch_max(id, Ordering::AcqRel);
    }
}

// ═══════════════════════════════════════════════════════════
// MedicationRoster
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Serialize)]
pub struct MedicationRoster {
    entries: Vec<MedicationEntry>,
    #[serde(skip)]
    ids: IdSource,
}

impl Clone for MedicationRoster {
    fn clone(&self) -> Self {
        let clone = Self {
            entries: self.entries.clone(),
            ids: IdSource::default(),
        };
        clone.ids.observe(self.ids.last.load(Ordering::Acquire));
        clone
    }
}

impl MedicationRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a draft and append it. Name, dosage and frequency are required;
    /// duration is optional.
    pub fn add(&mut self, draft: MedicationDraft) -> Result<MedicationEntry, RosterError> {
        let mut missing = Vec::new();
        if draft.name.trim().is_empty() {
            missing.push("name");
        }
        if draft.dosage.trim().is_empty() {
            missing.push("dosage");
        }
        let Some(frequency) = draft.frequency else {
            missing.push("frequency");
            return Err(RosterError::MissingFields(missing));
        };
        if !missing.is_empty() {
            return Err(RosterError::MissingFields(missing));
        }

        let name = draft.name.trim().to_string();
        let entry = MedicationEntry {
            id: self.ids.next(),
            potency: potency_for(&name),
            name,
            dosage: draft.dosage.trim().to_string(),
            frequency,
            duration: draft.duration.trim().to_string(),
        };
        tracing::debug!(id = entry.id, name = %entry.name, potency = %entry.potency, "Medication added");
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Remove an entry. Unknown ids are ignored.
    pub fn remove(&mut self, id: i64) -> Option<MedicationEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Replace the entry carrying `entry.id` wholesale. The replacement is
    /// stored as given, potency included. Returns false when the id is absent.
    pub fn replace(&mut self, entry: MedicationEntry) -> bool {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: i64) -> Option<&MedicationEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries(&self) -> &[MedicationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Ids already handed out are still never reused.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
