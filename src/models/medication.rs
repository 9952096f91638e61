use serde::{Deserialize, Serialize};

use super::enums::{Frequency, Potency};

/// User input for a new roster entry. Nothing is validated until it is added.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicationDraft {
    pub name: String,
    pub dosage: String,
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub duration: String,
}

impl MedicationDraft {
    pub fn new(name: &str, dosage: &str, frequency: Frequency) -> Self {
        Self {
            name: name.to_string(),
            dosage: dosage.to_string(),
            frequency: Some(frequency),
            duration: String::new(),
        }
    }

    pub fn with_duration(mut self, duration: &str) -> Self {
        self.duration = duration.to_string();
        self
    }
}

/// A medication on the roster.
///
/// `potency` is resolved from the name once, when the entry is created, and
/// is carried unchanged afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub id: i64,
    pub name: String,
    pub dosage: String,
    pub frequency: Frequency,
    #[serde(default)]
    pub duration: String,
    pub potency: Potency,
}

impl MedicationEntry {
    /// Roster line shown under the name, e.g. "10mg, Twice daily, 7 days".
    pub fn summary(&self) -> String {
        let mut line = format!("{}, {}", self.dosage, self.frequency.label());
        if !self.duration.is_empty() {
            line.push_str(", ");
            line.push_str(&self.duration);
        }
        line
    }
}
