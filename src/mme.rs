//! Morphine milligram equivalent (MME) estimates for the roster.
//!
//! Estimates are illustrative: they use the published CDC conversion factors
//! for the opioids the intake form offers, applied to the dosage text the
//! user typed. A `totalMME` reported by the prediction service always takes
//! precedence over the local estimate.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::MedicationEntry;

/// Leading amount and optional unit, e.g. "10mg", "12.5 mcg/hr", "0.5 g".
static DOSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(mg|mcg|µg|ug|g)?\b").unwrap()
});

/// How a conversion factor is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionBasis {
    /// Factor × mg per dose × doses per day.
    OralMgPerDay,
    /// Factor × mcg/hr of a continuous transdermal patch.
    TransdermalMcgPerHour,
}

/// CDC conversion factor and basis for a roster opioid, by case-insensitive name.
pub fn conversion_factor(name: &str) -> Option<(f64, ConversionBasis)> {
    let factor = match name.trim().to_lowercase().as_str() {
        "codeine" => (0.15, ConversionBasis::OralMgPerDay),
        "hydrocodone" => (1.0, ConversionBasis::OralMgPerDay),
        "morphine" => (1.0, ConversionBasis::OralMgPerDay),
        "oxycodone" => (1.5, ConversionBasis::OralMgPerDay),
        "tramadol" => (0.2, ConversionBasis::OralMgPerDay),
        "fentanyl" => (2.4, ConversionBasis::TransdermalMcgPerHour),
        _ => return None,
    };
    Some(factor)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DoseUnit {
    Milligram,
    Microgram,
    Gram,
    Unspecified,
}

fn parse_dose(dosage: &str) -> Option<(f64, DoseUnit)> {
    let caps = DOSE_PATTERN.captures(dosage)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    if !amount.is_finite() || amount <= 0.0 {
        return None;
    }
    let unit = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(u) if u == "mg" => DoseUnit::Milligram,
        Some(u) if u == "g" => DoseUnit::Gram,
        Some(_) => DoseUnit::Microgram,
        None => DoseUnit::Unspecified,
    };
    Some((amount, unit))
}

/// Milligrams per dose from free-text dosage. A bare number is read as mg.
pub fn parse_dose_mg(dosage: &str) -> Option<f64> {
    let (amount, unit) = parse_dose(dosage)?;
    Some(match unit {
        DoseUnit::Milligram | DoseUnit::Unspecified => amount,
        DoseUnit::Microgram => amount / 1000.0,
        DoseUnit::Gram => amount * 1000.0,
    })
}

/// Daily MME estimate for one roster entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MmeEstimate {
    pub medication: String,
    pub daily_dosage_mg: f64,
    pub conversion_factor: f64,
    pub basis: ConversionBasis,
    pub daily_mme: f64,
    /// Always true: not a clinical calculation.
    pub illustrative: bool,
}

/// Estimate the daily MME of an entry. `None` for unknown opioids or
/// dosages that cannot be read.
pub fn estimate(entry: &MedicationEntry) -> Option<MmeEstimate> {
    let (factor, basis) = conversion_factor(&entry.name)?;
    let (daily_dosage_mg, daily_mme) = match basis {
        ConversionBasis::OralMgPerDay => {
            let per_dose = parse_dose_mg(&entry.dosage)?;
            let daily = per_dose * f64::from(entry.frequency.doses_per_day());
            (daily, daily * factor)
        }
        ConversionBasis::TransdermalMcgPerHour => {
            let (amount, unit) = parse_dose(&entry.dosage)?;
            // Patch strengths are written in mcg/hr; a milligram figure is ambiguous.
            if matches!(unit, DoseUnit::Milligram | DoseUnit::Gram) {
                return None;
            }
            (amount * 24.0 / 1000.0, amount * factor)
        }
    };
    Some(MmeEstimate {
        medication: entry.name.clone(),
        daily_dosage_mg,
        conversion_factor: factor,
        basis,
        daily_mme,
        illustrative: true,
    })
}

/// Roster-wide totals sent with the prediction request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RosterTotals {
    pub daily_dosage_mg: f64,
    pub daily_mme: f64,
    /// Entry with the highest estimated MME; the first entry when none can be estimated.
    pub primary_opioid: Option<String>,
}

pub fn roster_totals(entries: &[MedicationEntry]) -> RosterTotals {
    let estimates: Vec<MmeEstimate> = entries.iter().filter_map(estimate).collect();
    let primary = estimates
        .iter()
        .max_by(|a, b| a.daily_mme.total_cmp(&b.daily_mme))
        .map(|e| e.medication.clone())
        .or_else(|| entries.first().map(|e| e.name.clone()));

    RosterTotals {
        daily_dosage_mg: estimates.iter().map(|e| e.daily_dosage_mg).sum(),
        daily_mme: estimates.iter().map(|e| e.daily_mme).sum(),
        primary_opioid: primary,
    }
}
