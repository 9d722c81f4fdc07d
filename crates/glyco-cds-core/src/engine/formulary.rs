//! Medication formulary the rule engine draws from.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigResult;
use crate::validation::BASE_CONFIDENCE;

/// Route of administration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Oral,
    Injectable,
}

/// Pharmacological class; drives which rules apply to an entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DrugClass {
    Biguanide,
    Sglt2Inhibitor,
    Glp1Agonist,
    Dpp4Inhibitor,
    Sulfonylurea,
    BasalInsulin,
    Statin,
    AceInhibitor,
}

impl DrugClass {
    /// Glucose-lowering agents.
    pub fn is_glycemic(&self) -> bool {
        !matches!(self, DrugClass::Statin | DrugClass::AceInhibitor)
    }

    /// Classes that can cause hypoglycemia on their own.
    pub fn causes_hypoglycemia(&self) -> bool {
        matches!(self, DrugClass::Sulfonylurea | DrugClass::BasalInsulin)
    }
}

/// One formulary entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormularyEntry {
    pub medication: String,
    pub dose: String,
    pub category: String,
    pub drug_class: DrugClass,
    pub route: Route,
    /// Confidence before patient-specific adjustments (0-100)
    pub base_confidence: u8,
    #[serde(default)]
    pub guidelines: Vec<String>,
    /// Warnings that always accompany this medication
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Ordered list of formulary entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Formulary {
    pub entries: Vec<FormularyEntry>,
}

impl Default for Formulary {
    fn default() -> Self {
        Self {
            entries: default_entries(),
        }
    }
}

impl Formulary {
    /// Parse a formulary from JSON. Every `base_confidence` must be 0-100.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let formulary: Self = serde_json::from_str(json)?;
        for entry in &formulary.entries {
            BASE_CONFIDENCE.check(f64::from(entry.base_confidence))?;
        }
        Ok(formulary)
    }

    /// Load a formulary from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn find(&self, medication: &str) -> Option<&FormularyEntry> {
        self.entries
            .iter()
            .find(|e| e.medication.eq_ignore_ascii_case(medication))
    }
}

fn entry(
    medication: &str,
    dose: &str,
    category: &str,
    drug_class: DrugClass,
    route: Route,
    base_confidence: u8,
    guidelines: &[&str],
    warnings: &[&str],
) -> FormularyEntry {
    FormularyEntry {
        medication: medication.into(),
        dose: dose.into(),
        category: category.into(),
        drug_class,
        route,
        base_confidence,
        guidelines: guidelines.iter().map(|s| s.to_string()).collect(),
        warnings: warnings.iter().map(|s| s.to_string()).collect(),
    }
}

fn default_entries() -> Vec<FormularyEntry> {
    vec![
        entry(
            "Metformin",
            "500mg twice daily with meals",
            "First-line",
            DrugClass::Biguanide,
            Route::Oral,
            90,
            &["ADA Standards of Care 2024, Section 9"],
            &[],
        ),
        entry(
            "Empagliflozin",
            "10mg once daily",
            "Cardio-renal protection",
            DrugClass::Sglt2Inhibitor,
            Route::Oral,
            82,
            &["ADA Standards of Care 2024, Section 9", "KDIGO 2022 Diabetes in CKD"],
            &[],
        ),
        entry(
            "Semaglutide",
            "0.25mg subcutaneous once weekly",
            "Weight and cardiovascular benefit",
            DrugClass::Glp1Agonist,
            Route::Injectable,
            78,
            &["ADA Standards of Care 2024, Section 9", "SUSTAIN-6"],
            &[],
        ),
        entry(
            "Sitagliptin",
            "100mg once daily",
            "Add-on therapy",
            DrugClass::Dpp4Inhibitor,
            Route::Oral,
            68,
            &["ADA Standards of Care 2024, Section 9"],
            &[],
        ),
        entry(
            "Glipizide",
            "5mg once daily before breakfast",
            "Add-on therapy",
            DrugClass::Sulfonylurea,
            Route::Oral,
            60,
            &["ADA Standards of Care 2024, Section 9"],
            &["Hypoglycemia risk; monitor glucose"],
        ),
        entry(
            "Insulin glargine",
            "10 units subcutaneous at bedtime",
            "Insulin therapy",
            DrugClass::BasalInsulin,
            Route::Injectable,
            76,
            &["ADA Standards of Care 2024, Section 9", "ACOG Practice Bulletin 190"],
            &["Hypoglycemia risk; titrate by fasting glucose"],
        ),
        entry(
            "Atorvastatin",
            "20mg once daily",
            "Cardiovascular risk reduction",
            DrugClass::Statin,
            Route::Oral,
            86,
            &["ADA Standards of Care 2024, Section 10"],
            &[],
        ),
        entry(
            "Lisinopril",
            "10mg once daily",
            "Cardiovascular risk reduction",
            DrugClass::AceInhibitor,
            Route::Oral,
            84,
            &["ADA Standards of Care 2024, Section 10", "KDIGO 2022 Diabetes in CKD"],
            &[],
        ),
    ]
}
