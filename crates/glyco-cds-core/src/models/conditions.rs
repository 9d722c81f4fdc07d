//! Comorbidity flags.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// A condition that can be recorded for a patient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    DiabetesMellitus,
    Ckd,
    Cad,
    Hypertension,
    Pregnancy,
    Neuropathy,
    Retinopathy,
    Obesity,
}

impl Condition {
    pub const ALL: [Condition; 8] = [
        Condition::DiabetesMellitus,
        Condition::Ckd,
        Condition::Cad,
        Condition::Hypertension,
        Condition::Pregnancy,
        Condition::Neuropathy,
        Condition::Retinopathy,
        Condition::Obesity,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Condition::DiabetesMellitus => "dm",
            Condition::Ckd => "ckd",
            Condition::Cad => "cad",
            Condition::Hypertension => "hypertension",
            Condition::Pregnancy => "pregnancy",
            Condition::Neuropathy => "neuropathy",
            Condition::Retinopathy => "retinopathy",
            Condition::Obesity => "obesity",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Condition::DiabetesMellitus => "Diabetes Mellitus",
            Condition::Ckd => "Chronic Kidney Disease",
            Condition::Cad => "Coronary Artery Disease",
            Condition::Hypertension => "Hypertension",
            Condition::Pregnancy => "Pregnancy",
            Condition::Neuropathy => "Neuropathy",
            Condition::Retinopathy => "Retinopathy",
            Condition::Obesity => "Obesity",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Condition::DiabetesMellitus => "Primary condition - always present",
            Condition::Ckd => "Affects metformin dosing",
            Condition::Cad => "Favors SGLT2i/GLP-1 RA",
            Condition::Hypertension => "CV risk factor",
            Condition::Pregnancy => "Blocks oral medications",
            Condition::Neuropathy | Condition::Retinopathy => "DM complication",
            Condition::Obesity => "BMI >= 30 or clinical diagnosis",
        }
    }

    /// Conditions under which oral agents must not be recommended.
    pub fn blocks_oral_medication(&self) -> bool {
        matches!(self, Condition::Pregnancy)
    }
}

impl FromStr for Condition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Condition::ALL
            .into_iter()
            .find(|c| c.key() == key || c.label().to_lowercase() == key)
            .ok_or_else(|| ValidationError::Malformed {
                field: "condition",
                reason: format!("unknown condition {:?}", s),
            })
    }
}

/// Raw wire form of [`ConditionSet`]. Any `dm` value is accepted on input
/// and normalized to `true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConditionFlags {
    dm: bool,
    ckd: bool,
    cad: bool,
    hypertension: bool,
    pregnancy: bool,
    neuropathy: bool,
    retinopathy: bool,
    obesity: bool,
}

/// Fixed set of condition flags.
///
/// Diabetes mellitus is always present: there is no way to construct or
/// mutate a set in which it is cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ConditionFlags", into = "ConditionFlags")]
pub struct ConditionSet {
    ckd: bool,
    cad: bool,
    hypertension: bool,
    pregnancy: bool,
    neuropathy: bool,
    retinopathy: bool,
    obesity: bool,
}

impl Default for ConditionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionSet {
    /// Set with only diabetes mellitus.
    pub fn new() -> Self {
        Self {
            ckd: false,
            cad: false,
            hypertension: false,
            pregnancy: false,
            neuropathy: false,
            retinopathy: false,
            obesity: false,
        }
    }

    /// Builder: add a condition.
    pub fn with(mut self, condition: Condition) -> Self {
        self.set(condition, true);
        self
    }

    /// Set a flag. Clearing diabetes mellitus has no effect.
    pub fn set(&mut self, condition: Condition, present: bool) {
        match condition {
            Condition::DiabetesMellitus => {}
            Condition::Ckd => self.ckd = present,
            Condition::Cad => self.cad = present,
            Condition::Hypertension => self.hypertension = present,
            Condition::Pregnancy => self.pregnancy = present,
            Condition::Neuropathy => self.neuropathy = present,
            Condition::Retinopathy => self.retinopathy = present,
            Condition::Obesity => self.obesity = present,
        }
    }

    /// Flip a flag. Diabetes mellitus cannot be toggled.
    pub fn toggle(&mut self, condition: Condition) {
        let current = self.contains(condition);
        self.set(condition, !current);
    }

    pub fn contains(&self, condition: Condition) -> bool {
        match condition {
            Condition::DiabetesMellitus => true,
            Condition::Ckd => self.ckd,
            Condition::Cad => self.cad,
            Condition::Hypertension => self.hypertension,
            Condition::Pregnancy => self.pregnancy,
            Condition::Neuropathy => self.neuropathy,
            Condition::Retinopathy => self.retinopathy,
            Condition::Obesity => self.obesity,
        }
    }

    pub fn diabetes_mellitus(&self) -> bool {
        true
    }

    pub fn pregnancy(&self) -> bool {
        self.pregnancy
    }

    pub fn obesity(&self) -> bool {
        self.obesity
    }

    /// Present conditions in canonical order.
    pub fn present(&self) -> Vec<Condition> {
        Condition::ALL
            .into_iter()
            .filter(|c| self.contains(*c))
            .collect()
    }

    /// Whether any present condition blocks oral medication.
    pub fn blocks_oral_medication(&self) -> bool {
        self.present().iter().any(|c| c.blocks_oral_medication())
    }
}

impl From<ConditionFlags> for ConditionSet {
    fn from(flags: ConditionFlags) -> Self {
        Self {
            ckd: flags.ckd,
            cad: flags.cad,
            hypertension: flags.hypertension,
            pregnancy: flags.pregnancy,
            neuropathy: flags.neuropathy,
            retinopathy: flags.retinopathy,
            obesity: flags.obesity,
        }
    }
}

impl From<ConditionSet> for ConditionFlags {
    fn from(set: ConditionSet) -> Self {
        Self {
            dm: true,
            ckd: set.ckd,
            cad: set.cad,
            hypertension: set.hypertension,
            pregnancy: set.pregnancy,
            neuropathy: set.neuropathy,
            retinopathy: set.retinopathy,
            obesity: set.obesity,
        }
    }
}
