//! Classification rules mapping a lab or vital value to a qualitative band.
//!
//! Rules are pure lookups. A missing or non-numeric input yields
//! [`Band::Unknown`] rather than an error.

mod bands;

pub use bands::*;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifyError {
    #[error("Unknown classification rule: {0}")]
    UnknownRule(String),
}

/// Named classification rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    #[serde(rename = "hba1c")]
    HbA1c,
    Egfr,
    Bmi,
    GlucoseReading,
    GlucoseAverage,
}

impl Rule {
    pub const ALL: [Rule; 5] = [
        Rule::HbA1c,
        Rule::Egfr,
        Rule::Bmi,
        Rule::GlucoseReading,
        Rule::GlucoseAverage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::HbA1c => "hba1c",
            Rule::Egfr => "egfr",
            Rule::Bmi => "bmi",
            Rule::GlucoseReading => "glucose",
            Rule::GlucoseAverage => "glucose_average",
        }
    }
}

impl FromStr for Rule {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hba1c" | "a1c" => Ok(Rule::HbA1c),
            "egfr" | "ckd" => Ok(Rule::Egfr),
            "bmi" => Ok(Rule::Bmi),
            "glucose" | "glucose_reading" => Ok(Rule::GlucoseReading),
            "glucose_average" | "glucose_avg" => Ok(Rule::GlucoseAverage),
            other => Err(ClassifyError::UnknownRule(other.to_string())),
        }
    }
}

/// Result of applying a [`Rule`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "rule", content = "band", rename_all = "snake_case")]
pub enum Band {
    #[serde(rename = "hba1c")]
    HbA1c(HbA1cBand),
    Ckd(CkdStage),
    Bmi(BmiCategory),
    Glucose(GlucoseBand),
    GlucoseTarget(GlucoseTarget),
    Unknown,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::HbA1c(b) => b.as_str(),
            Band::Ckd(s) => s.as_str(),
            Band::Bmi(c) => c.as_str(),
            Band::Glucose(g) => g.as_str(),
            Band::GlucoseTarget(t) => t.as_str(),
            Band::Unknown => "unknown",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Band::HbA1c(b) => b.severity(),
            Band::Ckd(s) => s.severity(),
            Band::Bmi(c) => c.severity(),
            Band::Glucose(g) => g.severity(),
            Band::GlucoseTarget(t) => t.severity(),
            Band::Unknown => Severity::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Band::Unknown)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<&str> for Band {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Apply a rule to an optional value.
pub fn classify(rule: Rule, value: Option<f64>) -> Band {
    let value = match value.filter(|v| v.is_finite()) {
        Some(v) => v,
        None => return Band::Unknown,
    };

    match rule {
        Rule::HbA1c => Band::HbA1c(HbA1cBand::from_value(value)),
        Rule::Egfr => Band::Ckd(CkdStage::from_egfr(value)),
        Rule::Bmi => Band::Bmi(BmiCategory::from_value(value)),
        Rule::GlucoseReading => Band::Glucose(GlucoseBand::from_value(value)),
        Rule::GlucoseAverage => Band::GlucoseTarget(GlucoseTarget::from_average(value)),
    }
}

/// Apply a rule given by name, e.g. `"hba1c"`.
pub fn classify_named(rule: &str, value: Option<f64>) -> Result<Band, ClassifyError> {
    Ok(classify(rule.parse()?, value))
}
