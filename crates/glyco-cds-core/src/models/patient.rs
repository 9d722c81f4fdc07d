//! Patient models.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::conditions::ConditionSet;
use super::glucose::GlucoseLog;
use super::labs::LabPanel;
use crate::classify::{classify, Band, CkdStage, Rule};
use crate::metrics::{calculate_metrics, compute_age, Metrics};
use crate::validation::{
    require_text, validate_mr_number, ValidationError, ValidationResult, HEIGHT_CM, MAX_AGE_YEARS,
    WEIGHT_KG,
};

/// Patient gender as captured on intake.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            "" => Err(ValidationError::Missing { field: "gender" }),
            _ => Err(ValidationError::Malformed {
                field: "gender",
                reason: format!("expected Male or Female, got {:?}", s),
            }),
        }
    }
}

/// A patient with the lab panel, glucose log and conditions they own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Local UUID - always present, generated locally
    pub local_id: String,
    /// Medical record number, `MR-YYYY-XXX`
    pub mr_number: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    /// Weight in kg (20-300)
    pub weight_kg: f64,
    /// Height in cm (100-250)
    pub height_cm: f64,
    #[serde(default)]
    pub labs: LabPanel,
    #[serde(default)]
    pub glucose: GlucoseLog,
    #[serde(default)]
    pub conditions: ConditionSet,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required demographics.
    pub fn new(
        mr_number: String,
        first_name: String,
        last_name: String,
        date_of_birth: NaiveDate,
        gender: Gender,
        weight_kg: f64,
        height_cm: f64,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            local_id: uuid::Uuid::new_v4().to_string(),
            mr_number,
            first_name,
            last_name,
            date_of_birth,
            gender,
            weight_kg,
            height_cm,
            labs: LabPanel::default(),
            glucose: GlucoseLog::default(),
            conditions: ConditionSet::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// "First Last".
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }

    /// Validate every source field against its stated bounds.
    ///
    /// Lab completeness is not required here; see [`LabPanel::require_complete`].
    pub fn validate(&self, reference: NaiveDate) -> ValidationResult<()> {
        validate_mr_number(&self.mr_number)?;
        require_text("first_name", &self.first_name, 2)?;
        require_text("last_name", &self.last_name, 2)?;

        let age = compute_age(self.date_of_birth, reference)?;
        if age > MAX_AGE_YEARS {
            return Err(ValidationError::OutOfRange {
                field: "date_of_birth",
                min: 0.0,
                max: MAX_AGE_YEARS as f64,
                value: age as f64,
            });
        }

        WEIGHT_KG.check(self.weight_kg)?;
        HEIGHT_CM.check(self.height_cm)?;
        self.labs.validate()?;
        self.glucose.validate()?;
        Ok(())
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// A validated patient together with metrics derived from it.
///
/// Age, BMI and the glucose average are computed on construction and cannot
/// be set independently; editing goes through [`PatientRecord::edit`], which
/// recomputes everything from the edited source fields.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PatientRecord {
    patient: Patient,
    reference_date: NaiveDate,
    metrics: Metrics,
    glucose_average: u32,
}

impl PatientRecord {
    /// Validate a patient and derive its metrics at `reference_date`.
    pub fn new(patient: Patient, reference_date: NaiveDate) -> ValidationResult<Self> {
        patient.validate(reference_date)?;
        let metrics = calculate_metrics(&patient, reference_date)?;
        let glucose_average = patient.glucose.average();

        Ok(Self {
            patient,
            reference_date,
            metrics,
            glucose_average,
        })
    }

    /// Apply an edit to a copy of the patient and rebuild the record.
    pub fn edit<F>(&self, f: F) -> ValidationResult<Self>
    where
        F: FnOnce(&mut Patient),
    {
        let mut patient = self.patient.clone();
        f(&mut patient);
        patient.touch();
        Self::new(patient, self.reference_date)
    }

    pub fn patient(&self) -> &Patient {
        &self.patient
    }

    pub fn into_patient(self) -> Patient {
        self.patient
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn age(&self) -> u32 {
        self.metrics.age
    }

    pub fn bmi(&self) -> f64 {
        self.metrics.bmi
    }

    pub fn glucose_average(&self) -> u32 {
        self.glucose_average
    }

    pub fn hba1c_band(&self) -> Band {
        classify(Rule::HbA1c, self.patient.labs.hba1c)
    }

    pub fn ckd_stage(&self) -> Option<CkdStage> {
        self.patient.labs.egfr.filter(|v| v.is_finite()).map(CkdStage::from_egfr)
    }

    /// Obesity is flagged clinically or implied by BMI >= 30.
    pub fn has_obesity(&self) -> bool {
        self.patient.conditions.obesity() || self.metrics.bmi >= 30.0
    }
}
