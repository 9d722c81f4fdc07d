//! Input validation shared by the patient models and the review workflow.

use chrono::NaiveDate;
use thiserror::Error;

/// A rejected input, naming the field and the constraint it violated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{field} is required")]
    Missing { field: &'static str },

    #[error("{field} is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },

    #[error("date_of_birth {dob} is after the reference date {reference}")]
    FutureDate { dob: NaiveDate, reference: NaiveDate },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::OutOfRange { field, .. }
            | ValidationError::Missing { field }
            | ValidationError::Malformed { field, .. } => field,
            ValidationError::FutureDate { .. } => "date_of_birth",
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Inclusive numeric bounds for a named field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub field: &'static str,
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(field: &'static str, min: f64, max: f64) -> Self {
        Self { field, min, max }
    }

    /// Check a present value. NaN and infinities are malformed, not out of range.
    pub fn check(&self, value: f64) -> ValidationResult<f64> {
        if !value.is_finite() {
            return Err(ValidationError::Malformed {
                field: self.field,
                reason: "not a finite number".into(),
            });
        }
        if value < self.min || value > self.max {
            return Err(ValidationError::OutOfRange {
                field: self.field,
                min: self.min,
                max: self.max,
                value,
            });
        }
        Ok(value)
    }

    /// Check an optional value; absence is always acceptable here.
    pub fn check_optional(&self, value: Option<f64>) -> ValidationResult<Option<f64>> {
        value.map(|v| self.check(v)).transpose()
    }

    /// Check a value that must be present.
    pub fn check_required(&self, value: Option<f64>) -> ValidationResult<f64> {
        let v = value.ok_or(ValidationError::Missing { field: self.field })?;
        self.check(v)
    }
}

pub const WEIGHT_KG: Bounds = Bounds::new("weight_kg", 20.0, 300.0);
pub const HEIGHT_CM: Bounds = Bounds::new("height_cm", 100.0, 250.0);
pub const HBA1C: Bounds = Bounds::new("hba1c", 0.0, 20.0);
pub const EGFR: Bounds = Bounds::new("egfr", 0.0, 200.0);
pub const CREATININE: Bounds = Bounds::new("creatinine", 0.0, 10.0);
pub const LDL: Bounds = Bounds::new("ldl", 0.0, 500.0);
pub const URINE_ALBUMIN: Bounds = Bounds::new("urine_albumin", 0.0, 1000.0);
pub const GLUCOSE: Bounds = Bounds::new("glucose", 0.0, 600.0);
pub const BASE_CONFIDENCE: Bounds = Bounds::new("base_confidence", 0.0, 100.0);

/// Oldest plausible patient age in years.
pub const MAX_AGE_YEARS: u32 = 150;

/// Require non-blank text with at least `min_chars` characters after trimming.
pub fn require_text(field: &'static str, value: &str, min_chars: usize) -> ValidationResult<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    if trimmed.chars().count() < min_chars {
        return Err(ValidationError::Malformed {
            field,
            reason: format!("must be at least {} characters", min_chars),
        });
    }
    Ok(())
}

/// Validate a medical record number of the form `MR-YYYY-XXX`.
///
/// The prefix is case-insensitive; the year is four digits and the suffix is
/// three ASCII alphanumerics.
pub fn validate_mr_number(value: &str) -> ValidationResult<()> {
    let malformed = || ValidationError::Malformed {
        field: "mr_number",
        reason: "expected format MR-YYYY-XXX".into(),
    };

    if value.trim().is_empty() {
        return Err(ValidationError::Missing { field: "mr_number" });
    }

    let mut parts = value.split('-');
    let (prefix, year, suffix) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(p), Some(y), Some(s), None) => (p, y, s),
        _ => return Err(malformed()),
    };

    if !prefix.eq_ignore_ascii_case("MR") {
        return Err(malformed());
    }
    if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }
    if suffix.len() != 3 || !suffix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(malformed());
    }
    Ok(())
}
