//! Derived patient metrics: age, BMI and glucose average.
//!
//! All functions are pure. Derived values are always recomputed from their
//! source fields and never stored independently.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::classify::BmiCategory;
use crate::models::Patient;
use crate::validation::{ValidationError, ValidationResult};

/// Derived metrics for a patient at a reference date.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Metrics {
    /// Age in whole years
    pub age: u32,
    /// BMI rounded to one decimal place
    pub bmi: f64,
    /// BMI weight category
    pub bmi_category: BmiCategory,
}

/// Compute age in whole years at `reference`.
///
/// A birthday on Feb 29 is reached on Mar 1 in non-leap years: on Feb 28 the
/// patient has not yet had their birthday.
pub fn compute_age(dob: NaiveDate, reference: NaiveDate) -> ValidationResult<u32> {
    if dob > reference {
        return Err(ValidationError::FutureDate { dob, reference });
    }

    let mut years = reference.year() - dob.year();
    if (reference.month(), reference.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }

    Ok(years.max(0) as u32)
}

/// Compute BMI from weight (kg) and height (cm), rounded to one decimal.
///
/// Returns `Ok(None)` when either input is absent (or not a number).
pub fn compute_bmi(weight_kg: Option<f64>, height_cm: Option<f64>) -> ValidationResult<Option<f64>> {
    let (weight, height) = match (
        weight_kg.filter(|w| w.is_finite()),
        height_cm.filter(|h| h.is_finite()),
    ) {
        (Some(w), Some(h)) => (w, h),
        _ => return Ok(None),
    };

    if height <= 0.0 {
        return Err(ValidationError::OutOfRange {
            field: "height_cm",
            min: f64::MIN_POSITIVE,
            max: f64::MAX,
            value: height,
        });
    }

    let height_m = height / 100.0;
    let bmi = weight / (height_m * height_m);
    Ok(Some(round_to_tenth(bmi)))
}

/// Mean of the present readings rounded to the nearest integer, or 0 when
/// there are none.
pub fn compute_glucose_average(readings: &[Option<f64>]) -> u32 {
    let valid: Vec<f64> = readings
        .iter()
        .filter_map(|r| *r)
        .filter(|r| r.is_finite())
        .collect();

    if valid.is_empty() {
        return 0;
    }

    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    mean.round().max(0.0) as u32
}

/// Compute age and BMI for a patient.
pub fn calculate_metrics(patient: &Patient, reference: NaiveDate) -> ValidationResult<Metrics> {
    let age = compute_age(patient.date_of_birth, reference)?;
    let bmi = compute_bmi(Some(patient.weight_kg), Some(patient.height_cm))?
        .ok_or(ValidationError::Missing { field: "weight_kg" })?;

    Ok(Metrics {
        age,
        bmi,
        bmi_category: BmiCategory::from_value(bmi),
    })
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
