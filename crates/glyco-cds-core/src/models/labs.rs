//! Laboratory panel.

use serde::{Deserialize, Serialize};

use crate::validation::{
    ValidationResult, CREATININE, EGFR, HBA1C, LDL, URINE_ALBUMIN,
};

/// Lab values captured on intake. HbA1c and eGFR are required for a
/// complete panel; the rest are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabPanel {
    /// HbA1c in % (0-20)
    pub hba1c: Option<f64>,
    /// eGFR in mL/min (0-200)
    pub egfr: Option<f64>,
    /// Creatinine in mg/dL (0-10)
    pub creatinine: Option<f64>,
    /// LDL cholesterol in mg/dL (0-500)
    pub ldl: Option<f64>,
    /// Urine albumin in mg/L (0-1000)
    pub urine_albumin: Option<f64>,
}

impl LabPanel {
    /// Panel with only the two required values.
    pub fn with_required(hba1c: f64, egfr: f64) -> Self {
        Self {
            hba1c: Some(hba1c),
            egfr: Some(egfr),
            ..Default::default()
        }
    }

    /// Whether the required values are present.
    pub fn is_complete(&self) -> bool {
        self.hba1c.is_some() && self.egfr.is_some()
    }

    /// Check the present values against their bounds.
    pub fn validate(&self) -> ValidationResult<()> {
        HBA1C.check_optional(self.hba1c)?;
        EGFR.check_optional(self.egfr)?;
        CREATININE.check_optional(self.creatinine)?;
        LDL.check_optional(self.ldl)?;
        URINE_ALBUMIN.check_optional(self.urine_albumin)?;
        Ok(())
    }

    /// Fail with `Missing` unless HbA1c and eGFR are present and valid.
    pub fn require_complete(&self) -> ValidationResult<(f64, f64)> {
        let hba1c = HBA1C.check_required(self.hba1c)?;
        let egfr = EGFR.check_required(self.egfr)?;
        Ok((hba1c, egfr))
    }

    /// Urine albumin at or above 30 mg/L.
    pub fn has_albuminuria(&self) -> bool {
        self.urine_albumin.map_or(false, |v| v >= 30.0)
    }
}
