//! Threshold tables for each clinical rule.
//!
//! Every `from_value` is total over finite inputs. A value sitting exactly on
//! a boundary belongs to the band whose lower bound it is.

use serde::{Deserialize, Serialize};

/// Display severity shared by all bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Caution,
    Critical,
    Unknown,
}

/// HbA1c glycemic control level (%).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HbA1cBand {
    /// < 5.7
    Normal,
    /// 5.7 – < 7.0 (prediabetic range or near target)
    Elevated,
    /// >= 7.0
    Poor,
}

impl HbA1cBand {
    pub fn from_value(value: f64) -> Self {
        if value >= 7.0 {
            HbA1cBand::Poor
        } else if value >= 5.7 {
            HbA1cBand::Elevated
        } else {
            HbA1cBand::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HbA1cBand::Normal => "normal",
            HbA1cBand::Elevated => "elevated",
            HbA1cBand::Poor => "poor",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            HbA1cBand::Normal => Severity::Normal,
            HbA1cBand::Elevated => Severity::Caution,
            HbA1cBand::Poor => Severity::Critical,
        }
    }
}

/// Chronic kidney disease stage derived from eGFR (mL/min).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CkdStage {
    Stage1,
    Stage2,
    Stage3,
    Stage4,
    Stage5,
}

impl CkdStage {
    pub fn from_egfr(egfr: f64) -> Self {
        if egfr >= 90.0 {
            CkdStage::Stage1
        } else if egfr >= 60.0 {
            CkdStage::Stage2
        } else if egfr >= 30.0 {
            CkdStage::Stage3
        } else if egfr >= 15.0 {
            CkdStage::Stage4
        } else {
            CkdStage::Stage5
        }
    }

    /// Numeric stage, 1 through 5.
    pub fn number(&self) -> u8 {
        match self {
            CkdStage::Stage1 => 1,
            CkdStage::Stage2 => 2,
            CkdStage::Stage3 => 3,
            CkdStage::Stage4 => 4,
            CkdStage::Stage5 => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CkdStage::Stage1 => "stage1",
            CkdStage::Stage2 => "stage2",
            CkdStage::Stage3 => "stage3",
            CkdStage::Stage4 => "stage4",
            CkdStage::Stage5 => "stage5",
        }
    }

    /// Human label, e.g. "Moderate".
    pub fn label(&self) -> &'static str {
        match self {
            CkdStage::Stage1 => "Normal",
            CkdStage::Stage2 => "Mild",
            CkdStage::Stage3 => "Moderate",
            CkdStage::Stage4 => "Severe",
            CkdStage::Stage5 => "Failure",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            CkdStage::Stage1 => Severity::Normal,
            CkdStage::Stage2 | CkdStage::Stage3 => Severity::Caution,
            CkdStage::Stage4 | CkdStage::Stage5 => Severity::Critical,
        }
    }
}

/// BMI weight category (kg/m²).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn from_value(bmi: f64) -> Self {
        if bmi >= 30.0 {
            BmiCategory::Obese
        } else if bmi >= 25.0 {
            BmiCategory::Overweight
        } else if bmi >= 18.5 {
            BmiCategory::Normal
        } else {
            BmiCategory::Underweight
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "underweight",
            BmiCategory::Normal => "normal",
            BmiCategory::Overweight => "overweight",
            BmiCategory::Obese => "obese",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            BmiCategory::Normal => Severity::Normal,
            BmiCategory::Underweight | BmiCategory::Overweight => Severity::Caution,
            BmiCategory::Obese => Severity::Critical,
        }
    }
}

/// Single capillary glucose reading (mg/dL).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseBand {
    /// < 70
    Hypoglycemic,
    /// 70 – 140
    InRange,
    /// > 140 – 180
    Elevated,
    /// > 180
    High,
}

impl GlucoseBand {
    pub fn from_value(mg_dl: f64) -> Self {
        if mg_dl < 70.0 {
            GlucoseBand::Hypoglycemic
        } else if mg_dl <= 140.0 {
            GlucoseBand::InRange
        } else if mg_dl <= 180.0 {
            GlucoseBand::Elevated
        } else {
            GlucoseBand::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseBand::Hypoglycemic => "hypoglycemic",
            GlucoseBand::InRange => "in_range",
            GlucoseBand::Elevated => "elevated",
            GlucoseBand::High => "high",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            GlucoseBand::InRange => Severity::Normal,
            GlucoseBand::Elevated => Severity::Caution,
            GlucoseBand::Hypoglycemic | GlucoseBand::High => Severity::Critical,
        }
    }
}

/// Average glucose against the 154 mg/dL target (HbA1c 7% equivalent).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseTarget {
    Acceptable,
    Elevated,
}

impl GlucoseTarget {
    pub const THRESHOLD_MG_DL: f64 = 154.0;

    pub fn from_average(mg_dl: f64) -> Self {
        if mg_dl <= Self::THRESHOLD_MG_DL {
            GlucoseTarget::Acceptable
        } else {
            GlucoseTarget::Elevated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseTarget::Acceptable => "acceptable",
            GlucoseTarget::Elevated => "elevated",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            GlucoseTarget::Acceptable => Severity::Normal,
            GlucoseTarget::Elevated => Severity::Caution,
        }
    }
}
