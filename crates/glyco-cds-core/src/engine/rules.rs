//! Patient-specific rules applied to each formulary entry.
//!
//! Per entry: Eligibility → Confidence adjustments → Warnings → Block check

use crate::classify::{CkdStage, HbA1cBand};
use crate::models::{Condition, PatientRecord, Recommendation};

use super::formulary::{DrugClass, FormularyEntry, Route};

/// HbA1c at or above which basal insulin is offered.
const INSULIN_HBA1C: f64 = 9.0;

/// LDL (mg/dL) at or above which a statin is offered.
const STATIN_LDL: f64 = 100.0;

/// Age at or above which a statin is offered regardless of LDL.
const STATIN_AGE: u32 = 40;

/// Per-finding confidence boost.
const FAVOR_BOOST: u8 = 6;

/// Clinical findings the rules read, extracted once per patient.
#[derive(Debug, Clone, PartialEq)]
pub struct Findings {
    pub hba1c: f64,
    pub egfr: f64,
    pub ldl: Option<f64>,
    pub age: u32,
    pub bmi: f64,
    pub pregnancy: bool,
    pub cad: bool,
    pub ckd: bool,
    pub hypertension: bool,
    pub obesity: bool,
    pub albuminuria: bool,
    pub hypoglycemia: bool,
}

impl Findings {
    /// Extract findings from a record whose lab panel has been checked.
    pub fn from_record(record: &PatientRecord, hba1c: f64, egfr: f64) -> Self {
        let patient = record.patient();
        let conditions = &patient.conditions;
        let ckd_stage = record.ckd_stage().map_or(false, |s| s >= CkdStage::Stage3);

        Self {
            hba1c,
            egfr,
            ldl: patient.labs.ldl,
            age: record.age(),
            bmi: record.bmi(),
            pregnancy: conditions.pregnancy(),
            cad: conditions.contains(Condition::Cad),
            ckd: conditions.contains(Condition::Ckd) || ckd_stage,
            hypertension: conditions.contains(Condition::Hypertension),
            obesity: record.has_obesity(),
            albuminuria: patient.labs.has_albuminuria(),
            hypoglycemia: patient.glucose.has_hypoglycemia(),
        }
    }

    fn hba1c_band(&self) -> HbA1cBand {
        HbA1cBand::from_value(self.hba1c)
    }

    fn needs_glycemic_therapy(&self) -> bool {
        self.hba1c_band() != HbA1cBand::Normal
    }
}

/// Whether the entry is offered at all for these findings.
pub fn is_indicated(entry: &FormularyEntry, f: &Findings) -> bool {
    match entry.drug_class {
        DrugClass::Biguanide => f.needs_glycemic_therapy(),
        DrugClass::Sglt2Inhibitor => f.needs_glycemic_therapy() || f.cad || f.ckd,
        DrugClass::Glp1Agonist => f.needs_glycemic_therapy() || f.cad || f.obesity,
        DrugClass::Dpp4Inhibitor | DrugClass::Sulfonylurea => {
            f.hba1c_band() == HbA1cBand::Poor
        }
        DrugClass::BasalInsulin => f.hba1c >= INSULIN_HBA1C || f.pregnancy,
        DrugClass::Statin => f.ldl.map_or(false, |v| v >= STATIN_LDL) || f.age >= STATIN_AGE,
        DrugClass::AceInhibitor => f.hypertension || f.albuminuria,
    }
}

fn adjusted_confidence(entry: &FormularyEntry, f: &Findings) -> u8 {
    let mut score = entry.base_confidence;
    let mut favor = |present: bool| {
        if present {
            score = score.saturating_add(FAVOR_BOOST);
        }
    };

    match entry.drug_class {
        DrugClass::Sglt2Inhibitor => {
            favor(f.cad);
            favor(f.ckd);
        }
        DrugClass::Glp1Agonist => {
            favor(f.obesity);
            favor(f.cad);
        }
        DrugClass::AceInhibitor => favor(f.albuminuria),
        _ => {}
    }

    if entry.drug_class == DrugClass::Biguanide && (30.0..45.0).contains(&f.egfr) {
        score = score.saturating_sub(10);
    }
    if entry.drug_class == DrugClass::Sglt2Inhibitor && f.egfr < 20.0 {
        score = score.saturating_sub(15);
    }

    score.min(100)
}

fn warnings(entry: &FormularyEntry, f: &Findings) -> Vec<String> {
    let mut warnings = entry.warnings.clone();

    match entry.drug_class {
        DrugClass::Biguanide if (30.0..45.0).contains(&f.egfr) => {
            warnings.push("eGFR 30-44: reduce dose, maximum 1000mg/day".into());
        }
        DrugClass::Sglt2Inhibitor if f.egfr < 20.0 => {
            warnings.push("eGFR below 20: limited glycemic efficacy".into());
        }
        _ => {}
    }

    if entry.drug_class.causes_hypoglycemia() && f.hypoglycemia {
        warnings.push("Hypoglycemia logged (<70 mg/dL): consider dose reduction".into());
    }

    warnings
}

/// Reason the entry must be blocked for these findings, if any.
pub fn block_reason(entry: &FormularyEntry, f: &Findings) -> Option<String> {
    if f.pregnancy && entry.drug_class == DrugClass::AceInhibitor {
        return Some("ACE inhibitors are contraindicated in pregnancy".into());
    }
    if f.pregnancy && entry.route == Route::Oral {
        return Some("Oral agents are not recommended in pregnancy".into());
    }
    if entry.drug_class == DrugClass::Biguanide && f.egfr < 30.0 {
        return Some(format!("Contraindicated with eGFR {:.0} (below 30)", f.egfr));
    }
    None
}

/// Evaluate one entry. `None` when the entry is not indicated.
pub fn evaluate(entry: &FormularyEntry, f: &Findings) -> Option<Recommendation> {
    if !is_indicated(entry, f) {
        return None;
    }

    let mut rec = Recommendation::new(
        entry.medication.clone(),
        entry.dose.clone(),
        entry.category.clone(),
        adjusted_confidence(entry, f),
    );
    rec.guidelines = entry.guidelines.clone();
    rec.warnings = warnings(entry, f);

    match block_reason(entry, f) {
        Some(reason) => {
            tracing::warn!(medication = %entry.medication, reason = %reason, "Recommendation blocked");
            Some(rec.blocked(reason))
        }
        None => {
            tracing::debug!(
                medication = %entry.medication,
                confidence = rec.confidence,
                warnings = rec.warnings.len(),
                "Rule fired"
            );
            Some(rec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Formulary;

    fn findings() -> Findings {
        Findings {
            hba1c: 8.2,
            egfr: 75.0,
            ldl: Some(90.0),
            age: 35,
            bmi: 26.1,
            pregnancy: false,
            cad: false,
            ckd: false,
            hypertension: false,
            obesity: false,
            albuminuria: false,
            hypoglycemia: false,
        }
    }

    fn entry(class: DrugClass) -> FormularyEntry {
        Formulary::default()
            .entries
            .into_iter()
            .find(|e| e.drug_class == class)
            .unwrap()
    }

    #[test]
    fn test_glycemic_agents_need_elevated_hba1c() {
        let mut f = findings();
        f.hba1c = 5.2;
        assert!(!is_indicated(&entry(DrugClass::Biguanide), &f));
        assert!(!is_indicated(&entry(DrugClass::Sulfonylurea), &f));

        f.hba1c = 6.1;
        assert!(is_indicated(&entry(DrugClass::Biguanide), &f));
        assert!(!is_indicated(&entry(DrugClass::Sulfonylurea), &f));

        f.hba1c = 7.0;
        assert!(is_indicated(&entry(DrugClass::Dpp4Inhibitor), &f));
    }

    #[test]
    fn test_metformin_renal_rules() {
        let metformin = entry(DrugClass::Biguanide);
        let mut f = findings();

        f.egfr = 29.0;
        let rec = evaluate(&metformin, &f).unwrap();
        assert!(rec.is_blocked());

        f.egfr = 30.0;
        let rec = evaluate(&metformin, &f).unwrap();
        assert!(!rec.is_blocked());
        assert_eq!(rec.warnings.len(), 1);
        assert_eq!(rec.confidence, metformin.base_confidence - 10);

        f.egfr = 45.0;
        let rec = evaluate(&metformin, &f).unwrap();
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn test_pregnancy_blocks_oral_agents() {
        let mut f = findings();
        f.pregnancy = true;

        let rec = evaluate(&entry(DrugClass::Biguanide), &f).unwrap();
        assert!(rec.is_blocked());
        assert!(rec.block_reason.unwrap().contains("pregnancy"));

        f.hypertension = true;
        let rec = evaluate(&entry(DrugClass::AceInhibitor), &f).unwrap();
        assert_eq!(
            rec.block_reason.as_deref(),
            Some("ACE inhibitors are contraindicated in pregnancy")
        );

        // Injectables are unaffected; insulin is offered in pregnancy
        let rec = evaluate(&entry(DrugClass::BasalInsulin), &f).unwrap();
        assert!(!rec.is_blocked());
        assert!(!evaluate(&entry(DrugClass::Glp1Agonist), &f).unwrap().is_blocked());
    }

    #[test]
    fn test_favoring_findings_raise_confidence() {
        let sglt2 = entry(DrugClass::Sglt2Inhibitor);
        let mut f = findings();
        let base = evaluate(&sglt2, &f).unwrap().confidence;

        f.cad = true;
        f.ckd = true;
        let boosted = evaluate(&sglt2, &f).unwrap().confidence;
        assert_eq!(boosted, base + 2 * FAVOR_BOOST);

        // CAD alone makes SGLT2 and GLP-1 indicated at normal HbA1c
        f.hba1c = 5.0;
        assert!(is_indicated(&sglt2, &f));
        assert!(is_indicated(&entry(DrugClass::Glp1Agonist), &f));
    }

    #[test]
    fn test_confidence_capped() {
        let mut glp1 = entry(DrugClass::Glp1Agonist);
        glp1.base_confidence = 98;
        let mut f = findings();
        f.cad = true;
        f.obesity = true;
        assert_eq!(evaluate(&glp1, &f).unwrap().confidence, 100);
    }

    #[test]
    fn test_hypoglycemia_warning() {
        let mut f = findings();
        f.hypoglycemia = true;
        let rec = evaluate(&entry(DrugClass::Sulfonylurea), &f).unwrap();
        // Standing warning plus the logged hypoglycemia
        assert_eq!(rec.warnings.len(), 2);

        let rec = evaluate(&entry(DrugClass::Biguanide), &f).unwrap();
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn test_statin_and_ace_indications() {
        let statin = entry(DrugClass::Statin);
        let ace = entry(DrugClass::AceInhibitor);
        let mut f = findings();
        assert!(!is_indicated(&statin, &f));
        assert!(!is_indicated(&ace, &f));

        f.age = 40;
        assert!(is_indicated(&statin, &f));
        f.age = 35;
        f.ldl = Some(100.0);
        assert!(is_indicated(&statin, &f));

        f.albuminuria = true;
        assert!(is_indicated(&ace, &f));
    }

    #[test]
    fn test_sglt2_low_egfr_warning() {
        let mut f = findings();
        f.egfr = 18.0;
        let rec = evaluate(&entry(DrugClass::Sglt2Inhibitor), &f).unwrap();
        assert!(!rec.is_blocked());
        assert!(rec.warnings[0].contains("eGFR below 20"));
    }
}
