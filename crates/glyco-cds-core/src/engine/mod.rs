//! Recommendation generation.
//!
//! Pipeline: Patient Record → Lab Check → Findings → Formulary Rules → Ranked Recommendations

mod formulary;
mod rules;

pub use formulary::*;
pub use rules::{block_reason, evaluate, is_indicated, Findings};

use std::time::Duration;

use crate::models::{PatientRecord, Recommendation};
use crate::validation::ValidationResult;

/// Anything that can produce recommendations for a patient.
///
/// Implementations must be pure with respect to the record: the same record
/// yields equivalent recommendations.
pub trait RecommendationSource: Send + Sync {
    /// Produce pending (or generation-time blocked) recommendations.
    fn recommend(&self, record: &PatientRecord) -> ValidationResult<Vec<Recommendation>>;
}

/// Formulary-driven rule engine.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    formulary: Formulary,
    latency: Duration,
}

impl RuleEngine {
    /// Create an engine over the built-in formulary.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_formulary(formulary: Formulary) -> Self {
        Self {
            formulary,
            latency: Duration::ZERO,
        }
    }

    /// Delay each generation, e.g. to mimic a remote model in demos.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn formulary(&self) -> &Formulary {
        &self.formulary
    }
}

impl RecommendationSource for RuleEngine {
    fn recommend(&self, record: &PatientRecord) -> ValidationResult<Vec<Recommendation>> {
        let (hba1c, egfr) = record.patient().labs.require_complete()?;
        let findings = Findings::from_record(record, hba1c, egfr);

        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let mut recommendations: Vec<Recommendation> = self
            .formulary
            .entries
            .iter()
            .filter_map(|entry| evaluate(entry, &findings))
            .collect();

        // Actionable first, then by confidence; stable within ties
        recommendations.sort_by(|a, b| {
            a.is_blocked()
                .cmp(&b.is_blocked())
                .then_with(|| b.confidence.cmp(&a.confidence))
        });

        tracing::debug!(
            patient = %record.patient().local_id,
            count = recommendations.len(),
            "Rules evaluated"
        );
        Ok(recommendations)
    }
}
