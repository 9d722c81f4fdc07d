//! A clinician's working session: one selected patient, the current
//! recommendation run and the audit trail of decisions.
//!
//! Pipeline: Select Patient → Metrics / Classification → Generate → Decide → Audit

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{audit_csv, AuditError, AuditExport, AuditFilter, AuditLog};
use crate::classify::{classify, Band, Rule};
use crate::config::{ConfigError, SessionConfig};
use crate::db::{DbError, DbResult};
use crate::engine::RecommendationSource;
use crate::metrics::Metrics;
use crate::models::{AuditEntry, AuditRecord, DecisionAction, Patient, PatientRecord, Recommendation};
use crate::review::{DecisionSummary, GenerationTicket, RecommendationRun, ReviewBoard, ReviewError};
use crate::validation::{ValidationError, ValidationResult};

/// Session errors.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("No patient selected")]
    NoPatient,
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Every classification for the selected patient.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PatientBands {
    pub hba1c: Band,
    pub ckd: Band,
    pub bmi: Band,
    pub glucose_average: Band,
}

/// Session state. Not thread-safe on its own; the FFI wraps it in a mutex.
#[derive(Debug, Default)]
pub struct ClinicalSession {
    config: SessionConfig,
    record: Option<PatientRecord>,
    board: ReviewBoard,
    audit: AuditLog,
}

impl ClinicalSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Resume with a previously persisted audit trail.
    pub fn with_audit(config: SessionConfig, audit: AuditLog) -> Self {
        Self {
            config,
            audit,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Select a patient. Any current run is discarded.
    pub fn set_patient(&mut self, patient: Patient) -> ValidationResult<&PatientRecord> {
        let record = PatientRecord::new(patient, self.config.reference_date())?;
        tracing::info!(patient = %record.patient().local_id, "Patient selected");
        self.board.clear();
        Ok(self.record.insert(record))
    }

    /// Edit the selected patient; metrics are recomputed and the current
    /// run is discarded.
    pub fn edit_patient<F>(&mut self, f: F) -> SessionResult<&PatientRecord>
    where
        F: FnOnce(&mut Patient),
    {
        let edited = self.record()?.edit(f)?;
        self.board.clear();
        Ok(self.record.insert(edited))
    }

    pub fn record(&self) -> SessionResult<&PatientRecord> {
        self.record.as_ref().ok_or(SessionError::NoPatient)
    }

    pub fn calculate_metrics(&self) -> SessionResult<Metrics> {
        Ok(*self.record()?.metrics())
    }

    pub fn classify(&self) -> SessionResult<PatientBands> {
        let record = self.record()?;
        let labs = &record.patient().labs;
        let glucose_average = record.patient().glucose.readings().iter().any(Option::is_some);

        Ok(PatientBands {
            hba1c: classify(Rule::HbA1c, labs.hba1c),
            ckd: classify(Rule::Egfr, labs.egfr),
            bmi: classify(Rule::Bmi, Some(record.bmi())),
            glucose_average: classify(
                Rule::GlucoseAverage,
                glucose_average.then(|| record.glucose_average() as f64),
            ),
        })
    }

    /// Start a generation for the selected patient.
    ///
    /// The returned record snapshot can be handed to a
    /// [`RecommendationSource`] outside any lock; the result is delivered
    /// with [`ClinicalSession::complete_generation`].
    pub fn begin_generation(&mut self) -> SessionResult<(GenerationTicket, PatientRecord)> {
        let record = self.record()?.clone();
        Ok((self.board.begin_generation(), record))
    }

    /// Deliver a generation result. `Ok(None)` when a newer generation has
    /// started since `ticket` was issued.
    pub fn complete_generation(
        &mut self,
        ticket: GenerationTicket,
        result: ValidationResult<Vec<Recommendation>>,
    ) -> SessionResult<Option<&RecommendationRun>> {
        match result {
            Ok(recommendations) => Ok(self.board.complete_generation(ticket, recommendations)),
            Err(e) => {
                self.board.fail_generation(ticket);
                Err(e.into())
            }
        }
    }

    /// Generate synchronously with `source`.
    pub fn generate_recommendations(
        &mut self,
        source: &dyn RecommendationSource,
    ) -> SessionResult<&RecommendationRun> {
        let (ticket, record) = self.begin_generation()?;
        let result = source.recommend(&record);
        self.complete_generation(ticket, result)?;
        Ok(&*self.board.current_mut()?)
    }

    pub fn is_generating(&self) -> bool {
        self.board.is_generating()
    }

    pub fn current_run(&self) -> Option<&RecommendationRun> {
        self.board.current()
    }

    /// Apply a decision and append it to the audit trail.
    pub fn apply_decision(
        &mut self,
        recommendation_id: &str,
        action: &DecisionAction,
    ) -> SessionResult<(Recommendation, AuditEntry)> {
        self.apply_decision_with(recommendation_id, action, |_| Ok(()))
    }

    /// Apply a decision, handing the sealed audit entry to `persist` before
    /// it joins the in-memory trail. When `persist` fails the run and the
    /// trail are left as they were.
    pub fn apply_decision_with<F>(
        &mut self,
        recommendation_id: &str,
        action: &DecisionAction,
        persist: F,
    ) -> SessionResult<(Recommendation, AuditEntry)>
    where
        F: FnOnce(&AuditEntry) -> DbResult<()>,
    {
        let snapshot = self.board.current().cloned();
        let updated = self.board.apply(recommendation_id, action)?;

        let sealed = self.seal_decision(&updated, action).and_then(|entry| {
            persist(&entry)?;
            Ok(entry)
        });
        let entry = match sealed {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(recommendation = %updated.id, error = %e, "Decision not recorded");
                self.board.restore(snapshot);
                return Err(e);
            }
        };
        let entry = self.audit.commit(entry)?.clone();

        tracing::info!(
            recommendation = %updated.id,
            status = %entry.status(),
            "Decision recorded"
        );
        Ok((updated, entry))
    }

    fn seal_decision(
        &mut self,
        updated: &Recommendation,
        action: &DecisionAction,
    ) -> SessionResult<AuditEntry> {
        let run_id = self.board.current_mut()?.run_id().to_string();
        let record = AuditRecord::from_decision(&run_id, updated).ok_or_else(|| {
            ReviewError::InvalidTransition {
                id: updated.id.clone(),
                from: updated.status,
                action: action.name(),
            }
        })?;
        Ok(self.audit.seal(record)?)
    }

    /// Decision counts for the current run; all zero without one.
    pub fn summary(&self) -> DecisionSummary {
        self.board
            .current()
            .map(RecommendationRun::summary)
            .unwrap_or_default()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn export_audit_csv(&self, filter: &AuditFilter) -> String {
        audit_csv(self.audit.filter(filter))
    }

    pub fn export_audit(&self, filter: &AuditFilter) -> AuditExport {
        AuditExport::new(&self.audit, filter, self.config.system_id.clone())
    }
}
