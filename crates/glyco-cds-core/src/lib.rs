//! Glyco-CDS Core Library
//!
//! Diabetes clinical decision support: derived metrics, lab classification,
//! physician review of medication recommendations and a tamper-evident audit
//! trail.
//!
//! # Architecture
//!
//! ```text
//! Patient intake → Validation → PatientRecord (age, BMI, glucose average)
//!                                     │
//!                          Classification (HbA1c, CKD, BMI, glucose)
//!                                     │
//!                     RecommendationSource (formulary rule engine)
//!                                     │
//!                      [ReviewBoard: latest generation only]
//!                                     │
//!                       Physician accept / modify / reject
//!                                     │
//!                     ┌───────────────▼───────────────┐
//!                     │        Audit Chain Append      │
//!                     │ hash = sha256(prev + record)   │
//!                     └───────────────┬───────────────┘
//!                                     │
//!                        ┌────────────┼────────────┐
//!                        ▼            ▼            ▼
//!                    CSV Export   JSON Export   Dashboard
//! ```
//!
//! # Core Principle
//!
//! **Every recommendation requires a physician decision.** Nothing is applied
//! automatically, regardless of confidence, and blocked recommendations can
//! never be accepted.
//!
//! # Modules
//!
//! - [`validation`]: Field bounds and the validation error taxonomy
//! - [`models`]: Domain types (Patient, Recommendation, AuditEntry, etc.)
//! - [`metrics`]: Age, BMI and glucose average calculators
//! - [`classify`]: Classification rules and bands
//! - [`engine`]: Formulary-driven recommendation rules
//! - [`review`]: Recommendation state machine and last-call-wins generation
//! - [`audit`]: Hash-chained audit log and exports
//! - [`search`]: Dashboard patient search
//! - [`db`]: SQLite persistence
//! - [`config`]: Session configuration
//! - [`session`]: A clinician's working session

pub mod audit;
pub mod classify;
pub mod config;
pub mod db;
pub mod engine;
pub mod metrics;
pub mod models;
pub mod review;
pub mod search;
pub mod session;
pub mod validation;

// Re-export commonly used types
pub use audit::{AuditExport, AuditFilter, AuditLog};
pub use classify::{classify, classify_named, Band, Rule};
pub use config::SessionConfig;
pub use db::{DashboardStats, Database};
pub use engine::{Formulary, RecommendationSource, RuleEngine};
pub use metrics::{calculate_metrics, compute_age, compute_bmi, compute_glucose_average, Metrics};
pub use models::{
    AuditEntry, AuditStatus, Condition, ConditionSet, DecisionAction, Gender, GlucoseLog,
    GlucoseSlot, LabPanel, Patient, PatientRecord, Recommendation, RecommendationStatus,
};
pub use review::{summarize, DecisionSummary, RecommendationRun, ReviewBoard};
pub use session::ClinicalSession;
pub use validation::ValidationError;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tracing_subscriber::EnvFilter;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum GlycoCdsError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<ValidationError> for GlycoCdsError {
    fn from(e: ValidationError) -> Self {
        GlycoCdsError::ValidationError(e.to_string())
    }
}

impl From<classify::ClassifyError> for GlycoCdsError {
    fn from(e: classify::ClassifyError) -> Self {
        GlycoCdsError::ValidationError(e.to_string())
    }
}

impl From<review::ReviewError> for GlycoCdsError {
    fn from(e: review::ReviewError) -> Self {
        match e {
            review::ReviewError::Validation(v) => v.into(),
            review::ReviewError::InvalidTransition { .. } => {
                GlycoCdsError::InvalidTransition(e.to_string())
            }
            review::ReviewError::NotFound(id) => GlycoCdsError::NotFound(id),
            review::ReviewError::NoActiveRun => GlycoCdsError::InvalidState(e.to_string()),
        }
    }
}

impl From<audit::AuditError> for GlycoCdsError {
    fn from(e: audit::AuditError) -> Self {
        match e {
            audit::AuditError::Json(j) => j.into(),
            audit::AuditError::ChainBroken { .. } => GlycoCdsError::InvalidState(e.to_string()),
        }
    }
}

impl From<db::DbError> for GlycoCdsError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => GlycoCdsError::NotFound(what),
            other => GlycoCdsError::DatabaseError(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for GlycoCdsError {
    fn from(e: config::ConfigError) -> Self {
        GlycoCdsError::ConfigError(e.to_string())
    }
}

impl From<session::SessionError> for GlycoCdsError {
    fn from(e: session::SessionError) -> Self {
        match e {
            session::SessionError::Validation(v) => v.into(),
            session::SessionError::Review(r) => r.into(),
            session::SessionError::Audit(a) => a.into(),
            session::SessionError::Config(c) => c.into(),
            session::SessionError::Storage(d) => d.into(),
            session::SessionError::NoPatient => GlycoCdsError::InvalidState(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for GlycoCdsError {
    fn from(e: serde_json::Error) -> Self {
        GlycoCdsError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for GlycoCdsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        GlycoCdsError::InvalidState(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install a `tracing` subscriber. `RUST_LOG` wins over `filter`; repeated
/// calls are ignored.
#[uniffi::export]
pub fn init_logging(filter: Option<String>) {
    let fallback = filter.unwrap_or_else(|| "glyco_cds_core=info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .try_init();
}

/// Open or create a database at the given path.
///
/// `config_json` is an optional serialized [`SessionConfig`]. The stored
/// audit chain is verified on open; a chain that does not verify fails with
/// [`GlycoCdsError::InvalidState`] and no handle is returned.
#[uniffi::export]
pub fn open_database(
    path: String,
    config_json: Option<String>,
) -> Result<Arc<GlycoCdsCore>, GlycoCdsError> {
    let db = Database::open(&path)?;
    GlycoCdsCore::new(db, parse_config(config_json)?)
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory(
    config_json: Option<String>,
) -> Result<Arc<GlycoCdsCore>, GlycoCdsError> {
    let db = Database::open_in_memory()?;
    GlycoCdsCore::new(db, parse_config(config_json)?)
}

/// Classify one value with a named rule (`hba1c`, `egfr`, `bmi`, `glucose`,
/// `glucose_average`).
#[uniffi::export]
pub fn classify_value(rule: String, value: Option<f64>) -> Result<FfiBand, GlycoCdsError> {
    let rule = Rule::from_str(&rule)?;
    Ok(FfiBand::new(rule, classify(rule, value)))
}

/// Compute derived metrics from raw inputs.
///
/// Dates are `YYYY-MM-DD`; `reference_date` defaults to today.
#[uniffi::export]
pub fn calculate_metrics_from_inputs(
    date_of_birth: String,
    weight_kg: Option<f64>,
    height_cm: Option<f64>,
    glucose_readings: Vec<Option<f64>>,
    reference_date: Option<String>,
) -> Result<FfiMetrics, GlycoCdsError> {
    let dob = parse_date("date_of_birth", &date_of_birth)?;
    let reference = match reference_date {
        Some(s) => parse_date("reference_date", &s)?,
        None => chrono::Local::now().date_naive(),
    };

    let age = compute_age(dob, reference)?;
    let bmi = compute_bmi(weight_kg, height_cm)?;
    Ok(FfiMetrics {
        age,
        bmi,
        bmi_category: bmi.map(|b| classify(Rule::Bmi, Some(b)).to_string()),
        glucose_average: compute_glucose_average(&glucose_readings),
    })
}

fn parse_config(config_json: Option<String>) -> Result<SessionConfig, GlycoCdsError> {
    match config_json {
        Some(json) => Ok(SessionConfig::from_json(&json)?),
        None => Ok(SessionConfig::default()),
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| ValidationError::Malformed {
        field,
        reason: format!("expected YYYY-MM-DD: {}", e),
    })
}

fn parse_filter(
    status: Option<String>,
    from: Option<String>,
    to: Option<String>,
) -> Result<AuditFilter, ValidationError> {
    Ok(AuditFilter {
        status: status.as_deref().map(AuditStatus::from_str).transpose()?,
        from: from.as_deref().map(|s| parse_date("from", s)).transpose()?,
        to: to.as_deref().map(|s| parse_date("to", s)).transpose()?,
    })
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe session and database wrapper for FFI.
#[derive(Debug, uniffi::Object)]
pub struct GlycoCdsCore {
    session: Arc<Mutex<ClinicalSession>>,
    db: Arc<Mutex<Database>>,
    engine: RuleEngine,
}

impl GlycoCdsCore {
    fn new(db: Database, config: SessionConfig) -> Result<Arc<Self>, GlycoCdsError> {
        let audit = AuditLog::from_entries(db.list_audit_entries()?)?;
        let engine = config.rule_engine()?;
        tracing::info!(entries = audit.len(), "Audit trail loaded");

        Ok(Arc::new(Self {
            session: Arc::new(Mutex::new(ClinicalSession::with_audit(config, audit))),
            db: Arc::new(Mutex::new(db)),
            engine,
        }))
    }
}

#[uniffi::export]
impl GlycoCdsCore {
    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Validate and store a patient. A patient without `local_id` is created.
    pub fn save_patient(&self, patient: FfiPatient) -> Result<FfiPatient, GlycoCdsError> {
        let reference = self.session.lock()?.config().reference_date();
        let mut patient = Patient::try_from(patient)?;
        patient.touch();
        let record = PatientRecord::new(patient, reference)?;

        let db = self.db.lock()?;
        db.save_patient(record.patient())?;
        Ok(record.into_patient().into())
    }

    /// Get a patient by local ID.
    pub fn get_patient(&self, local_id: String) -> Result<Option<FfiPatient>, GlycoCdsError> {
        let db = self.db.lock()?;
        let patient = db.get_patient(&local_id)?;
        Ok(patient.map(|p| p.into()))
    }

    /// Search patients by name or MR number.
    pub fn search_patients(
        &self,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiPatient>, GlycoCdsError> {
        let db = self.db.lock()?;
        let matches = db.search_patients(&query, limit as usize)?;
        Ok(matches.into_iter().map(|m| m.patient.into()).collect())
    }

    /// Make a stored patient the session's current patient.
    pub fn select_patient(&self, local_id: String) -> Result<FfiPatientOverview, GlycoCdsError> {
        let patient = self
            .db
            .lock()?
            .get_patient(&local_id)?
            .ok_or_else(|| GlycoCdsError::NotFound(local_id.clone()))?;

        let mut session = self.session.lock()?;
        session.set_patient(patient)?;
        overview(&session)
    }

    /// Metrics and bands for the current patient.
    pub fn calculate_metrics(&self) -> Result<FfiPatientOverview, GlycoCdsError> {
        let session = self.session.lock()?;
        overview(&session)
    }

    // =========================================================================
    // Recommendation Operations
    // =========================================================================

    /// Generate recommendations for the current patient.
    ///
    /// The session lock is released while the engine runs. Returns `None`
    /// when a newer generation was started in the meantime.
    pub fn generate_recommendations(
        &self,
    ) -> Result<Option<Vec<FfiRecommendation>>, GlycoCdsError> {
        let (ticket, record) = self.session.lock()?.begin_generation()?;

        let result = self.engine.recommend(&record);

        let mut session = self.session.lock()?;
        let run = session.complete_generation(ticket, result)?;
        Ok(run.map(|r| r.recommendations().iter().cloned().map(Into::into).collect()))
    }

    /// Recommendations in the current run.
    pub fn current_recommendations(&self) -> Result<Vec<FfiRecommendation>, GlycoCdsError> {
        let session = self.session.lock()?;
        Ok(session
            .current_run()
            .map(|r| r.recommendations().iter().cloned().map(Into::into).collect())
            .unwrap_or_default())
    }

    /// Record a decision (`accept`, `reject`, `modify`) and persist its
    /// audit entry. The entry is stored before it joins the in-memory
    /// trail; a failed insert leaves the recommendation pending.
    pub fn apply_decision(
        &self,
        recommendation_id: String,
        action: String,
        dose: Option<String>,
        notes: Option<String>,
    ) -> Result<FfiRecommendation, GlycoCdsError> {
        let action = DecisionAction::parse(&action, dose, notes)?;

        let mut session = self.session.lock()?;
        let patient_id = session.record()?.patient().local_id.clone();
        let db = self.db.lock()?;
        let (updated, _) = session.apply_decision_with(&recommendation_id, &action, |entry| {
            db.insert_audit_entry(entry, Some(&patient_id))
        })?;
        Ok(updated.into())
    }

    /// Decision counts for the current run.
    pub fn decision_summary(&self) -> Result<FfiDecisionSummary, GlycoCdsError> {
        let session = self.session.lock()?;
        Ok(session.summary().into())
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    /// Audit entries, optionally filtered by status and inclusive date range.
    pub fn audit_entries(
        &self,
        status: Option<String>,
        from: Option<String>,
        to: Option<String>,
    ) -> Result<Vec<FfiAuditEntry>, GlycoCdsError> {
        let filter = parse_filter(status, from, to)?;
        let session = self.session.lock()?;
        Ok(session
            .audit()
            .filter(&filter)
            .into_iter()
            .cloned()
            .map(Into::into)
            .collect())
    }

    /// Export audit entries as CSV.
    pub fn export_audit_csv(
        &self,
        status: Option<String>,
        from: Option<String>,
        to: Option<String>,
    ) -> Result<String, GlycoCdsError> {
        let filter = parse_filter(status, from, to)?;
        let session = self.session.lock()?;
        Ok(session.export_audit_csv(&filter))
    }

    /// Export audit entries as JSON with chain metadata.
    pub fn export_audit_json(
        &self,
        status: Option<String>,
        from: Option<String>,
        to: Option<String>,
    ) -> Result<String, GlycoCdsError> {
        let filter = parse_filter(status, from, to)?;
        let session = self.session.lock()?;
        Ok(session.export_audit(&filter).to_json()?)
    }

    /// Verify the stored audit chain as it is now. Opening already refuses a
    /// broken chain, so `false` means the rows changed after open.
    pub fn verify_audit_chain(&self) -> Result<bool, GlycoCdsError> {
        let entries = self.db.lock()?.list_audit_entries()?;
        match AuditLog::from_entries(entries) {
            Ok(_) => Ok(true),
            Err(audit::AuditError::ChainBroken { index }) => {
                tracing::warn!(index, "Audit chain verification failed");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    pub fn dashboard_stats(&self) -> Result<FfiDashboardStats, GlycoCdsError> {
        let db = self.db.lock()?;
        Ok(db.dashboard_stats()?.into())
    }
}

fn overview(session: &ClinicalSession) -> Result<FfiPatientOverview, GlycoCdsError> {
    let record = session.record()?;
    let bands = session.classify()?;
    let metrics = record.metrics();

    Ok(FfiPatientOverview {
        patient: record.patient().clone().into(),
        metrics: FfiMetrics {
            age: metrics.age,
            bmi: Some(metrics.bmi),
            bmi_category: Some(metrics.bmi_category.as_str().to_string()),
            glucose_average: record.glucose_average(),
        },
        hba1c_band: bands.hba1c.to_string(),
        ckd_stage: bands.ckd.to_string(),
        glucose_target: bands.glucose_average.to_string(),
        hypoglycemia: record.patient().glucose.has_hypoglycemia(),
        off_target_slots: record
            .patient()
            .glucose
            .off_target_slots()
            .iter()
            .map(|s| s.label().to_string())
            .collect(),
    })
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient. Dates are `YYYY-MM-DD`; conditions are keys such as
/// `ckd` or `pregnancy`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub local_id: Option<String>,
    pub mr_number: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub hba1c: Option<f64>,
    pub egfr: Option<f64>,
    pub creatinine: Option<f64>,
    pub ldl: Option<f64>,
    pub urine_albumin: Option<f64>,
    pub glucose_before_breakfast: Option<f64>,
    pub glucose_before_lunch: Option<f64>,
    pub glucose_before_dinner: Option<f64>,
    pub glucose_before_bed: Option<f64>,
    pub conditions: Vec<String>,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            local_id: Some(patient.local_id),
            mr_number: patient.mr_number,
            first_name: patient.first_name,
            last_name: patient.last_name,
            date_of_birth: patient.date_of_birth.to_string(),
            gender: patient.gender.as_str().to_string(),
            weight_kg: patient.weight_kg,
            height_cm: patient.height_cm,
            hba1c: patient.labs.hba1c,
            egfr: patient.labs.egfr,
            creatinine: patient.labs.creatinine,
            ldl: patient.labs.ldl,
            urine_albumin: patient.labs.urine_albumin,
            glucose_before_breakfast: patient.glucose.before_breakfast,
            glucose_before_lunch: patient.glucose.before_lunch,
            glucose_before_dinner: patient.glucose.before_dinner,
            glucose_before_bed: patient.glucose.before_bed,
            conditions: patient
                .conditions
                .present()
                .iter()
                .map(|c| c.key().to_string())
                .collect(),
        }
    }
}

impl TryFrom<FfiPatient> for Patient {
    type Error = ValidationError;

    fn try_from(p: FfiPatient) -> Result<Self, Self::Error> {
        let mut patient = Patient::new(
            p.mr_number,
            p.first_name,
            p.last_name,
            parse_date("date_of_birth", &p.date_of_birth)?,
            p.gender.parse()?,
            p.weight_kg,
            p.height_cm,
        );
        if let Some(id) = p.local_id {
            patient.local_id = id;
        }

        patient.labs = LabPanel {
            hba1c: p.hba1c,
            egfr: p.egfr,
            creatinine: p.creatinine,
            ldl: p.ldl,
            urine_albumin: p.urine_albumin,
        };
        patient.glucose = GlucoseLog {
            before_breakfast: p.glucose_before_breakfast,
            before_lunch: p.glucose_before_lunch,
            before_dinner: p.glucose_before_dinner,
            before_bed: p.glucose_before_bed,
        };
        for key in &p.conditions {
            patient.conditions.set(key.parse::<Condition>()?, true);
        }
        Ok(patient)
    }
}

/// FFI-safe derived metrics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMetrics {
    pub age: u32,
    pub bmi: Option<f64>,
    pub bmi_category: Option<String>,
    pub glucose_average: u32,
}

/// FFI-safe classification result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBand {
    pub rule: String,
    pub band: String,
    pub severity: String,
}

impl FfiBand {
    fn new(rule: Rule, band: Band) -> Self {
        Self {
            rule: rule.as_str().to_string(),
            band: band.as_str().to_string(),
            severity: format!("{:?}", band.severity()).to_lowercase(),
        }
    }
}

/// FFI-safe view of the selected patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientOverview {
    pub patient: FfiPatient,
    pub metrics: FfiMetrics,
    pub hba1c_band: String,
    pub ckd_stage: String,
    pub glucose_target: String,
    pub hypoglycemia: bool,
    pub off_target_slots: Vec<String>,
}

/// FFI-safe recommendation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecommendation {
    pub id: String,
    pub medication: String,
    pub dose: String,
    pub recommended_dose: String,
    pub category: String,
    pub confidence: u8,
    pub confidence_level: String,
    pub status: String,
    pub advisory: String,
    pub guidelines: Vec<String>,
    pub warnings: Vec<String>,
    pub block_reason: Option<String>,
    pub modification_notes: Option<String>,
    pub decided_at: Option<String>,
}

impl From<Recommendation> for FfiRecommendation {
    fn from(rec: Recommendation) -> Self {
        Self {
            confidence_level: format!("{:?}", rec.confidence_level()).to_lowercase(),
            status: rec.status.as_str().to_string(),
            advisory: format!("{:?}", rec.advisory()).to_lowercase(),
            decided_at: rec.decided_at.map(|t| t.to_rfc3339()),
            id: rec.id,
            medication: rec.medication,
            dose: rec.dose,
            recommended_dose: rec.recommended_dose,
            category: rec.category,
            confidence: rec.confidence,
            guidelines: rec.guidelines,
            warnings: rec.warnings,
            block_reason: rec.block_reason,
            modification_notes: rec.modification_notes,
        }
    }
}

/// FFI-safe decision counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDecisionSummary {
    pub accepted: u32,
    pub modified: u32,
    pub rejected: u32,
    pub total: u32,
}

impl From<DecisionSummary> for FfiDecisionSummary {
    fn from(summary: DecisionSummary) -> Self {
        Self {
            accepted: summary.accepted,
            modified: summary.modified,
            rejected: summary.rejected,
            total: summary.total(),
        }
    }
}

/// FFI-safe audit entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAuditEntry {
    pub entry_id: String,
    pub request_id: String,
    pub timestamp: String,
    pub status: String,
    pub medications: String,
    pub confidence: u8,
    pub action: String,
    pub prev_hash: Option<String>,
    pub entry_hash: String,
}

impl From<AuditEntry> for FfiAuditEntry {
    fn from(entry: AuditEntry) -> Self {
        Self {
            entry_id: entry.entry_id().to_string(),
            request_id: entry.request_id().to_string(),
            timestamp: entry.timestamp().to_rfc3339(),
            status: entry.status().as_str().to_string(),
            medications: entry.medications().to_string(),
            confidence: entry.confidence(),
            action: entry.physician_action().to_string(),
            prev_hash: entry.prev_hash().map(str::to_string),
            entry_hash: entry.entry_hash().to_string(),
        }
    }
}

/// FFI-safe dashboard statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDashboardStats {
    pub total_patients: u32,
    pub above_hba1c_target: u32,
    pub total_decisions: u32,
    pub acceptance_rate: f64,
}

impl From<DashboardStats> for FfiDashboardStats {
    fn from(stats: DashboardStats) -> Self {
        Self {
            total_patients: stats.total_patients,
            above_hba1c_target: stats.above_hba1c_target,
            total_decisions: stats.total_decisions,
            acceptance_rate: stats.acceptance_rate,
        }
    }
}
