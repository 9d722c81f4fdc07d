//! Physician review of generated recommendations.
//!
//! Pipeline: Generation → Run (all pending) → Accept / Modify / Reject → Audit
//!
//! Each recommendation moves from `Pending` to exactly one terminal state
//! within a run. Starting a new run discards every prior decision.

mod board;

pub use board::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DecisionAction, Recommendation, RecommendationStatus};
use crate::validation::{require_text, ValidationError};

/// Review errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReviewError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cannot {action} recommendation {id}: status is {from}")]
    InvalidTransition {
        id: String,
        from: RecommendationStatus,
        action: &'static str,
    },

    #[error("Recommendation not found: {0}")]
    NotFound(String),

    #[error("No active recommendation run")]
    NoActiveRun,
}

pub type ReviewResult<T> = Result<T, ReviewError>;

/// Decision counts across a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DecisionSummary {
    pub accepted: u32,
    pub modified: u32,
    pub rejected: u32,
}

impl DecisionSummary {
    pub fn total(&self) -> u32 {
        self.accepted + self.modified + self.rejected
    }
}

/// Count decisions in a recommendation set. Always computed on demand.
pub fn summarize(recommendations: &[Recommendation]) -> DecisionSummary {
    recommendations
        .iter()
        .fold(DecisionSummary::default(), |mut acc, rec| {
            match rec.status {
                RecommendationStatus::Accepted => acc.accepted += 1,
                RecommendationStatus::Modified => acc.modified += 1,
                RecommendationStatus::Rejected => acc.rejected += 1,
                RecommendationStatus::Pending | RecommendationStatus::Blocked => {}
            }
            acc
        })
}

/// The recommendations produced by one generation, with their decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationRun {
    run_id: String,
    generated_at: DateTime<Utc>,
    recommendations: Vec<Recommendation>,
}

impl RecommendationRun {
    /// Start a run. Any decision carried by the input is discarded.
    pub fn new(mut recommendations: Vec<Recommendation>) -> Self {
        for rec in &mut recommendations {
            rec.reset();
        }
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            recommendations,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn get(&self, id: &str) -> Option<&Recommendation> {
        self.recommendations.iter().find(|r| r.id == id)
    }

    pub fn accept(&mut self, id: &str) -> ReviewResult<&Recommendation> {
        self.transition(id, "accept", |rec| {
            rec.status = RecommendationStatus::Accepted;
        })
    }

    pub fn reject(&mut self, id: &str) -> ReviewResult<&Recommendation> {
        self.transition(id, "reject", |rec| {
            rec.status = RecommendationStatus::Rejected;
        })
    }

    /// Replace the dose and record the reason.
    ///
    /// The reason is checked before the transition, so a blank reason is a
    /// validation error regardless of the recommendation's status.
    pub fn modify(&mut self, id: &str, new_dose: &str, reason: &str) -> ReviewResult<&Recommendation> {
        require_text("modification_notes", reason, 1)?;
        let dose = new_dose.trim().to_string();
        let notes = reason.trim().to_string();

        self.transition(id, "modify", move |rec| {
            if !dose.is_empty() {
                rec.dose = dose;
            }
            rec.modification_notes = Some(notes);
            rec.status = RecommendationStatus::Modified;
        })
    }

    /// Apply a decision and return the updated recommendation.
    pub fn apply(&mut self, id: &str, action: &DecisionAction) -> ReviewResult<Recommendation> {
        let rec = match action {
            DecisionAction::Accept => self.accept(id)?,
            DecisionAction::Reject => self.reject(id)?,
            DecisionAction::Modify { dose, notes } => self.modify(id, dose, notes)?,
        };
        Ok(rec.clone())
    }

    pub fn summary(&self) -> DecisionSummary {
        summarize(&self.recommendations)
    }

    pub fn pending_count(&self) -> usize {
        self.recommendations
            .iter()
            .filter(|r| r.status.is_actionable())
            .count()
    }

    /// Every actionable recommendation has a decision.
    pub fn all_decided(&self) -> bool {
        self.pending_count() == 0
    }

    /// Recommendations grouped by category, in first-appearance order.
    pub fn grouped_by_category(&self) -> Vec<(&str, Vec<&Recommendation>)> {
        let mut groups: Vec<(&str, Vec<&Recommendation>)> = Vec::new();
        for rec in &self.recommendations {
            let category = if rec.category.trim().is_empty() {
                "Other"
            } else {
                rec.category.as_str()
            };
            match groups.iter_mut().find(|(c, _)| *c == category) {
                Some((_, recs)) => recs.push(rec),
                None => groups.push((category, vec![rec])),
            }
        }
        groups
    }

    fn transition<F>(&mut self, id: &str, action: &'static str, apply: F) -> ReviewResult<&Recommendation>
    where
        F: FnOnce(&mut Recommendation),
    {
        let rec = self
            .recommendations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ReviewError::NotFound(id.to_string()))?;

        if !rec.status.is_actionable() {
            return Err(ReviewError::InvalidTransition {
                id: id.to_string(),
                from: rec.status,
                action,
            });
        }

        apply(rec);
        rec.decided_at = Some(Utc::now());
        tracing::debug!(recommendation = %rec.id, status = %rec.status, "Recorded decision");
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run() -> RecommendationRun {
        let metformin = Recommendation::new(
            "Metformin".into(),
            "500mg twice daily".into(),
            "First-line".into(),
            92,
        );
        let empagliflozin = Recommendation::new(
            "Empagliflozin".into(),
            "10mg daily".into(),
            "Cardio-renal".into(),
            85,
        );
        let glipizide = Recommendation::new(
            "Glipizide".into(),
            "5mg daily".into(),
            "First-line".into(),
            61,
        )
        .blocked("Pregnancy");
        RecommendationRun::new(vec![metformin, empagliflozin, glipizide])
    }

    fn id(run: &RecommendationRun, idx: usize) -> String {
        run.recommendations()[idx].id.clone()
    }

    #[test]
    fn test_accept_records_timestamp() {
        let mut run = make_run();
        let rec_id = id(&run, 0);
        let rec = run.accept(&rec_id).unwrap();
        assert_eq!(rec.status, RecommendationStatus::Accepted);
        assert!(rec.decided_at.is_some());
    }

    #[test]
    fn test_terminal_states_reject_further_actions() {
        let mut run = make_run();
        let rec_id = id(&run, 0);
        run.accept(&rec_id).unwrap();

        assert!(matches!(
            run.accept(&rec_id),
            Err(ReviewError::InvalidTransition { from: RecommendationStatus::Accepted, .. })
        ));
        assert!(matches!(
            run.reject(&rec_id),
            Err(ReviewError::InvalidTransition { .. })
        ));
        assert!(matches!(
            run.modify(&rec_id, "250mg", "GI upset"),
            Err(ReviewError::InvalidTransition { action: "modify", .. })
        ));
    }

    #[test]
    fn test_modify_requires_reason() {
        let mut run = make_run();
        let rec_id = id(&run, 1);
        assert!(matches!(
            run.modify(&rec_id, "25mg daily", ""),
            Err(ReviewError::Validation(ValidationError::Missing { field: "modification_notes" }))
        ));
        assert!(matches!(
            run.modify(&rec_id, "25mg daily", "   "),
            Err(ReviewError::Validation(_))
        ));
        // Still pending after the failed attempt
        assert_eq!(run.get(&rec_id).unwrap().status, RecommendationStatus::Pending);
    }

    #[test]
    fn test_blank_reason_fails_validation_even_when_terminal() {
        let mut run = make_run();
        let rec_id = id(&run, 0);
        run.accept(&rec_id).unwrap();
        assert!(matches!(
            run.modify(&rec_id, "250mg", ""),
            Err(ReviewError::Validation(_))
        ));
    }

    #[test]
    fn test_modify_replaces_dose() {
        let mut run = make_run();
        let rec_id = id(&run, 1);
        let rec = run.modify(&rec_id, "25mg daily", "Better A1c reduction needed").unwrap();
        assert_eq!(rec.status, RecommendationStatus::Modified);
        assert_eq!(rec.dose, "25mg daily");
        assert_eq!(rec.recommended_dose, "10mg daily");
        assert_eq!(rec.modification_notes.as_deref(), Some("Better A1c reduction needed"));
        assert!(rec.modified_at().is_some());
    }

    #[test]
    fn test_modify_blank_dose_keeps_original() {
        let mut run = make_run();
        let rec_id = id(&run, 1);
        let rec = run.modify(&rec_id, " ", "Timing change").unwrap();
        assert_eq!(rec.dose, "10mg daily");
    }

    #[test]
    fn test_blocked_not_actionable() {
        let mut run = make_run();
        let rec_id = id(&run, 2);
        assert!(matches!(
            run.accept(&rec_id),
            Err(ReviewError::InvalidTransition { from: RecommendationStatus::Blocked, .. })
        ));
        assert!(matches!(
            run.apply(&rec_id, &DecisionAction::Reject),
            Err(ReviewError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_unknown_id() {
        let mut run = make_run();
        assert_eq!(
            run.accept("missing").unwrap_err(),
            ReviewError::NotFound("missing".into())
        );
    }

    #[test]
    fn test_summary_recomputed() {
        let mut run = make_run();
        assert_eq!(run.summary(), DecisionSummary::default());
        assert_eq!(run.pending_count(), 2);

        let (a, b) = (id(&run, 0), id(&run, 1));
        run.apply(&a, &DecisionAction::Reject).unwrap();
        run.apply(
            &b,
            &DecisionAction::Modify {
                dose: "25mg".into(),
                notes: "Titrate".into(),
            },
        )
        .unwrap();

        let summary = run.summary();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.modified, 1);
        assert_eq!(summary.accepted, 0);
        assert_eq!(summary.total(), 2);
        assert!(run.all_decided());
    }

    #[test]
    fn test_new_run_discards_prior_decisions() {
        let mut run = make_run();
        let rec_id = id(&run, 0);
        run.accept(&rec_id).unwrap();

        let next = RecommendationRun::new(run.recommendations().to_vec());
        assert_ne!(next.run_id(), run.run_id());
        assert_eq!(next.get(&rec_id).unwrap().status, RecommendationStatus::Pending);
        assert!(next.recommendations()[2].is_blocked());
        assert_eq!(next.summary().total(), 0);
    }

    #[test]
    fn test_grouped_by_category() {
        let run = make_run();
        let groups = run.grouped_by_category();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "First-line");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "Cardio-renal");
    }
}
