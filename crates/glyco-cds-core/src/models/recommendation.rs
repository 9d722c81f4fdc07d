//! Medication recommendation models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Lifecycle status of a recommendation within one run.
///
/// `Pending` is the only actionable state. `Accepted`, `Rejected` and
/// `Modified` are terminal. `Blocked` is assigned at generation time and is
/// never reachable through a decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Accepted,
    Rejected,
    Modified,
    Blocked,
}

impl RecommendationStatus {
    pub const ALL: [RecommendationStatus; 5] = [
        RecommendationStatus::Pending,
        RecommendationStatus::Accepted,
        RecommendationStatus::Rejected,
        RecommendationStatus::Modified,
        RecommendationStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Accepted => "accepted",
            RecommendationStatus::Rejected => "rejected",
            RecommendationStatus::Modified => "modified",
            RecommendationStatus::Blocked => "blocked",
        }
    }

    /// Whether a physician decision has been recorded.
    pub fn is_decided(&self) -> bool {
        matches!(
            self,
            RecommendationStatus::Accepted
                | RecommendationStatus::Rejected
                | RecommendationStatus::Modified
        )
    }

    pub fn is_actionable(&self) -> bool {
        matches!(self, RecommendationStatus::Pending)
    }
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecommendationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        RecommendationStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == lower)
            .ok_or_else(|| ValidationError::Malformed {
                field: "status",
                reason: format!("unknown status {:?}", s),
            })
    }
}

/// A physician decision on a pending recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DecisionAction {
    Accept,
    Reject,
    /// Replace the dose; `notes` is the mandatory reason for the audit trail.
    /// A blank `dose` keeps the recommended dose.
    Modify { dose: String, notes: String },
}

impl DecisionAction {
    pub fn name(&self) -> &'static str {
        match self {
            DecisionAction::Accept => "accept",
            DecisionAction::Reject => "reject",
            DecisionAction::Modify { .. } => "modify",
        }
    }

    /// Build an action from its name and optional modify payload.
    pub fn parse(
        action: &str,
        dose: Option<String>,
        notes: Option<String>,
    ) -> Result<Self, ValidationError> {
        match action.trim().to_lowercase().as_str() {
            "accept" | "accepted" => Ok(DecisionAction::Accept),
            "reject" | "rejected" => Ok(DecisionAction::Reject),
            "modify" | "modified" => Ok(DecisionAction::Modify {
                dose: dose.unwrap_or_default(),
                notes: notes.unwrap_or_default(),
            }),
            _ => Err(ValidationError::Malformed {
                field: "action",
                reason: format!("expected accept, reject or modify, got {:?}", action),
            }),
        }
    }
}

/// Confidence band used for display and audit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Moderate,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            ConfidenceLevel::High
        } else if score >= 60 {
            ConfidenceLevel::Moderate
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Generation-time safety view of a recommendation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    Approved,
    Warning,
    Blocked,
}

/// A single medication recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    /// Unique recommendation ID
    pub id: String,
    /// Medication name
    pub medication: String,
    /// Current dose instructions (replaced on modify)
    pub dose: String,
    /// Dose as originally recommended
    pub recommended_dose: String,
    /// Category label for grouping (e.g. "First-line")
    pub category: String,
    /// Confidence score (0-100)
    pub confidence: u8,
    pub status: RecommendationStatus,
    /// Guideline citations
    pub guidelines: Vec<String>,
    /// Warnings shown with the recommendation
    pub warnings: Vec<String>,
    /// Why the recommendation is blocked, if it is
    pub block_reason: Option<String>,
    /// Physician's reason for a modification
    pub modification_notes: Option<String>,
    /// When the decision was recorded
    pub decided_at: Option<DateTime<Utc>>,
}

impl Recommendation {
    /// Create a pending recommendation.
    pub fn new(medication: String, dose: String, category: String, confidence: u8) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            medication,
            recommended_dose: dose.clone(),
            dose,
            category,
            confidence: confidence.min(100),
            status: RecommendationStatus::Pending,
            guidelines: Vec::new(),
            warnings: Vec::new(),
            block_reason: None,
            modification_notes: None,
            decided_at: None,
        }
    }

    /// Mark as blocked at generation time.
    pub fn blocked(mut self, reason: impl Into<String>) -> Self {
        self.status = RecommendationStatus::Blocked;
        self.block_reason = Some(reason.into());
        self
    }

    pub fn is_blocked(&self) -> bool {
        self.status == RecommendationStatus::Blocked
    }

    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_score(self.confidence)
    }

    pub fn advisory(&self) -> Advisory {
        if self.is_blocked() {
            Advisory::Blocked
        } else if !self.warnings.is_empty() {
            Advisory::Warning
        } else {
            Advisory::Approved
        }
    }

    /// "Metformin 500mg twice daily".
    pub fn summary(&self) -> String {
        format!("{} {}", self.medication, self.dose)
    }

    /// Modification timestamp, when the decision was a modification.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            RecommendationStatus::Modified => self.decided_at,
            _ => None,
        }
    }

    /// Drop any recorded decision. Blocked recommendations stay blocked.
    pub fn reset(&mut self) {
        if !self.is_blocked() {
            self.status = RecommendationStatus::Pending;
        }
        self.dose = self.recommended_dose.clone();
        self.modification_notes = None;
        self.decided_at = None;
    }
}
