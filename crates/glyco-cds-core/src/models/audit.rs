//! Audit trail records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recommendation::{Recommendation, RecommendationStatus};
use crate::validation::ValidationError;

/// Final status recorded in the audit trail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditStatus {
    Approved,
    Modified,
    Rejected,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Approved => "Approved",
            AuditStatus::Modified => "Modified",
            AuditStatus::Rejected => "Rejected",
        }
    }

    /// Audit status for a decided recommendation; `None` while undecided.
    pub fn from_recommendation(status: RecommendationStatus) -> Option<Self> {
        match status {
            RecommendationStatus::Accepted => Some(AuditStatus::Approved),
            RecommendationStatus::Modified => Some(AuditStatus::Modified),
            RecommendationStatus::Rejected => Some(AuditStatus::Rejected),
            RecommendationStatus::Pending | RecommendationStatus::Blocked => None,
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approved" | "accepted" => Ok(AuditStatus::Approved),
            "modified" => Ok(AuditStatus::Modified),
            "rejected" => Ok(AuditStatus::Rejected),
            _ => Err(ValidationError::Malformed {
                field: "status",
                reason: format!("unknown audit status {:?}", s),
            }),
        }
    }
}

/// Audit payload before it is sealed into the chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    /// Generation run the decision belongs to
    pub request_id: String,
    /// Recommendation the decision was made on
    pub recommendation_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: AuditStatus,
    /// Medication and dose summary
    pub medications: String,
    pub confidence: u8,
    /// Human-readable physician action
    pub physician_action: String,
}

impl AuditRecord {
    /// Build the record for a decided recommendation.
    pub fn from_decision(request_id: &str, rec: &Recommendation) -> Option<Self> {
        let status = AuditStatus::from_recommendation(rec.status)?;
        let physician_action = match status {
            AuditStatus::Approved => "Accepted as recommended".to_string(),
            AuditStatus::Rejected => "Rejected".to_string(),
            AuditStatus::Modified => format!(
                "Modified from {} to {}: {}",
                rec.recommended_dose,
                rec.dose,
                rec.modification_notes.as_deref().unwrap_or_default()
            ),
        };

        Some(Self {
            request_id: request_id.to_string(),
            recommendation_id: rec.id.clone(),
            timestamp: rec.decided_at.unwrap_or_else(Utc::now),
            status,
            medications: rec.summary(),
            confidence: rec.confidence,
            physician_action,
        })
    }

    /// Serialize to canonical JSON for chain hashing.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Immutable, hash-chained audit entry.
///
/// Fields are private; an entry can only be produced by sealing an
/// [`AuditRecord`] (see `AuditLog::append`) or by loading a stored one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    entry_id: String,
    #[serde(flatten)]
    record: AuditRecord,
    prev_hash: Option<String>,
    entry_hash: String,
}

impl AuditEntry {
    pub(crate) fn sealed(record: AuditRecord, prev_hash: Option<String>, entry_hash: String) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            record,
            prev_hash,
            entry_hash,
        }
    }

    pub(crate) fn restore(
        entry_id: String,
        record: AuditRecord,
        prev_hash: Option<String>,
        entry_hash: String,
    ) -> Self {
        Self {
            entry_id,
            record,
            prev_hash,
            entry_hash,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn record(&self) -> &AuditRecord {
        &self.record
    }

    pub fn request_id(&self) -> &str {
        &self.record.request_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.record.timestamp
    }

    pub fn status(&self) -> AuditStatus {
        self.record.status
    }

    pub fn medications(&self) -> &str {
        &self.record.medications
    }

    pub fn confidence(&self) -> u8 {
        self.record.confidence
    }

    pub fn physician_action(&self) -> &str {
        &self.record.physician_action
    }

    pub fn prev_hash(&self) -> Option<&str> {
        self.prev_hash.as_deref()
    }

    pub fn entry_hash(&self) -> &str {
        &self.entry_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decided(status: RecommendationStatus) -> Recommendation {
        let mut rec = Recommendation::new(
            "Metformin".into(),
            "500mg twice daily".into(),
            "First-line".into(),
            92,
        );
        rec.status = status;
        rec.decided_at = Some(Utc::now());
        rec
    }

    #[test]
    fn test_record_from_accepted() {
        let rec = decided(RecommendationStatus::Accepted);
        let record = AuditRecord::from_decision("run-1", &rec).unwrap();
        assert_eq!(record.status, AuditStatus::Approved);
        assert_eq!(record.medications, "Metformin 500mg twice daily");
        assert_eq!(record.physician_action, "Accepted as recommended");
        assert_eq!(record.timestamp, rec.decided_at.unwrap());
    }

    #[test]
    fn test_record_from_modified() {
        let mut rec = decided(RecommendationStatus::Modified);
        rec.dose = "250mg twice daily".into();
        rec.modification_notes = Some("GI intolerance".into());
        let record = AuditRecord::from_decision("run-1", &rec).unwrap();
        assert_eq!(record.status, AuditStatus::Modified);
        assert_eq!(
            record.physician_action,
            "Modified from 500mg twice daily to 250mg twice daily: GI intolerance"
        );
    }

    #[test]
    fn test_no_record_for_undecided() {
        assert!(AuditRecord::from_decision("run-1", &decided(RecommendationStatus::Pending)).is_none());
        assert!(AuditRecord::from_decision("run-1", &decided(RecommendationStatus::Blocked)).is_none());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Approved".parse::<AuditStatus>().unwrap(), AuditStatus::Approved);
        assert_eq!("accepted".parse::<AuditStatus>().unwrap(), AuditStatus::Approved);
        assert!("pending".parse::<AuditStatus>().is_err());
    }
}
