//! Audit log persistence and dashboard statistics.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DbError, DbResult};
use crate::models::{AuditEntry, AuditRecord, AuditStatus};

/// HbA1c (%) at or above which a patient counts as above target.
pub const HBA1C_TARGET: f64 = 7.0;

/// Dashboard summary counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DashboardStats {
    pub total_patients: u32,
    /// Patients whose latest HbA1c is at or above [`HBA1C_TARGET`]
    pub above_hba1c_target: u32,
    pub total_decisions: u32,
    pub approved: u32,
    pub modified: u32,
    pub rejected: u32,
    /// (approved + modified) / total decisions, 0.0 when there are none
    pub acceptance_rate: f64,
}

const AUDIT_COLUMNS: &str = r#"
    entry_id, request_id, recommendation_id, timestamp, status,
    medications, confidence, physician_action, prev_hash, entry_hash
"#;

impl Database {
    /// Append a sealed audit entry.
    pub fn insert_audit_entry(&self, entry: &AuditEntry, patient_id: Option<&str>) -> DbResult<()> {
        let record = entry.record();
        self.conn.execute(
            r#"
            INSERT INTO audit_log (
                entry_id, request_id, recommendation_id, patient_id, timestamp, status,
                medications, confidence, physician_action, prev_hash, entry_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                entry.entry_id(),
                record.request_id,
                record.recommendation_id,
                patient_id,
                record.timestamp.to_rfc3339(),
                record.status.as_str(),
                record.medications,
                record.confidence,
                record.physician_action,
                entry.prev_hash(),
                entry.entry_hash(),
            ],
        )?;
        Ok(())
    }

    /// All audit entries in append order.
    pub fn list_audit_entries(&self) -> DbResult<Vec<AuditEntry>> {
        let sql = format!("SELECT {} FROM audit_log ORDER BY seq", AUDIT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], AuditRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Audit entries for one patient in append order.
    pub fn list_audit_entries_for_patient(&self, patient_id: &str) -> DbResult<Vec<AuditEntry>> {
        let sql = format!(
            "SELECT {} FROM audit_log WHERE patient_id = ? ORDER BY seq",
            AUDIT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([patient_id], AuditRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.try_into()?);
        }
        Ok(entries)
    }

    /// Hash of the newest stored entry.
    pub fn audit_head_hash(&self) -> DbResult<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT entry_hash FROM audit_log ORDER BY seq DESC LIMIT 1")?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Summary counts for the dashboard.
    pub fn dashboard_stats(&self) -> DbResult<DashboardStats> {
        let total_patients = self.count_patients()?;
        let above: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE hba1c >= ?",
            [HBA1C_TARGET],
            |row| row.get(0),
        )?;

        let mut stats = DashboardStats {
            total_patients,
            above_hba1c_target: above as u32,
            ..Default::default()
        };

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM audit_log GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status, count) = row?;
            let count = count as u32;
            match string_to_status(&status)? {
                AuditStatus::Approved => stats.approved = count,
                AuditStatus::Modified => stats.modified = count,
                AuditStatus::Rejected => stats.rejected = count,
            }
        }

        stats.total_decisions = stats.approved + stats.modified + stats.rejected;
        if stats.total_decisions > 0 {
            stats.acceptance_rate =
                (stats.approved + stats.modified) as f64 / stats.total_decisions as f64;
        }
        Ok(stats)
    }
}

fn string_to_status(s: &str) -> Result<AuditStatus, DbError> {
    s.parse()
        .map_err(|_| DbError::Constraint(format!("Unknown audit status: {}", s)))
}

struct AuditRow {
    entry_id: String,
    request_id: String,
    recommendation_id: String,
    timestamp: String,
    status: String,
    medications: String,
    confidence: u8,
    physician_action: String,
    prev_hash: Option<String>,
    entry_hash: String,
}

impl AuditRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            entry_id: row.get(0)?,
            request_id: row.get(1)?,
            recommendation_id: row.get(2)?,
            timestamp: row.get(3)?,
            status: row.get(4)?,
            medications: row.get(5)?,
            confidence: row.get(6)?,
            physician_action: row.get(7)?,
            prev_hash: row.get(8)?,
            entry_hash: row.get(9)?,
        })
    }
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = DbError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| DbError::Constraint(format!("Invalid audit timestamp: {}", e)))?
            .with_timezone(&Utc);

        let record = AuditRecord {
            request_id: row.request_id,
            recommendation_id: row.recommendation_id,
            timestamp,
            status: string_to_status(&row.status)?,
            medications: row.medications,
            confidence: row.confidence,
            physician_action: row.physician_action,
        };

        Ok(AuditEntry::restore(
            row.entry_id,
            record,
            row.prev_hash,
            row.entry_hash,
        ))
    }
}
