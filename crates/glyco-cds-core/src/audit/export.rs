//! Audit trail export (CSV and JSON).

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::{AuditFilter, AuditLog};
use crate::models::AuditEntry;

/// Fixed CSV header for audit exports.
pub const AUDIT_CSV_HEADER: &str = "request_id,timestamp,status,medications,confidence,action";

/// Current JSON export format version.
pub const AUDIT_FORMAT_VERSION: &str = "1.0";

/// Render entries as CSV, one row per entry.
pub fn audit_csv<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = &'a AuditEntry>,
{
    let mut csv = String::new();
    csv.push_str(AUDIT_CSV_HEADER);
    csv.push('\n');

    for entry in entries {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            escape_csv(entry.request_id()),
            entry.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true),
            entry.status(),
            escape_csv(entry.medications()),
            entry.confidence(),
            escape_csv(entry.physician_action()),
        ));
    }

    csv
}

/// JSON audit export with chain metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditExport {
    pub metadata: AuditExportMetadata,
    pub entries: Vec<AuditEntry>,
}

/// Audit export metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditExportMetadata {
    /// Export format version
    pub format_version: String,
    /// Export timestamp
    pub exported_at: String,
    /// Hash algorithm used for the chain
    pub hash_algorithm: String,
    /// Exporting system identifier
    pub system_id: Option<String>,
    /// Hash of the newest entry in the full log at export time
    pub head_hash: Option<String>,
    /// Number of exported entries
    pub entry_count: usize,
    /// Filter the entries were selected with
    pub filter: AuditFilter,
}

impl AuditExport {
    /// Export the entries of `log` matching `filter`.
    pub fn new(log: &AuditLog, filter: &AuditFilter, system_id: Option<String>) -> Self {
        let entries: Vec<AuditEntry> = log.filter(filter).into_iter().cloned().collect();
        Self {
            metadata: AuditExportMetadata {
                format_version: AUDIT_FORMAT_VERSION.to_string(),
                exported_at: Utc::now().to_rfc3339(),
                hash_algorithm: "SHA-256".to_string(),
                system_id,
                head_hash: log.head_hash().map(str::to_string),
                entry_count: entries.len(),
                filter: filter.clone(),
            },
            entries,
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV.
    pub fn to_csv(&self) -> String {
        audit_csv(&self.entries)
    }
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
