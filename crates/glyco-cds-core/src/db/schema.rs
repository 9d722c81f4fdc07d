//! SQLite schema definition.

/// Complete database schema for glyco-cds.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    local_id TEXT PRIMARY KEY,
    mr_number TEXT NOT NULL UNIQUE COLLATE NOCASE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth TEXT NOT NULL,                 -- YYYY-MM-DD
    gender TEXT NOT NULL CHECK (gender IN ('Male', 'Female')),
    weight_kg REAL NOT NULL,
    height_cm REAL NOT NULL,
    labs TEXT NOT NULL DEFAULT '{}',             -- JSON LabPanel
    glucose TEXT NOT NULL DEFAULT '{}',          -- JSON GlucoseLog
    conditions TEXT NOT NULL DEFAULT '{}',       -- JSON condition flags
    hba1c REAL,                                  -- Denormalized for dashboard stats
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(last_name, first_name);

-- ============================================================================
-- Audit Log (append-only, hash-chained)
-- ============================================================================

CREATE TABLE IF NOT EXISTS audit_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id TEXT NOT NULL UNIQUE,
    request_id TEXT NOT NULL,
    recommendation_id TEXT NOT NULL,
    patient_id TEXT REFERENCES patients(local_id),
    timestamp TEXT NOT NULL,                     -- RFC 3339
    status TEXT NOT NULL CHECK (status IN ('Approved', 'Modified', 'Rejected')),
    medications TEXT NOT NULL,
    confidence INTEGER NOT NULL,
    physician_action TEXT NOT NULL,
    prev_hash TEXT,
    entry_hash TEXT NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS idx_audit_request ON audit_log(request_id);
CREATE INDEX IF NOT EXISTS idx_audit_patient ON audit_log(patient_id);

-- Entries are immutable once written
CREATE TRIGGER IF NOT EXISTS audit_log_no_update BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit_log entries are immutable');
END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_delete BEFORE DELETE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit_log entries are immutable');
END;
"#;
