//! Patient database operations.

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Gender, Patient};
use crate::search::{rank_patients, PatientMatch};

const PATIENT_COLUMNS: &str = r#"
    local_id, mr_number, first_name, last_name, date_of_birth, gender,
    weight_kg, height_cm, labs, glucose, conditions, created_at, updated_at
"#;

impl Database {
    /// Insert a new patient. A duplicate MR number is a constraint violation.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        let labs_json = serde_json::to_string(&patient.labs)?;
        let glucose_json = serde_json::to_string(&patient.glucose)?;
        let conditions_json = serde_json::to_string(&patient.conditions)?;

        self.conn
            .execute(
                r#"
                INSERT INTO patients (
                    local_id, mr_number, first_name, last_name, date_of_birth, gender,
                    weight_kg, height_cm, labs, glucose, conditions, hba1c,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    patient.local_id,
                    patient.mr_number,
                    patient.first_name,
                    patient.last_name,
                    patient.date_of_birth.to_string(),
                    patient.gender.as_str(),
                    patient.weight_kg,
                    patient.height_cm,
                    labs_json,
                    glucose_json,
                    conditions_json,
                    patient.labs.hba1c,
                    patient.created_at,
                    patient.updated_at,
                ],
            )
            .map_err(|e| constraint_or(e, &patient.mr_number))?;
        Ok(())
    }

    /// Update an existing patient.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let labs_json = serde_json::to_string(&patient.labs)?;
        let glucose_json = serde_json::to_string(&patient.glucose)?;
        let conditions_json = serde_json::to_string(&patient.conditions)?;

        let rows_affected = self
            .conn
            .execute(
                r#"
                UPDATE patients SET
                    mr_number = ?2,
                    first_name = ?3,
                    last_name = ?4,
                    date_of_birth = ?5,
                    gender = ?6,
                    weight_kg = ?7,
                    height_cm = ?8,
                    labs = ?9,
                    glucose = ?10,
                    conditions = ?11,
                    hba1c = ?12,
                    updated_at = ?13
                WHERE local_id = ?1
                "#,
                params![
                    patient.local_id,
                    patient.mr_number,
                    patient.first_name,
                    patient.last_name,
                    patient.date_of_birth.to_string(),
                    patient.gender.as_str(),
                    patient.weight_kg,
                    patient.height_cm,
                    labs_json,
                    glucose_json,
                    conditions_json,
                    patient.labs.hba1c,
                    patient.updated_at,
                ],
            )
            .map_err(|e| constraint_or(e, &patient.mr_number))?;
        Ok(rows_affected > 0)
    }

    /// Insert the patient, or update it when the local ID already exists.
    pub fn save_patient(&self, patient: &Patient) -> DbResult<()> {
        if !self.update_patient(patient)? {
            self.insert_patient(patient)?;
        }
        Ok(())
    }

    /// Get a patient by local ID.
    pub fn get_patient(&self, local_id: &str) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {} FROM patients WHERE local_id = ?", PATIENT_COLUMNS);
        self.conn
            .query_row(&sql, [local_id], PatientRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a patient by MR number (case-insensitive).
    pub fn get_patient_by_mr_number(&self, mr_number: &str) -> DbResult<Option<Patient>> {
        let sql = format!("SELECT {} FROM patients WHERE mr_number = ?", PATIENT_COLUMNS);
        self.conn
            .query_row(&sql, [mr_number.trim()], PatientRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all patients by last then first name.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let sql = format!(
            "SELECT {} FROM patients ORDER BY last_name, first_name",
            PATIENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], PatientRow::from_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Search patients by name or MR number, ranked best first.
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<PatientMatch>> {
        Ok(rank_patients(self.list_patients()?, query, limit))
    }

    pub fn count_patients(&self) -> DbResult<u32> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
        Ok(count as u32)
    }
}

fn constraint_or(err: rusqlite::Error, mr_number: &str) -> DbError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
            DbError::Constraint(format!("MR number already registered: {}", mr_number))
        }
        _ => err.into(),
    }
}

struct PatientRow {
    local_id: String,
    mr_number: String,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    gender: String,
    weight_kg: f64,
    height_cm: f64,
    labs: String,
    glucose: String,
    conditions: String,
    created_at: String,
    updated_at: String,
}

impl PatientRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            local_id: row.get(0)?,
            mr_number: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            date_of_birth: row.get(4)?,
            gender: row.get(5)?,
            weight_kg: row.get(6)?,
            height_cm: row.get(7)?,
            labs: row.get(8)?,
            glucose: row.get(9)?,
            conditions: row.get(10)?,
            created_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    }
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let date_of_birth = NaiveDate::parse_from_str(&row.date_of_birth, "%Y-%m-%d")
            .map_err(|e| DbError::Constraint(format!("Invalid date_of_birth: {}", e)))?;
        let gender: Gender = row
            .gender
            .parse()
            .map_err(|e| DbError::Constraint(format!("Invalid gender: {}", e)))?;

        Ok(Patient {
            local_id: row.local_id,
            mr_number: row.mr_number,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth,
            gender,
            weight_kg: row.weight_kg,
            height_cm: row.height_cm,
            labs: serde_json::from_str(&row.labs)?,
            glucose: serde_json::from_str(&row.glucose)?,
            conditions: serde_json::from_str(&row.conditions)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Condition, GlucoseSlot, LabPanel};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn make_patient(mr: &str, first: &str, last: &str) -> Patient {
        Patient::new(
            mr.into(),
            first.into(),
            last.into(),
            NaiveDate::from_ymd_opt(1970, 7, 15).unwrap(),
            Gender::Male,
            80.0,
            175.0,
        )
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut patient = make_patient("MR-2024-001", "John", "Doe");
        patient.labs = LabPanel::with_required(8.2, 75.0);
        patient.glucose.set(GlucoseSlot::BeforeBed, Some(162.0));
        patient.conditions.set(Condition::Hypertension, true);

        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.local_id).unwrap().unwrap();
        assert_eq!(retrieved, patient);
        assert!(retrieved.conditions.contains(Condition::Hypertension));
        assert!(retrieved.conditions.diabetes_mellitus());
    }

    #[test]
    fn test_get_missing() {
        let db = setup_db();
        assert!(db.get_patient("nope").unwrap().is_none());
    }

    #[test]
    fn test_update_patient() {
        let db = setup_db();

        let mut patient = make_patient("MR-2024-001", "John", "Doe");
        db.insert_patient(&patient).unwrap();

        patient.weight_kg = 84.5;
        patient.labs.ldl = Some(131.0);
        patient.touch();
        assert!(db.update_patient(&patient).unwrap());

        let retrieved = db.get_patient(&patient.local_id).unwrap().unwrap();
        assert_eq!(retrieved.weight_kg, 84.5);
        assert_eq!(retrieved.labs.ldl, Some(131.0));
    }

    #[test]
    fn test_save_patient_upserts() {
        let db = setup_db();
        let mut patient = make_patient("MR-2024-001", "John", "Doe");
        db.save_patient(&patient).unwrap();
        patient.first_name = "Johnny".into();
        db.save_patient(&patient).unwrap();

        assert_eq!(db.count_patients().unwrap(), 1);
        let retrieved = db.get_patient(&patient.local_id).unwrap().unwrap();
        assert_eq!(retrieved.first_name, "Johnny");
    }

    #[test]
    fn test_duplicate_mr_number() {
        let db = setup_db();
        db.insert_patient(&make_patient("MR-2024-001", "John", "Doe")).unwrap();

        let err = db
            .insert_patient(&make_patient("mr-2024-001", "Jane", "Roe"))
            .unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }

    #[test]
    fn test_get_by_mr_number() {
        let db = setup_db();
        let patient = make_patient("MR-2024-00A", "John", "Doe");
        db.insert_patient(&patient).unwrap();

        let found = db.get_patient_by_mr_number("mr-2024-00a").unwrap().unwrap();
        assert_eq!(found.local_id, patient.local_id);
    }

    #[test]
    fn test_search_patients() {
        let db = setup_db();
        db.insert_patient(&make_patient("MR-2024-001", "Maria", "Santos")).unwrap();
        db.insert_patient(&make_patient("MR-2024-002", "John", "Doe")).unwrap();
        db.insert_patient(&make_patient("MR-2024-003", "Jonathan", "Doering")).unwrap();

        let results = db.search_patients("doe", 10).unwrap();
        assert_eq!(results.len(), 2);

        let results = db.search_patients("Santoz", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].patient.first_name, "Maria");

        // List is ordered by last name
        let all = db.list_patients().unwrap();
        assert_eq!(all[0].last_name, "Doe");
        assert_eq!(all[2].last_name, "Santos");
    }
}
