//! End-to-end clinical workflow tests: intake, classification, generation,
//! physician review and the persisted audit trail.

use chrono::NaiveDate;
use glyco_cds_core::audit::{AuditFilter, AuditLog, AUDIT_CSV_HEADER};
use glyco_cds_core::db::Database;
use glyco_cds_core::engine::{RecommendationSource, RuleEngine};
use glyco_cds_core::models::{
    Advisory, AuditStatus, Condition, DecisionAction, Gender, LabPanel, Patient,
    RecommendationStatus,
};
use glyco_cds_core::review::ReviewError;
use glyco_cds_core::session::{ClinicalSession, SessionError};
use glyco_cds_core::validation::ValidationError;
use glyco_cds_core::{
    open_database, open_database_in_memory, FfiPatient, GlycoCdsError, SessionConfig,
};

fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn config() -> SessionConfig {
    SessionConfig::default()
        .with_system_id("clinic-test")
        .with_reference_date(reference_date())
}

fn make_patient(mr: &str, first: &str, last: &str) -> Patient {
    let mut patient = Patient::new(
        mr.to_string(),
        first.to_string(),
        last.to_string(),
        NaiveDate::from_ymd_opt(1970, 7, 15).unwrap(),
        Gender::Male,
        80.0,
        175.0,
    );
    patient.labs = LabPanel::with_required(8.2, 75.0);
    patient
}

#[test]
fn test_reference_patient_workflow() {
    let engine = RuleEngine::new();
    let mut session = ClinicalSession::new(config());
    session.set_patient(make_patient("MR-2024-001", "John", "Doe")).unwrap();

    let metrics = session.calculate_metrics().unwrap();
    assert_eq!(metrics.age, 53);
    assert!((metrics.bmi - 26.1).abs() < 1e-9);
    assert_eq!(metrics.bmi_category.as_str(), "overweight");

    let bands = session.classify().unwrap();
    assert_eq!(bands.hba1c, "poor");
    assert_eq!(bands.ckd, "stage2");
    assert_eq!(bands.bmi, "overweight");
    assert!(bands.glucose_average.is_unknown());

    let run = session.generate_recommendations(&engine).unwrap();
    let recs = run.recommendations().to_vec();
    assert!(!recs.is_empty());
    assert!(recs.iter().all(|r| r.status == RecommendationStatus::Pending));
    assert_eq!(recs[0].medication, "Metformin");

    // Standing sulfonylurea warning surfaces as an advisory
    let glipizide = recs.iter().find(|r| r.medication == "Glipizide").unwrap();
    assert_eq!(glipizide.advisory(), Advisory::Warning);

    // Basal insulin needs HbA1c >= 9
    assert!(recs.iter().all(|r| r.medication != "Insulin glargine"));

    let (accepted, entry) = session
        .apply_decision(&recs[0].id, &DecisionAction::Accept)
        .unwrap();
    assert_eq!(accepted.status, RecommendationStatus::Accepted);
    assert_eq!(entry.status(), AuditStatus::Approved);
    assert_eq!(entry.request_id(), session.current_run().unwrap().run_id());

    let (modified, entry) = session
        .apply_decision(
            &recs[1].id,
            &DecisionAction::Modify {
                dose: "5mg once daily".into(),
                notes: "Start low given age".into(),
            },
        )
        .unwrap();
    assert_eq!(modified.dose, "5mg once daily");
    assert_eq!(modified.recommended_dose, recs[1].dose);
    assert!(entry.physician_action().contains("Start low given age"));

    session
        .apply_decision(&recs[2].id, &DecisionAction::Reject)
        .unwrap();

    let summary = session.summary();
    assert_eq!(
        (summary.accepted, summary.modified, summary.rejected),
        (1, 1, 1)
    );
    assert_eq!(session.audit().len(), 3);
    session.audit().verify().unwrap();
}

#[test]
fn test_decisions_are_final() {
    let engine = RuleEngine::new();
    let mut session = ClinicalSession::new(config());
    session.set_patient(make_patient("MR-2024-001", "John", "Doe")).unwrap();
    let id = session.generate_recommendations(&engine).unwrap().recommendations()[0]
        .id
        .clone();

    session.apply_decision(&id, &DecisionAction::Reject).unwrap();
    let err = session
        .apply_decision(&id, &DecisionAction::Accept)
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Review(ReviewError::InvalidTransition { .. })
    ));

    // Failed decisions leave no audit trace
    assert_eq!(session.audit().len(), 1);
}

#[test]
fn test_modify_requires_reason() {
    let engine = RuleEngine::new();
    let mut session = ClinicalSession::new(config());
    session.set_patient(make_patient("MR-2024-001", "John", "Doe")).unwrap();
    let id = session.generate_recommendations(&engine).unwrap().recommendations()[0]
        .id
        .clone();

    let err = session
        .apply_decision(
            &id,
            &DecisionAction::Modify {
                dose: "250mg".into(),
                notes: "   ".into(),
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Review(ReviewError::Validation(ValidationError::Missing { .. }))
    ));
    assert_eq!(
        session.current_run().unwrap().recommendations()[0].status,
        RecommendationStatus::Pending
    );
    assert!(session.audit().is_empty());
}

#[test]
fn test_pregnancy_blocks_oral_agents() {
    let engine = RuleEngine::new();
    let mut patient = make_patient("MR-2024-002", "Maria", "Santos");
    patient.gender = Gender::Female;
    patient.conditions.set(Condition::Pregnancy, true);
    patient.conditions.set(Condition::Hypertension, true);

    let mut session = ClinicalSession::new(config());
    session.set_patient(patient).unwrap();
    let recs = session
        .generate_recommendations(&engine)
        .unwrap()
        .recommendations()
        .to_vec();

    let metformin = recs.iter().find(|r| r.medication == "Metformin").unwrap();
    assert_eq!(metformin.status, RecommendationStatus::Blocked);
    assert_eq!(metformin.advisory(), Advisory::Blocked);
    assert!(metformin.block_reason.is_some());

    let lisinopril = recs.iter().find(|r| r.medication == "Lisinopril").unwrap();
    assert!(lisinopril.is_blocked());

    let insulin = recs
        .iter()
        .find(|r| r.medication == "Insulin glargine")
        .unwrap();
    assert_eq!(insulin.status, RecommendationStatus::Pending);

    // Blocked entries sort after every actionable one
    let first_blocked = recs.iter().position(|r| r.is_blocked()).unwrap();
    assert!(recs[first_blocked..].iter().all(|r| r.is_blocked()));

    // A blocked recommendation cannot be accepted
    let err = session
        .apply_decision(&metformin.id, &DecisionAction::Accept)
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::Review(ReviewError::InvalidTransition { .. })
    ));
}

#[test]
fn test_dm_flag_cannot_be_cleared() {
    let mut patient = make_patient("MR-2024-003", "Ana", "Lopez");
    patient.conditions.set(Condition::DiabetesMellitus, false);
    assert!(patient.conditions.diabetes_mellitus());
}

#[test]
fn test_generation_requires_complete_labs() {
    let engine = RuleEngine::new();
    let mut patient = make_patient("MR-2024-004", "Lee", "Chen");
    patient.labs.egfr = None;

    let mut session = ClinicalSession::new(config());
    session.set_patient(patient).unwrap();

    let err = session.generate_recommendations(&engine).unwrap_err();
    assert!(matches!(
        err,
        SessionError::Validation(ValidationError::Missing { field: "egfr" })
    ));
    assert!(!session.is_generating());
    assert!(session.current_run().is_none());
}

#[test]
fn test_last_call_wins_across_edits() {
    let engine = RuleEngine::new();
    let mut session = ClinicalSession::new(config());
    session.set_patient(make_patient("MR-2024-001", "John", "Doe")).unwrap();

    let (first_ticket, first_record) = session.begin_generation().unwrap();
    session
        .edit_patient(|p| p.labs.hba1c = Some(9.8))
        .unwrap();
    let (second_ticket, second_record) = session.begin_generation().unwrap();

    // The newer request resolves first
    let second = engine.recommend(&second_record);
    let installed = session.complete_generation(second_ticket, second).unwrap();
    assert!(installed.is_some());

    let first = engine.recommend(&first_record);
    assert!(session
        .complete_generation(first_ticket, first)
        .unwrap()
        .is_none());

    let run = session.current_run().unwrap();
    assert!(run
        .recommendations()
        .iter()
        .any(|r| r.medication == "Insulin glargine"));
}

#[test]
fn test_audit_csv_export() {
    let engine = RuleEngine::new();
    let mut session = ClinicalSession::new(config());
    session.set_patient(make_patient("MR-2024-001", "John", "Doe")).unwrap();
    let recs = session
        .generate_recommendations(&engine)
        .unwrap()
        .recommendations()
        .to_vec();

    session.apply_decision(&recs[0].id, &DecisionAction::Accept).unwrap();
    session.apply_decision(&recs[1].id, &DecisionAction::Reject).unwrap();

    let csv = session.export_audit_csv(&AuditFilter::default());
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], AUDIT_CSV_HEADER);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(",Approved,"));
    assert!(lines[1].contains("Metformin 500mg twice daily with meals"));
    assert!(lines[2].contains(",Rejected,"));

    let rejected_only = AuditFilter {
        status: Some(AuditStatus::Rejected),
        ..AuditFilter::default()
    };
    assert_eq!(session.export_audit_csv(&rejected_only).lines().count(), 2);

    let json = session.export_audit(&AuditFilter::default()).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["metadata"]["system_id"], "clinic-test");
    assert_eq!(value["metadata"]["hash_algorithm"], "SHA-256");
    assert_eq!(value["entries"].as_array().unwrap().len(), 2);
}

#[test]
fn test_audit_trail_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");
    let engine = RuleEngine::new();
    let patient = make_patient("MR-2024-001", "John", "Doe");
    let patient_id = patient.local_id.clone();

    {
        let db = Database::open(&path).unwrap();
        db.save_patient(&patient).unwrap();

        let mut session = ClinicalSession::new(config());
        session.set_patient(patient).unwrap();
        let recs = session
            .generate_recommendations(&engine)
            .unwrap()
            .recommendations()
            .to_vec();
        for rec in recs.iter().take(2) {
            let (_, entry) = session
                .apply_decision(&rec.id, &DecisionAction::Accept)
                .unwrap();
            db.insert_audit_entry(&entry, Some(&patient_id)).unwrap();
        }
    }

    let db = Database::open(&path).unwrap();
    let entries = db.list_audit_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(db.list_audit_entries_for_patient(&patient_id).unwrap().len(), 2);

    // Continue the chain in a new session
    let log = AuditLog::from_entries(entries).unwrap();
    assert_eq!(log.head_hash(), db.audit_head_hash().unwrap().as_deref());

    let stats = db.dashboard_stats().unwrap();
    assert_eq!(stats.total_patients, 1);
    assert_eq!(stats.above_hba1c_target, 1);
    assert_eq!(stats.total_decisions, 2);
    assert!((stats.acceptance_rate - 1.0).abs() < 1e-9);

    // Stored entries cannot be rewritten
    assert!(db
        .conn()
        .execute("UPDATE audit_log SET status = 'Rejected'", [])
        .is_err());
    assert!(db.conn().execute("DELETE FROM audit_log", []).is_err());
}

#[test]
fn test_patient_switch_discards_late_generation() {
    let engine = RuleEngine::new();
    let mut session = ClinicalSession::new(config());
    session.set_patient(make_patient("MR-2024-001", "Alice", "Moreau")).unwrap();
    let (ticket, alice) = session.begin_generation().unwrap();

    let mut bella = make_patient("MR-2024-002", "Bella", "Ortiz");
    bella.gender = Gender::Female;
    bella.conditions.set(Condition::Pregnancy, true);
    session.set_patient(bella).unwrap();

    // Alice's result lands after Bella is selected
    let late = engine.recommend(&alice);
    assert!(late.as_ref().unwrap().iter().any(|r| r.medication == "Metformin"
        && r.status == RecommendationStatus::Pending));
    assert!(session.complete_generation(ticket, late).unwrap().is_none());
    assert!(session.current_run().is_none());
    assert!(!session.is_generating());

    let run = session.generate_recommendations(&engine).unwrap();
    let metformin = run
        .recommendations()
        .iter()
        .find(|r| r.medication == "Metformin")
        .unwrap();
    assert_eq!(metformin.status, RecommendationStatus::Blocked);
}

#[test]
fn test_failed_audit_insert_keeps_chain_whole() {
    let db = Database::open_in_memory().unwrap();
    let patient = make_patient("MR-2024-001", "John", "Doe");
    let patient_id = patient.local_id.clone();

    let mut session = ClinicalSession::new(config());
    session.set_patient(patient.clone()).unwrap();
    let id = session
        .generate_recommendations(&RuleEngine::new())
        .unwrap()
        .recommendations()[0]
        .id
        .clone();

    // No patient row yet, so the foreign key rejects the insert
    let err = session
        .apply_decision_with(&id, &DecisionAction::Accept, |entry| {
            db.insert_audit_entry(entry, Some(&patient_id))
        })
        .unwrap_err();
    assert!(matches!(err, SessionError::Storage(_)));
    assert!(session.audit().is_empty());
    assert!(db.list_audit_entries().unwrap().is_empty());
    assert_eq!(
        session.current_run().unwrap().get(&id).unwrap().status,
        RecommendationStatus::Pending
    );

    db.save_patient(&patient).unwrap();
    session
        .apply_decision_with(&id, &DecisionAction::Accept, |entry| {
            db.insert_audit_entry(entry, Some(&patient_id))
        })
        .unwrap();

    let stored = AuditLog::from_entries(db.list_audit_entries().unwrap()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.head_hash(), session.audit().head_hash());
}

#[test]
fn test_reopen_refuses_tampered_chain() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db").to_string_lossy().into_owned();
    let config_json = r#"{"system_id": "ffi-test", "reference_date": "2024-06-01"}"#;

    {
        let core = open_database(path.clone(), Some(config_json.into())).unwrap();
        let saved = core.save_patient(ffi_patient()).unwrap();
        core.select_patient(saved.local_id.unwrap()).unwrap();
        let recs = core.generate_recommendations().unwrap().unwrap();
        for rec in recs.iter().take(2) {
            core.apply_decision(rec.id.clone(), "accept".into(), None, None)
                .unwrap();
        }
        assert!(core.verify_audit_chain().unwrap());
    }

    {
        let db = Database::open(&path).unwrap();
        db.conn()
            .execute_batch(
                "DROP TRIGGER audit_log_no_update;
                 UPDATE audit_log SET medications = 'Placebo' WHERE seq = 1;",
            )
            .unwrap();
    }

    let err = open_database(path, Some(config_json.into())).unwrap_err();
    assert!(matches!(err, GlycoCdsError::InvalidState(_)));
}

fn ffi_patient() -> FfiPatient {
    FfiPatient {
        local_id: None,
        mr_number: "MR-2024-010".into(),
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        date_of_birth: "1960-03-09".into(),
        gender: "female".into(),
        weight_kg: 70.0,
        height_cm: 165.0,
        hba1c: Some(7.6),
        egfr: Some(52.0),
        creatinine: Some(1.2),
        ldl: Some(130.0),
        urine_albumin: Some(45.0),
        glucose_before_breakfast: Some(160.0),
        glucose_before_lunch: Some(150.0),
        glucose_before_dinner: None,
        glucose_before_bed: Some(170.0),
        conditions: vec!["hypertension".into()],
    }
}

#[test]
fn test_ffi_round_trip() {
    let core = open_database_in_memory(Some(
        r#"{"system_id": "ffi-test", "reference_date": "2024-06-01"}"#.into(),
    ))
    .unwrap();

    let saved = core.save_patient(ffi_patient()).unwrap();
    let id = saved.local_id.clone().unwrap();
    assert!(saved.conditions.contains(&"hypertension".to_string()));

    let overview = core.select_patient(id.clone()).unwrap();
    assert_eq!(overview.metrics.age, 64);
    assert_eq!(overview.hba1c_band, "poor");
    assert_eq!(overview.ckd_stage, "stage3");
    assert_eq!(overview.metrics.glucose_average, 160);
    assert_eq!(overview.glucose_target, "elevated");

    let recs = core.generate_recommendations().unwrap().unwrap();
    assert!(recs.iter().any(|r| r.medication == "Lisinopril"));
    assert_eq!(core.current_recommendations().unwrap().len(), recs.len());

    core.apply_decision(recs[0].id.clone(), "accept".into(), None, None)
        .unwrap();
    let modified = core
        .apply_decision(
            recs[1].id.clone(),
            "modify".into(),
            Some("5mg once daily".into()),
            Some("Renal function".into()),
        )
        .unwrap();
    assert_eq!(modified.status, "modified");

    let err = core
        .apply_decision(recs[0].id.clone(), "reject".into(), None, None)
        .unwrap_err();
    assert!(matches!(err, GlycoCdsError::InvalidTransition(_)));

    let summary = core.decision_summary().unwrap();
    assert_eq!((summary.accepted, summary.modified, summary.total), (1, 1, 2));

    let entries = core.audit_entries(Some("modified".into()), None, None).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(core.verify_audit_chain().unwrap());

    let csv = core.export_audit_csv(None, None, None).unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(core
        .export_audit_json(None, None, None)
        .unwrap()
        .contains("ffi-test"));

    let stats = core.dashboard_stats().unwrap();
    assert_eq!(stats.total_patients, 1);
    assert_eq!(stats.total_decisions, 2);
}

#[test]
fn test_ffi_rejects_invalid_input() {
    let core = open_database_in_memory(None).unwrap();

    let mut patient = ffi_patient();
    patient.weight_kg = 500.0;
    assert!(matches!(
        core.save_patient(patient),
        Err(GlycoCdsError::ValidationError(_))
    ));

    let mut patient = ffi_patient();
    patient.date_of_birth = "03/09/1960".into();
    assert!(matches!(
        core.save_patient(patient),
        Err(GlycoCdsError::ValidationError(_))
    ));

    assert!(matches!(
        core.generate_recommendations(),
        Err(GlycoCdsError::InvalidState(_))
    ));
    assert!(matches!(
        core.select_patient("missing".into()),
        Err(GlycoCdsError::NotFound(_))
    ));
}
