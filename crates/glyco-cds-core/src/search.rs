//! Patient search for the dashboard.
//!
//! Substring hits on name or MR number score 1.0; otherwise the best
//! Jaro-Winkler similarity against the full, first or last name is used,
//! and anything under [`FUZZY_THRESHOLD`] is dropped.

use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use crate::models::Patient;

/// Minimum fuzzy similarity for a name match.
pub const FUZZY_THRESHOLD: f64 = 0.85;

/// A patient with its match score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientMatch {
    pub patient: Patient,
    /// 0.0 - 1.0
    pub score: f64,
}

/// Score a patient against a query; `None` when it does not match.
///
/// A blank query matches everyone.
pub fn score_patient(patient: &Patient, query: &str) -> Option<f64> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Some(1.0);
    }

    let full_name = patient.full_name().to_lowercase();
    if full_name.contains(&query) || patient.mr_number.to_lowercase().contains(&query) {
        return Some(1.0);
    }

    let candidates = [
        full_name,
        patient.first_name.trim().to_lowercase(),
        patient.last_name.trim().to_lowercase(),
    ];
    let best = candidates
        .iter()
        .map(|c| jaro_winkler(&query, c))
        .fold(0.0_f64, f64::max);

    (best >= FUZZY_THRESHOLD).then_some(best)
}

/// Rank patients by score, best first. Ties keep input order.
pub fn rank_patients<I>(patients: I, query: &str, limit: usize) -> Vec<PatientMatch>
where
    I: IntoIterator<Item = Patient>,
{
    let mut matches: Vec<PatientMatch> = patients
        .into_iter()
        .filter_map(|patient| {
            score_patient(&patient, query).map(|score| PatientMatch { patient, score })
        })
        .collect();

    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches.truncate(limit);
    matches
}
