use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::engine::types::FactSnapshot;

use super::StoreError;

mod biomarker;
mod diagnosis;
mod lab_result;
mod medication;
mod patient;

pub use biomarker::biomarkers_for;
pub use diagnosis::{all_diagnoses, all_stagings, diagnoses_for, stagings_for};
pub use lab_result::lab_results_for;
pub use medication::{administrations_for, therapies_for};
pub use patient::patients_for;

/// Comma-joined `?` placeholders for an `IN (...)` list.
pub(crate) fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}

/// Field predicates bounding what a snapshot fetch pulls from the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotFilter<'a> {
    /// Restrict administrations to these (lowercase) drug names.
    pub drug_allowlist: Option<&'a BTreeSet<String>>,
    /// Restrict lab results to one test name (case-insensitive).
    pub lab_test_name: Option<&'a str>,
}

/// Fetch every fact collection for a patient set into an immutable snapshot.
/// The engine imposes its own ordering downstream; rows arrive in id order.
pub fn fetch_snapshot(
    conn: &Connection,
    patient_ids: &[i64],
    filter: SnapshotFilter<'_>,
) -> Result<FactSnapshot, StoreError> {
    Ok(FactSnapshot {
        patients: patients_for(conn, patient_ids)?,
        diagnoses: diagnoses_for(conn, patient_ids)?,
        stagings: stagings_for(conn, patient_ids)?,
        biomarkers: biomarkers_for(conn, patient_ids)?,
        therapies: therapies_for(conn, patient_ids)?,
        administrations: administrations_for(conn, patient_ids, filter.drug_allowlist)?,
        lab_results: lab_results_for(conn, patient_ids, filter.lab_test_name)?,
    })
}
