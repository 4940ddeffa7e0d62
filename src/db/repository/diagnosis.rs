use rusqlite::{params_from_iter, Connection, Row};

use crate::db::StoreError;
use crate::models::{Diagnosis, Staging};

use super::placeholders;

const DIAGNOSIS_COLUMNS: &str =
    "diagnosis_id, patient_id, diagnosis_date, icd10_code, histology, description";

const STAGING_COLUMNS: &str =
    "s.staging_id, s.diagnosis_id, s.staging_system, s.t_stage, s.n_stage, s.m_stage,
     s.overall_stage, s.staging_date";

/// All diagnoses in the snapshot, for cohort selection.
pub fn all_diagnoses(conn: &Connection) -> Result<Vec<Diagnosis>, StoreError> {
    let sql = format!("SELECT {DIAGNOSIS_COLUMNS} FROM diagnoses ORDER BY diagnosis_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], diagnosis_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn diagnoses_for(conn: &Connection, patient_ids: &[i64]) -> Result<Vec<Diagnosis>, StoreError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {DIAGNOSIS_COLUMNS} FROM diagnoses
         WHERE patient_id IN ({}) ORDER BY diagnosis_id",
        placeholders(patient_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(patient_ids.iter()), diagnosis_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// All staging records in the snapshot, for cohort selection.
pub fn all_stagings(conn: &Connection) -> Result<Vec<Staging>, StoreError> {
    let sql = format!("SELECT {STAGING_COLUMNS} FROM staging s ORDER BY s.staging_id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], staging_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// Staging records owned by any diagnosis of the given patients.
pub fn stagings_for(conn: &Connection, patient_ids: &[i64]) -> Result<Vec<Staging>, StoreError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT {STAGING_COLUMNS} FROM staging s
         JOIN diagnoses d ON d.diagnosis_id = s.diagnosis_id
         WHERE d.patient_id IN ({}) ORDER BY s.staging_id",
        placeholders(patient_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(patient_ids.iter()), staging_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn diagnosis_from_row(row: &Row<'_>) -> Result<Diagnosis, rusqlite::Error> {
    Ok(Diagnosis {
        diagnosis_id: row.get(0)?,
        patient_id: row.get(1)?,
        date: row.get(2)?,
        classification_code: row.get(3)?,
        histology: row.get(4)?,
        description: row.get(5)?,
    })
}

fn staging_from_row(row: &Row<'_>) -> Result<Staging, rusqlite::Error> {
    Ok(Staging {
        staging_id: row.get(0)?,
        diagnosis_id: row.get(1)?,
        system: row.get(2)?,
        t_stage: row.get(3)?,
        n_stage: row.get(4)?,
        m_stage: row.get(5)?,
        overall_stage: row.get(6)?,
        date: row.get(7)?,
    })
}
