use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::{params_from_iter, Connection};

use crate::db::StoreError;
use crate::models::enums::Sex;
use crate::models::Patient;

use super::placeholders;

pub fn patients_for(conn: &Connection, patient_ids: &[i64]) -> Result<Vec<Patient>, StoreError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT patient_id, first_name, last_name, date_of_birth, sex
         FROM patients WHERE patient_id IN ({}) ORDER BY patient_id",
        placeholders(patient_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(patient_ids.iter()), |row| {
        Ok(PatientRow {
            patient_id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            date_of_birth: row.get(3)?,
            sex: row.get(4)?,
        })
    })?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(patient_from_row(row?)?);
    }
    Ok(patients)
}

// Internal row type for Patient mapping
struct PatientRow {
    patient_id: i64,
    first_name: String,
    last_name: String,
    date_of_birth: Option<NaiveDate>,
    sex: String,
}

fn patient_from_row(row: PatientRow) -> Result<Patient, StoreError> {
    Ok(Patient {
        patient_id: row.patient_id,
        first_name: row.first_name,
        last_name: row.last_name,
        date_of_birth: row.date_of_birth,
        sex: Sex::from_str(&row.sex)?,
    })
}
