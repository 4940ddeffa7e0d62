use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use crate::db::StoreError;
use crate::models::enums::TherapyStatus;
use crate::models::{AdministrationEvent, TherapyIntent};

use super::placeholders;

pub fn therapies_for(
    conn: &Connection,
    patient_ids: &[i64],
) -> Result<Vec<TherapyIntent>, StoreError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT medication_id, patient_id, drug_name, drug_class, start_date, end_date,
                treatment_line, status
         FROM medications WHERE patient_id IN ({}) ORDER BY medication_id",
        placeholders(patient_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(patient_ids.iter()), |row| {
        Ok(TherapyRow {
            medication_id: row.get(0)?,
            patient_id: row.get(1)?,
            drug_name: row.get(2)?,
            drug_class: row.get(3)?,
            start_date: row.get(4)?,
            end_date: row.get(5)?,
            treatment_line: row.get(6)?,
            status: row.get(7)?,
        })
    })?;

    let mut therapies = Vec::new();
    for row in rows {
        therapies.push(therapy_from_row(row?)?);
    }
    Ok(therapies)
}

/// Administration events for a patient set, optionally bounded to a
/// lowercase drug-name allowlist (the union of the signature drug sets).
pub fn administrations_for(
    conn: &Connection,
    patient_ids: &[i64],
    drug_allowlist: Option<&BTreeSet<String>>,
) -> Result<Vec<AdministrationEvent>, StoreError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    if drug_allowlist.is_some_and(|list| list.is_empty()) {
        return Ok(Vec::new());
    }

    let mut params: Vec<Value> = patient_ids.iter().map(|id| Value::Integer(*id)).collect();
    let sql = match drug_allowlist {
        Some(list) => {
            params.extend(list.iter().map(|d| Value::Text(d.to_lowercase())));
            format!(
                "SELECT admin_id, patient_id, drug_name, admin_datetime, dose, dose_unit
                 FROM medication_administrations
                 WHERE patient_id IN ({}) AND lower(drug_name) IN ({})
                 ORDER BY admin_id",
                placeholders(patient_ids.len()),
                placeholders(list.len())
            )
        }
        None => format!(
            "SELECT admin_id, patient_id, drug_name, admin_datetime, dose, dose_unit
             FROM medication_administrations
             WHERE patient_id IN ({}) ORDER BY admin_id",
            placeholders(patient_ids.len())
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| {
        Ok(AdministrationEvent {
            admin_id: row.get(0)?,
            patient_id: row.get(1)?,
            drug_name: row.get(2)?,
            timestamp: row.get::<_, NaiveDateTime>(3)?,
            dose: row.get(4)?,
            unit: row.get(5)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

// Internal row type for TherapyIntent mapping
struct TherapyRow {
    medication_id: i64,
    patient_id: i64,
    drug_name: String,
    drug_class: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    treatment_line: Option<i64>,
    status: String,
}

fn therapy_from_row(row: TherapyRow) -> Result<TherapyIntent, StoreError> {
    Ok(TherapyIntent {
        medication_id: row.medication_id,
        patient_id: row.patient_id,
        drug_name: row.drug_name,
        drug_class: row.drug_class,
        start_date: row.start_date,
        end_date: row.end_date,
        treatment_line: row.treatment_line,
        status: TherapyStatus::from_str(&row.status)?,
    })
}
