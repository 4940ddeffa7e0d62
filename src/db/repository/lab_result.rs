use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};

use crate::db::StoreError;
use crate::models::LabResult;

use super::placeholders;

/// Lab results for a patient set, optionally bounded to one test name.
pub fn lab_results_for(
    conn: &Connection,
    patient_ids: &[i64],
    test_name: Option<&str>,
) -> Result<Vec<LabResult>, StoreError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut params: Vec<Value> = patient_ids.iter().map(|id| Value::Integer(*id)).collect();
    let sql = match test_name {
        Some(name) => {
            params.push(Value::Text(name.to_string()));
            format!(
                "SELECT lab_id, patient_id, test_name, value, unit, result_datetime,
                        reference_range_low, reference_range_high
                 FROM lab_results
                 WHERE patient_id IN ({}) AND lower(test_name) = lower(?)
                 ORDER BY lab_id",
                placeholders(patient_ids.len())
            )
        }
        None => format!(
            "SELECT lab_id, patient_id, test_name, value, unit, result_datetime,
                    reference_range_low, reference_range_high
             FROM lab_results WHERE patient_id IN ({}) ORDER BY lab_id",
            placeholders(patient_ids.len())
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params), lab_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn lab_from_row(row: &Row<'_>) -> Result<LabResult, rusqlite::Error> {
    Ok(LabResult {
        lab_id: row.get(0)?,
        patient_id: row.get(1)?,
        test_name: row.get(2)?,
        value: row.get(3)?,
        unit: row.get(4)?,
        timestamp: row.get(5)?,
        reference_low: row.get(6)?,
        reference_high: row.get(7)?,
    })
}
