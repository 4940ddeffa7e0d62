use rusqlite::{params_from_iter, Connection, Row};

use crate::db::StoreError;
use crate::models::BiomarkerResult;

use super::placeholders;

pub fn biomarkers_for(
    conn: &Connection,
    patient_ids: &[i64],
) -> Result<Vec<BiomarkerResult>, StoreError> {
    if patient_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT biomarker_id, patient_id, test_date, marker_name, marker_result, specimen_source
         FROM biomarkers WHERE patient_id IN ({}) ORDER BY biomarker_id",
        placeholders(patient_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(patient_ids.iter()), biomarker_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn biomarker_from_row(row: &Row<'_>) -> Result<BiomarkerResult, rusqlite::Error> {
    Ok(BiomarkerResult {
        biomarker_id: row.get(0)?,
        patient_id: row.get(1)?,
        test_date: row.get(2)?,
        marker_name: row.get(3)?,
        marker_result: row.get(4)?,
        specimen_source: row.get(5)?,
    })
}
