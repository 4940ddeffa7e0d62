use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One biomarker test result. A patient may have several results for the
/// same marker over time; a null marker_result means "not assessed".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomarkerResult {
    pub biomarker_id: i64,
    pub patient_id: i64,
    pub test_date: Option<NaiveDate>,
    pub marker_name: String,
    pub marker_result: Option<String>,
    pub specimen_source: Option<String>,
}
