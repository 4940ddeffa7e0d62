use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One quantitative lab result. Text-only results carry no numeric value and
/// are skipped by the evaluators with a recorded reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabResult {
    pub lab_id: i64,
    pub patient_id: i64,
    pub test_name: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
    pub reference_low: Option<f64>,
    pub reference_high: Option<f64>,
}
