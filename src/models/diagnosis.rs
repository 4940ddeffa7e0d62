use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    pub diagnosis_id: i64,
    pub patient_id: i64,
    pub date: Option<NaiveDate>,
    /// ICD-10-style classification code, e.g. "C34.1".
    pub classification_code: String,
    pub histology: Option<String>,
    pub description: Option<String>,
}

/// One staging assessment of a diagnosis. A diagnosis may be restaged;
/// the current stage is the most recent by date, ties broken by staging_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staging {
    pub staging_id: i64,
    pub diagnosis_id: i64,
    pub system: Option<String>,
    pub t_stage: Option<String>,
    pub n_stage: Option<String>,
    pub m_stage: Option<String>,
    pub overall_stage: Option<String>,
    pub date: Option<NaiveDate>,
}
