use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::enums::TherapyStatus;

/// Intent-level medication record: one therapy course with a treatment line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TherapyIntent {
    pub medication_id: i64,
    pub patient_id: i64,
    pub drug_name: String,
    pub drug_class: Option<String>,
    pub start_date: Option<NaiveDate>,
    /// Open-ended course when absent.
    pub end_date: Option<NaiveDate>,
    /// 1 = first line.
    pub treatment_line: Option<i64>,
    pub status: TherapyStatus,
}

/// Event-level record: one actual drug delivery. Several events may share a
/// calendar date for a patient (co-administration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdministrationEvent {
    pub admin_id: i64,
    pub patient_id: i64,
    pub drug_name: String,
    pub timestamp: NaiveDateTime,
    pub dose: Option<f64>,
    pub unit: Option<String>,
}
