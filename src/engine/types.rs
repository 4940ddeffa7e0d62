use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::db::StoreError;
use crate::models::{
    AdministrationEvent, BiomarkerResult, Diagnosis, LabResult, Patient, Staging, TherapyIntent,
};

// ---------------------------------------------------------------------------
// FactSnapshot — pre-fetched data for one pipeline run
// ---------------------------------------------------------------------------

/// Immutable per-run data snapshot. The caller fetches all facts for the
/// cohort from the store, builds this snapshot, and passes it to the
/// pipelines. This keeps rule evaluation pure and testable; nothing is read
/// or cached across snapshots.
#[derive(Debug, Clone, Default)]
pub struct FactSnapshot {
    pub patients: Vec<Patient>,
    pub diagnoses: Vec<Diagnosis>,
    pub stagings: Vec<Staging>,
    pub biomarkers: Vec<BiomarkerResult>,
    pub therapies: Vec<TherapyIntent>,
    pub administrations: Vec<AdministrationEvent>,
    pub lab_results: Vec<LabResult>,
}

impl FactSnapshot {
    pub fn patient(&self, patient_id: i64) -> Option<&Patient> {
        self.patients.iter().find(|p| p.patient_id == patient_id)
    }

    /// Demographics for output records; empty strings when the patient row
    /// is absent from the snapshot.
    pub fn patient_name(&self, patient_id: i64) -> (String, String) {
        match self.patient(patient_id) {
            Some(p) => (p.first_name.clone(), p.last_name.clone()),
            None => (String::new(), String::new()),
        }
    }

    /// The current result for one marker: latest by test_date, ties broken
    /// by highest biomarker_id. Superseded results are ignored, not removed.
    pub fn current_biomarker(&self, patient_id: i64, marker_name: &str) -> Option<&BiomarkerResult> {
        self.biomarkers
            .iter()
            .filter(|b| {
                b.patient_id == patient_id && b.marker_name.eq_ignore_ascii_case(marker_name)
            })
            .max_by_key(|b| (b.test_date, b.biomarker_id))
    }

    /// The qualifying first-line therapy: treatment_line 1 with a received
    /// status. When several qualify, the earliest start_date wins, ties by
    /// lowest medication_id; undated records sort last.
    pub fn first_line_therapy(&self, patient_id: i64) -> Option<&TherapyIntent> {
        self.therapies
            .iter()
            .filter(|t| {
                t.patient_id == patient_id
                    && t.treatment_line == Some(1)
                    && t.status.is_received()
            })
            .min_by_key(|t| (t.start_date.is_none(), t.start_date, t.medication_id))
    }
}

// ---------------------------------------------------------------------------
// SkippedFact — malformed-fact bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    Administration,
    LabResult,
}

/// A fact excluded from its pipeline's input, with the reason recorded.
/// Skips are carried on the report; they never abort the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFact {
    pub kind: FactKind,
    pub id: i64,
    pub patient_id: i64,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Pipeline output records
// ---------------------------------------------------------------------------

/// One regimen cycle: ordinal rank of a regimen-positive encounter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleRecord {
    pub patient_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub cycle_start_date: NaiveDate,
    /// None for the first cycle (nothing precedes it).
    pub days_since_previous: Option<i64>,
    pub cycle_number: u32,
}

/// A rule-table marker with the patient's current result, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerValue {
    pub marker: String,
    pub result: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcordanceRecord {
    pub patient_id: i64,
    pub first_name: String,
    pub last_name: String,
    /// One entry per rule-table marker, in priority order.
    pub markers: Vec<MarkerValue>,
    pub first_line_therapy: Option<String>,
    pub first_line_drug_class: Option<String>,
    pub first_line_start: Option<NaiveDate>,
    pub status: ConcordanceStatus,
}

/// One evaluable (current, previous) pair from a lab series.
#[derive(Debug, Clone, Serialize)]
pub struct RecurrenceRecord {
    pub patient_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub test_name: String,
    pub result_datetime: NaiveDateTime,
    pub value: f64,
    pub prev_result_datetime: NaiveDateTime,
    pub prev_value: f64,
    /// The current record's reference_high, or the configured fallback.
    pub uln: f64,
    /// 2 × uln.
    pub threshold: f64,
    pub meets_criteria: bool,
}

// ---------------------------------------------------------------------------
// ConcordanceStatus
// ---------------------------------------------------------------------------

/// The six-way concordance classification. Unclassified signals a gap in
/// the rule table, never a patient-data error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConcordanceStatus {
    Matched { marker: String },
    Mismatch { marker: String },
    PotentialMismatch { marker: String },
    AppropriateNonTargeted,
    NoActionableNoTherapy,
    Unclassified,
}

impl fmt::Display for ConcordanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched { marker } => write!(f, "Matched ({marker})"),
            Self::Mismatch { marker } => write!(f, "Mismatch ({marker})"),
            Self::PotentialMismatch { marker } => write!(f, "Potential Mismatch ({marker})"),
            Self::AppropriateNonTargeted => write!(f, "Appropriate Non-Targeted"),
            Self::NoActionableNoTherapy => write!(f, "No Actionable Marker / No Therapy"),
            Self::Unclassified => write!(f, "Unclassified"),
        }
    }
}

impl Serialize for ConcordanceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RegimenReport {
    pub regimen: String,
    pub cycles: Vec<CycleRecord>,
    pub skipped: Vec<SkippedFact>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConcordanceReport {
    pub records: Vec<ConcordanceRecord>,
    pub counts: ConcordanceCounts,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurrenceReport {
    pub test_name: String,
    pub records: Vec<RecurrenceRecord>,
    pub skipped: Vec<SkippedFact>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConcordanceCounts {
    pub matched: usize,
    pub mismatch: usize,
    pub potential_mismatch: usize,
    pub non_targeted: usize,
    pub no_therapy: usize,
    pub unclassified: usize,
}

impl ConcordanceCounts {
    pub fn total(&self) -> usize {
        self.matched
            + self.mismatch
            + self.potential_mismatch
            + self.non_targeted
            + self.no_therapy
            + self.unclassified
    }

    pub fn record(&mut self, status: &ConcordanceStatus) {
        match status {
            ConcordanceStatus::Matched { .. } => self.matched += 1,
            ConcordanceStatus::Mismatch { .. } => self.mismatch += 1,
            ConcordanceStatus::PotentialMismatch { .. } => self.potential_mismatch += 1,
            ConcordanceStatus::AppropriateNonTargeted => self.non_targeted += 1,
            ConcordanceStatus::NoActionableNoTherapy => self.no_therapy += 1,
            ConcordanceStatus::Unclassified => self.unclassified += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Fact store error: {0}")]
    Store(#[from] StoreError),

    #[error("Rule table load failed ({0}): {1}")]
    RuleTableLoad(String, String),

    #[error("Rule table parse failed ({0}): {1}")]
    RuleTableParse(String, String),

    #[error("Invalid rule configuration ({rule}): {reason}")]
    InvalidRule { rule: String, reason: String },
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::models::enums::{Sex, TherapyStatus};

    use super::*;

    fn biomarker(id: i64, patient: i64, date: Option<(i32, u32, u32)>, result: &str) -> BiomarkerResult {
        BiomarkerResult {
            biomarker_id: id,
            patient_id: patient,
            test_date: date.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            marker_name: "EGFR Mutation".into(),
            marker_result: Some(result.into()),
            specimen_source: None,
        }
    }

    fn therapy(id: i64, patient: i64, line: Option<i64>, status: TherapyStatus, start: Option<(i32, u32, u32)>) -> TherapyIntent {
        TherapyIntent {
            medication_id: id,
            patient_id: patient,
            drug_name: "Osimertinib".into(),
            drug_class: Some("Targeted Therapy".into()),
            start_date: start.map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            end_date: None,
            treatment_line: line,
            status,
        }
    }

    #[test]
    fn current_biomarker_latest_date_wins() {
        let snapshot = FactSnapshot {
            biomarkers: vec![
                biomarker(1, 7, Some((2023, 1, 1)), "Negative"),
                biomarker(2, 7, Some((2023, 6, 1)), "L858R"),
            ],
            ..Default::default()
        };
        let current = snapshot.current_biomarker(7, "EGFR Mutation").unwrap();
        assert_eq!(current.biomarker_id, 2);
    }

    #[test]
    fn current_biomarker_date_tie_breaks_by_id() {
        let snapshot = FactSnapshot {
            biomarkers: vec![
                biomarker(5, 7, Some((2023, 1, 1)), "Negative"),
                biomarker(3, 7, Some((2023, 1, 1)), "L858R"),
            ],
            ..Default::default()
        };
        let current = snapshot.current_biomarker(7, "EGFR Mutation").unwrap();
        assert_eq!(current.biomarker_id, 5, "Highest id wins a same-day tie");
    }

    #[test]
    fn current_biomarker_marker_match_is_case_insensitive() {
        let snapshot = FactSnapshot {
            biomarkers: vec![biomarker(1, 7, Some((2023, 1, 1)), "L858R")],
            ..Default::default()
        };
        assert!(snapshot.current_biomarker(7, "egfr mutation").is_some());
        assert!(snapshot.current_biomarker(7, "ALK Fusion").is_none());
    }

    #[test]
    fn first_line_therapy_requires_received_status() {
        let snapshot = FactSnapshot {
            therapies: vec![
                therapy(1, 7, Some(1), TherapyStatus::Stopped, Some((2023, 1, 1))),
                therapy(2, 7, Some(1), TherapyStatus::Planned, Some((2023, 1, 1))),
            ],
            ..Default::default()
        };
        assert!(snapshot.first_line_therapy(7).is_none());
    }

    #[test]
    fn first_line_therapy_earliest_start_wins() {
        let snapshot = FactSnapshot {
            therapies: vec![
                therapy(1, 7, Some(1), TherapyStatus::Active, Some((2023, 3, 1))),
                therapy(2, 7, Some(1), TherapyStatus::Completed, Some((2023, 1, 1))),
                therapy(3, 7, Some(1), TherapyStatus::Active, None),
                therapy(4, 7, Some(2), TherapyStatus::Active, Some((2022, 1, 1))),
            ],
            ..Default::default()
        };
        let first = snapshot.first_line_therapy(7).unwrap();
        assert_eq!(first.medication_id, 2, "Earliest dated first-line therapy wins");
    }

    #[test]
    fn patient_name_defaults_to_empty() {
        let snapshot = FactSnapshot {
            patients: vec![Patient {
                patient_id: 1,
                first_name: "Ana".into(),
                last_name: "Silva".into(),
                date_of_birth: None,
                sex: Sex::Female,
            }],
            ..Default::default()
        };
        assert_eq!(snapshot.patient_name(1), ("Ana".into(), "Silva".into()));
        assert_eq!(snapshot.patient_name(99), (String::new(), String::new()));
    }

    #[test]
    fn concordance_counts_total() {
        let mut counts = ConcordanceCounts::default();
        counts.record(&ConcordanceStatus::Matched { marker: "EGFR".into() });
        counts.record(&ConcordanceStatus::Unclassified);
        counts.record(&ConcordanceStatus::NoActionableNoTherapy);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.matched, 1);
        assert_eq!(counts.unclassified, 1);
    }

    #[test]
    fn concordance_status_display() {
        let status = ConcordanceStatus::Matched { marker: "EGFR".into() };
        assert_eq!(status.to_string(), "Matched (EGFR)");
        assert_eq!(
            ConcordanceStatus::PotentialMismatch { marker: "ALK".into() }.to_string(),
            "Potential Mismatch (ALK)"
        );
        assert_eq!(
            ConcordanceStatus::NoActionableNoTherapy.to_string(),
            "No Actionable Marker / No Therapy"
        );
    }

    #[test]
    fn concordance_status_serializes_as_display_string() {
        let status = ConcordanceStatus::Mismatch { marker: "ROS1".into() };
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"Mismatch (ROS1)\"");
    }
}
