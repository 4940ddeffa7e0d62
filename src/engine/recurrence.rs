use chrono::{Duration, NaiveDateTime};

use crate::config::EngineConfig;
use crate::models::LabResult;

use super::types::{FactKind, RecurrenceRecord, SkippedFact};

#[derive(Debug, Default)]
pub struct SeriesEvaluation {
    pub records: Vec<RecurrenceRecord>,
    pub skipped: Vec<SkippedFact>,
}

/// Evaluate the two-point threshold-and-interval rule over one patient's
/// series for a single test. Each result is paired with its immediate
/// predecessor; the pair qualifies when both values reach twice their own
/// record's upper limit of normal and the interval is at least the
/// configured minimum. The threshold reported is the current record's, by
/// design. Results lacking a numeric value or timestamp are excluded with a
/// recorded reason before pairing, and the series re-indexes over what
/// remains. The first result of a series is never emitted.
pub fn evaluate_series(
    first_name: &str,
    last_name: &str,
    series: &[&LabResult],
    config: &EngineConfig,
) -> SeriesEvaluation {
    let mut skipped = Vec::new();
    let mut valid: Vec<(&LabResult, NaiveDateTime, f64)> = Vec::new();

    for lab in series {
        match (lab.timestamp, lab.value) {
            (Some(ts), Some(value)) => valid.push((lab, ts, value)),
            (None, _) => skipped.push(skip(lab, "missing timestamp")),
            (_, None) => skipped.push(skip(lab, "missing numeric value")),
        }
    }
    // Ascending by timestamp; ties resolved by lab_id so ordering is stable.
    valid.sort_by_key(|(lab, ts, _)| (*ts, lab.lab_id));

    let min_gap = Duration::days(config.recurrence_min_gap_days);
    let mut records = Vec::new();
    for pair in valid.windows(2) {
        let (prev, prev_ts, prev_value) = pair[0];
        let (current, current_ts, current_value) = pair[1];

        let uln = current.reference_high.unwrap_or(config.uln_fallback);
        let prev_uln = prev.reference_high.unwrap_or(config.uln_fallback);
        let threshold = 2.0 * uln;

        let meets_criteria = current_value >= threshold
            && prev_value >= 2.0 * prev_uln
            && current_ts.signed_duration_since(prev_ts) >= min_gap;

        records.push(RecurrenceRecord {
            patient_id: current.patient_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            test_name: current.test_name.clone(),
            result_datetime: current_ts,
            value: current_value,
            prev_result_datetime: prev_ts,
            prev_value,
            uln,
            threshold,
            meets_criteria,
        });
    }

    SeriesEvaluation { records, skipped }
}

fn skip(lab: &LabResult, reason: &str) -> SkippedFact {
    SkippedFact {
        kind: FactKind::LabResult,
        id: lab.lab_id,
        patient_id: lab.patient_id,
        reason: reason.into(),
    }
}
