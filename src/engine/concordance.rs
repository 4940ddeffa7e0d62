use crate::models::TherapyIntent;

use super::rules::ConcordanceAnalysis;
use super::types::{ConcordanceRecord, ConcordanceStatus, FactSnapshot, MarkerValue};

/// Classify one patient's biomarker profile against the first-line therapy.
/// Rules are evaluated in table order; the first positive marker determines
/// the category. One record is always produced per cohort patient; absent
/// biomarker rows are ordinary missing data, not a skip.
pub fn evaluate_patient(
    snapshot: &FactSnapshot,
    analysis: &ConcordanceAnalysis,
    patient_id: i64,
) -> ConcordanceRecord {
    let (first_name, last_name) = snapshot.patient_name(patient_id);
    let therapy = snapshot.first_line_therapy(patient_id);

    let markers: Vec<MarkerValue> = analysis
        .rules
        .iter()
        .map(|rule| MarkerValue {
            marker: rule.marker_name.clone(),
            result: snapshot
                .current_biomarker(patient_id, &rule.marker_name)
                .and_then(|b| b.marker_result.clone()),
        })
        .collect();

    let positive = analysis.rules.iter().find(|rule| {
        snapshot
            .current_biomarker(patient_id, &rule.marker_name)
            .and_then(|b| b.marker_result.as_deref())
            .is_some_and(|result| rule.is_positive(result))
    });

    let status = match (positive, therapy) {
        (Some(rule), Some(t)) if rule.is_concordant(&t.drug_name) => ConcordanceStatus::Matched {
            marker: rule.label.clone(),
        },
        (Some(rule), Some(_)) => ConcordanceStatus::Mismatch {
            marker: rule.label.clone(),
        },
        (Some(rule), None) => ConcordanceStatus::PotentialMismatch {
            marker: rule.label.clone(),
        },
        (None, Some(t)) if class_is_non_targeted(t, analysis) => {
            ConcordanceStatus::AppropriateNonTargeted
        }
        (None, None) => ConcordanceStatus::NoActionableNoTherapy,
        (None, Some(_)) => ConcordanceStatus::Unclassified,
    };

    ConcordanceRecord {
        patient_id,
        first_name,
        last_name,
        markers,
        first_line_therapy: therapy.map(|t| t.drug_name.clone()),
        first_line_drug_class: therapy.and_then(|t| t.drug_class.clone()),
        first_line_start: therapy.and_then(|t| t.start_date),
        status,
    }
}

fn class_is_non_targeted(therapy: &TherapyIntent, analysis: &ConcordanceAnalysis) -> bool {
    therapy.drug_class.as_deref().is_some_and(|class| {
        analysis
            .non_targeted_classes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(class))
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::models::enums::TherapyStatus;
    use crate::models::BiomarkerResult;
    use crate::engine::rules::RuleSet;

    use super::*;

    fn marker(id: i64, patient: i64, name: &str, result: Option<&str>, date: (i32, u32, u32)) -> BiomarkerResult {
        BiomarkerResult {
            biomarker_id: id,
            patient_id: patient,
            test_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            marker_name: name.into(),
            marker_result: result.map(String::from),
            specimen_source: Some("Tissue".into()),
        }
    }

    fn therapy(id: i64, patient: i64, drug: &str, class: &str, status: TherapyStatus) -> TherapyIntent {
        TherapyIntent {
            medication_id: id,
            patient_id: patient,
            drug_name: drug.into(),
            drug_class: Some(class.into()),
            start_date: NaiveDate::from_ymd_opt(2023, 2, 1),
            end_date: None,
            treatment_line: Some(1),
            status,
        }
    }

    fn analysis() -> ConcordanceAnalysis {
        RuleSet::default_oncology().concordance
    }

    #[test]
    fn egfr_positive_with_osimertinib_is_matched() {
        let snapshot = FactSnapshot {
            biomarkers: vec![marker(1, 2, "EGFR Mutation", Some("L858R"), (2023, 1, 10))],
            therapies: vec![therapy(1, 2, "Osimertinib", "Targeted Therapy", TherapyStatus::Active)],
            ..Default::default()
        };
        let record = evaluate_patient(&snapshot, &analysis(), 2);

        assert_eq!(record.status, ConcordanceStatus::Matched { marker: "EGFR".into() });
        assert_eq!(record.status.to_string(), "Matched (EGFR)");
        assert_eq!(record.first_line_therapy.as_deref(), Some("Osimertinib"));
    }

    #[test]
    fn egfr_positive_with_wrong_drug_is_mismatch() {
        let snapshot = FactSnapshot {
            biomarkers: vec![marker(1, 2, "EGFR Mutation", Some("Exon 19 Deletion"), (2023, 1, 10))],
            therapies: vec![therapy(1, 2, "Carboplatin", "Chemotherapy", TherapyStatus::Active)],
            ..Default::default()
        };
        let record = evaluate_patient(&snapshot, &analysis(), 2);
        assert_eq!(record.status, ConcordanceStatus::Mismatch { marker: "EGFR".into() });
    }

    #[test]
    fn positive_marker_without_therapy_is_potential_mismatch() {
        let snapshot = FactSnapshot {
            biomarkers: vec![marker(1, 2, "ALK Fusion", Some("Positive"), (2023, 1, 10))],
            ..Default::default()
        };
        let record = evaluate_patient(&snapshot, &analysis(), 2);
        assert_eq!(
            record.status,
            ConcordanceStatus::PotentialMismatch { marker: "ALK".into() }
        );
    }

    #[test]
    fn stopped_therapy_is_treated_as_absent() {
        let snapshot = FactSnapshot {
            biomarkers: vec![marker(1, 2, "EGFR Mutation", Some("L858R"), (2023, 1, 10))],
            therapies: vec![therapy(1, 2, "Osimertinib", "Targeted Therapy", TherapyStatus::Stopped)],
            ..Default::default()
        };
        let record = evaluate_patient(&snapshot, &analysis(), 2);
        assert_eq!(
            record.status,
            ConcordanceStatus::PotentialMismatch { marker: "EGFR".into() }
        );
        assert_eq!(record.first_line_therapy, None);
    }

    #[test]
    fn priority_order_prefers_earlier_rule() {
        // Positive on both EGFR and ALK: EGFR is higher priority.
        let snapshot = FactSnapshot {
            biomarkers: vec![
                marker(1, 2, "ALK Fusion", Some("Positive"), (2023, 1, 10)),
                marker(2, 2, "EGFR Mutation", Some("L858R"), (2023, 1, 10)),
            ],
            therapies: vec![therapy(1, 2, "Alectinib", "Targeted Therapy", TherapyStatus::Active)],
            ..Default::default()
        };
        let record = evaluate_patient(&snapshot, &analysis(), 2);
        assert_eq!(record.status, ConcordanceStatus::Mismatch { marker: "EGFR".into() });
    }

    #[test]
    fn superseded_positive_result_is_ignored() {
        // EGFR was positive in January but the June retest is negative.
        let snapshot = FactSnapshot {
            biomarkers: vec![
                marker(1, 2, "EGFR Mutation", Some("L858R"), (2023, 1, 10)),
                marker(2, 2, "EGFR Mutation", Some("Negative"), (2023, 6, 10)),
            ],
            ..Default::default()
        };
        let record = evaluate_patient(&snapshot, &analysis(), 2);
        assert_eq!(record.status, ConcordanceStatus::NoActionableNoTherapy);
    }

    #[test]
    fn no_marker_with_chemotherapy_is_appropriate_non_targeted() {
        let snapshot = FactSnapshot {
            therapies: vec![therapy(1, 2, "Carboplatin", "Chemotherapy", TherapyStatus::Completed)],
            ..Default::default()
        };
        let record = evaluate_patient(&snapshot, &analysis(), 2);
        assert_eq!(record.status, ConcordanceStatus::AppropriateNonTargeted);
    }

    #[test]
    fn no_marker_no_therapy() {
        let snapshot = FactSnapshot::default();
        let record = evaluate_patient(&snapshot, &analysis(), 2);
        assert_eq!(record.status, ConcordanceStatus::NoActionableNoTherapy);
        assert_eq!(record.markers.len(), 4);
        assert!(record.markers.iter().all(|m| m.result.is_none()));
    }

    #[test]
    fn unapproved_class_without_marker_is_unclassified() {
        let snapshot = FactSnapshot {
            therapies: vec![therapy(1, 2, "Bevacizumab", "Anti-VEGF", TherapyStatus::Active)],
            ..Default::default()
        };
        let record = evaluate_patient(&snapshot, &analysis(), 2);
        assert_eq!(record.status, ConcordanceStatus::Unclassified);
    }

    #[test]
    fn record_carries_all_rule_markers_in_priority_order() {
        let snapshot = FactSnapshot {
            biomarkers: vec![marker(1, 2, "ROS1 Fusion", Some("Negative"), (2023, 1, 10))],
            ..Default::default()
        };
        let record = evaluate_patient(&snapshot, &analysis(), 2);
        let names: Vec<&str> = record.markers.iter().map(|m| m.marker.as_str()).collect();
        assert_eq!(
            names,
            vec!["EGFR Mutation", "ALK Fusion", "ROS1 Fusion", "BRAF Mutation"]
        );
        assert_eq!(record.markers[2].result.as_deref(), Some("Negative"));
    }
}
