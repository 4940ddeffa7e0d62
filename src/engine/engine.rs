use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::models::LabResult;

use super::concordance;
use super::cycles;
use super::encounter::{group_encounters, Encounter};
use super::recurrence;
use super::rules::RuleSet;
use super::types::{
    ConcordanceCounts, ConcordanceReport, EngineError, FactSnapshot, RecurrenceReport,
    RegimenReport,
};

/// Runs the three analysis pipelines over an immutable fact snapshot.
/// Holds only validated rule tables and constants; every output is
/// reconstructible from the snapshot plus the tables, so runs are
/// repeatable per snapshot.
pub struct RuleEngine {
    rules: RuleSet,
    config: EngineConfig,
}

impl RuleEngine {
    /// Validates the rule tables before any patient is processed;
    /// configuration problems are fatal here, never mid-run.
    pub fn new(rules: RuleSet, config: EngineConfig) -> Result<Self, EngineError> {
        rules.validate()?;
        Ok(Self { rules, config })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Encounter grouping → regimen matching → cycle sequencing.
    pub fn run_regimen(&self, snapshot: &FactSnapshot) -> RegimenReport {
        let start = Instant::now();
        let signature = &self.rules.regimen.signature;
        let allowlist = signature.allowlist();

        let grouped = group_encounters(&snapshot.administrations, &allowlist);

        let mut by_patient: BTreeMap<i64, Vec<&Encounter>> = BTreeMap::new();
        for encounter in grouped
            .encounters
            .iter()
            .filter(|e| signature.matches(&e.drugs))
        {
            by_patient
                .entry(encounter.patient_id)
                .or_default()
                .push(encounter);
        }

        let mut cycles = Vec::new();
        for (patient_id, encounters) in &by_patient {
            let (first_name, last_name) = snapshot.patient_name(*patient_id);
            cycles.extend(cycles::sequence_cycles(&first_name, &last_name, encounters));
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            regimen = %signature.name,
            patients = by_patient.len(),
            cycles = cycles.len(),
            skipped = grouped.skipped.len(),
            processing_ms = processing_time_ms,
            "Regimen pipeline complete"
        );

        RegimenReport {
            regimen: signature.name.clone(),
            cycles,
            skipped: grouped.skipped,
            processing_time_ms,
        }
    }

    /// One concordance classification per snapshot patient.
    pub fn run_concordance(&self, snapshot: &FactSnapshot) -> ConcordanceReport {
        let start = Instant::now();
        let analysis = &self.rules.concordance;

        let mut counts = ConcordanceCounts::default();
        let mut records = Vec::with_capacity(snapshot.patients.len());
        for patient in &snapshot.patients {
            let record = concordance::evaluate_patient(snapshot, analysis, patient.patient_id);
            counts.record(&record.status);
            records.push(record);
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            patients = records.len(),
            matched = counts.matched,
            mismatch = counts.mismatch,
            unclassified = counts.unclassified,
            processing_ms = processing_time_ms,
            "Concordance pipeline complete"
        );

        ConcordanceReport {
            records,
            counts,
            processing_time_ms,
        }
    }

    /// Threshold-recurrence evaluation of the configured test per patient.
    pub fn run_recurrence(&self, snapshot: &FactSnapshot) -> RecurrenceReport {
        let start = Instant::now();
        let test_name = &self.rules.recurrence.test_name;

        let mut records = Vec::new();
        let mut skipped = Vec::new();
        for patient in &snapshot.patients {
            let series: Vec<&LabResult> = snapshot
                .lab_results
                .iter()
                .filter(|l| {
                    l.patient_id == patient.patient_id
                        && l.test_name.eq_ignore_ascii_case(test_name)
                })
                .collect();
            let mut evaluation = recurrence::evaluate_series(
                &patient.first_name,
                &patient.last_name,
                &series,
                &self.config,
            );
            records.append(&mut evaluation.records);
            skipped.append(&mut evaluation.skipped);
        }

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            test = %test_name,
            pairs = records.len(),
            flagged = records.iter().filter(|r| r.meets_criteria).count(),
            skipped = skipped.len(),
            processing_ms = processing_time_ms,
            "Recurrence pipeline complete"
        );

        RecurrenceReport {
            test_name: test_name.clone(),
            records,
            skipped,
            processing_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::models::enums::{Sex, TherapyStatus};
    use crate::models::{AdministrationEvent, BiomarkerResult, Patient, TherapyIntent};

    use super::*;

    fn engine() -> RuleEngine {
        RuleEngine::new(RuleSet::default_oncology(), EngineConfig::default()).unwrap()
    }

    fn patient(id: i64, first: &str, last: &str) -> Patient {
        Patient {
            patient_id: id,
            first_name: first.into(),
            last_name: last.into(),
            date_of_birth: None,
            sex: Sex::Unknown,
        }
    }

    fn admin(id: i64, patient: i64, drug: &str, date: (i32, u32, u32)) -> AdministrationEvent {
        AdministrationEvent {
            admin_id: id,
            patient_id: patient,
            drug_name: drug.into(),
            timestamp: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            dose: None,
            unit: None,
        }
    }

    fn ca125(id: i64, patient: i64, value: f64, day: u32) -> LabResult {
        LabResult {
            lab_id: id,
            patient_id: patient,
            test_name: "CA-125".into(),
            value: Some(value),
            unit: Some("U/mL".into()),
            timestamp: Some(
                NaiveDate::from_ymd_opt(2023, 5, day)
                    .unwrap()
                    .and_hms_opt(8, 0, 0)
                    .unwrap(),
            ),
            reference_low: None,
            reference_high: Some(35.0),
        }
    }

    /// Two full FOLFOX days 14 days apart, no irinotecan: cycles 1 and 2.
    #[test]
    fn regimen_pipeline_end_to_end() {
        let snapshot = FactSnapshot {
            patients: vec![patient(1, "Ana", "Silva")],
            administrations: vec![
                admin(1, 1, "Leucovorin", (2023, 1, 5)),
                admin(2, 1, "5-FU", (2023, 1, 5)),
                admin(3, 1, "Oxaliplatin", (2023, 1, 5)),
                admin(4, 1, "Leucovorin", (2023, 1, 19)),
                admin(5, 1, "5-FU", (2023, 1, 19)),
                admin(6, 1, "Oxaliplatin", (2023, 1, 19)),
            ],
            ..Default::default()
        };
        let report = engine().run_regimen(&snapshot);

        assert_eq!(report.regimen, "FOLFOX");
        assert_eq!(report.cycles.len(), 2);
        assert_eq!(report.cycles[0].cycle_number, 1);
        assert_eq!(report.cycles[0].days_since_previous, None);
        assert_eq!(report.cycles[0].first_name, "Ana");
        assert_eq!(report.cycles[1].cycle_number, 2);
        assert_eq!(report.cycles[1].days_since_previous, Some(14));
    }

    /// An irinotecan co-administration disqualifies the day.
    #[test]
    fn regimen_pipeline_excludes_contaminated_encounter() {
        let snapshot = FactSnapshot {
            patients: vec![patient(1, "Ana", "Silva")],
            administrations: vec![
                admin(1, 1, "Leucovorin", (2023, 1, 5)),
                admin(2, 1, "5-FU", (2023, 1, 5)),
                admin(3, 1, "Oxaliplatin", (2023, 1, 5)),
                admin(4, 1, "Irinotecan", (2023, 1, 5)),
            ],
            ..Default::default()
        };
        let report = engine().run_regimen(&snapshot);
        assert!(report.cycles.is_empty());
    }

    #[test]
    fn concordance_pipeline_end_to_end() {
        let snapshot = FactSnapshot {
            patients: vec![patient(2, "Ben", "Okafor")],
            biomarkers: vec![BiomarkerResult {
                biomarker_id: 1,
                patient_id: 2,
                test_date: NaiveDate::from_ymd_opt(2023, 1, 10),
                marker_name: "EGFR Mutation".into(),
                marker_result: Some("L858R".into()),
                specimen_source: None,
            }],
            therapies: vec![TherapyIntent {
                medication_id: 1,
                patient_id: 2,
                drug_name: "Osimertinib".into(),
                drug_class: Some("Targeted Therapy".into()),
                start_date: NaiveDate::from_ymd_opt(2023, 2, 1),
                end_date: None,
                treatment_line: Some(1),
                status: TherapyStatus::Active,
            }],
            ..Default::default()
        };
        let report = engine().run_concordance(&snapshot);

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].status.to_string(), "Matched (EGFR)");
        assert_eq!(report.counts.matched, 1);
        assert_eq!(report.counts.total(), 1);
    }

    #[test]
    fn recurrence_pipeline_end_to_end() {
        let snapshot = FactSnapshot {
            patients: vec![patient(3, "Pia", "Novak")],
            lab_results: vec![ca125(1, 3, 80.0, 1), ca125(2, 3, 90.0, 11)],
            ..Default::default()
        };
        let report = engine().run_recurrence(&snapshot);

        assert_eq!(report.test_name, "CA-125");
        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert_eq!(record.threshold, 70.0);
        assert!(record.meets_criteria);
        assert_eq!(record.first_name, "Pia");
    }

    /// An empty cohort flows through every pipeline as empty output.
    #[test]
    fn empty_snapshot_produces_empty_reports() {
        let snapshot = FactSnapshot::default();
        let engine = engine();

        assert!(engine.run_regimen(&snapshot).cycles.is_empty());
        assert!(engine.run_concordance(&snapshot).records.is_empty());
        assert!(engine.run_recurrence(&snapshot).records.is_empty());
    }

    #[test]
    fn invalid_rules_rejected_at_construction() {
        let mut rules = RuleSet::default_oncology();
        rules.concordance.rules.clear();
        let result = RuleEngine::new(rules, EngineConfig::default());
        assert!(matches!(result, Err(EngineError::InvalidRule { .. })));
    }
}
