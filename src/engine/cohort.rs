use std::collections::BTreeSet;

use crate::models::{Diagnosis, Staging};

use super::rules::CohortCriteria;

/// Select the distinct patients with at least one diagnosis satisfying all
/// given predicates. Single pass over diagnoses; staging is consulted only
/// when a stage prefix is given. Output is sorted and deduplicated.
pub fn select_cohort(
    diagnoses: &[Diagnosis],
    stagings: &[Staging],
    criteria: &CohortCriteria,
) -> Vec<i64> {
    let mut cohort = BTreeSet::new();

    for diagnosis in diagnoses {
        if !code_matches(&diagnosis.classification_code, &criteria.code_prefixes) {
            continue;
        }
        if let Some(expected) = &criteria.histology {
            match &diagnosis.histology {
                Some(h) if h.eq_ignore_ascii_case(expected) => {}
                _ => continue,
            }
        }
        if let Some(prefix) = &criteria.stage_prefix {
            let stage = current_stage(stagings, diagnosis.diagnosis_id)
                .and_then(|s| s.overall_stage.as_deref());
            match stage {
                Some(s) if starts_with_ignore_case(s, prefix) => {}
                _ => continue,
            }
        }
        cohort.insert(diagnosis.patient_id);
    }

    cohort.into_iter().collect()
}

/// The current staging record for a diagnosis: latest by date, ties broken
/// by highest staging_id.
pub fn current_stage(stagings: &[Staging], diagnosis_id: i64) -> Option<&Staging> {
    stagings
        .iter()
        .filter(|s| s.diagnosis_id == diagnosis_id)
        .max_by_key(|s| (s.date, s.staging_id))
}

fn code_matches(code: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| starts_with_ignore_case(code, p))
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
