use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::models::AdministrationEvent;

use super::types::{FactKind, SkippedFact};

/// Same-day aggregation of one patient's drug administrations. Derived and
/// ephemeral; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encounter {
    pub patient_id: i64,
    pub date: NaiveDate,
    /// Distinct lowercase drug names administered that date.
    pub drugs: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct GroupedEncounters {
    /// Ascending by (patient_id, date).
    pub encounters: Vec<Encounter>,
    pub skipped: Vec<SkippedFact>,
}

/// Collapse administration events into same-day encounters. Timestamps are
/// projected to calendar dates (time-of-day intentionally discarded);
/// grouping is keyed, so the result does not depend on input event order.
/// Events outside the allowlist are ignored; events with an empty drug name
/// are excluded with a recorded reason.
pub fn group_encounters(
    administrations: &[AdministrationEvent],
    allowlist: &BTreeSet<String>,
) -> GroupedEncounters {
    let mut groups: BTreeMap<(i64, NaiveDate), BTreeSet<String>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for event in administrations {
        let drug = event.drug_name.trim().to_lowercase();
        if drug.is_empty() {
            skipped.push(SkippedFact {
                kind: FactKind::Administration,
                id: event.admin_id,
                patient_id: event.patient_id,
                reason: "empty drug name".into(),
            });
            continue;
        }
        if !allowlist.contains(&drug) {
            continue;
        }
        groups
            .entry((event.patient_id, event.timestamp.date()))
            .or_default()
            .insert(drug);
    }

    let encounters = groups
        .into_iter()
        .map(|((patient_id, date), drugs)| Encounter {
            patient_id,
            date,
            drugs,
        })
        .collect();

    GroupedEncounters {
        encounters,
        skipped,
    }
}
