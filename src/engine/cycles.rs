use chrono::NaiveDate;

use super::encounter::Encounter;
use super::types::CycleRecord;

/// Assign ordinal cycle numbers to one patient's regimen-positive
/// encounters. Numbering is sequence rank only: the reported interval never
/// skips or merges cycles, regardless of gap length. The sort is stable, so
/// same-date encounters keep their insertion order.
pub fn sequence_cycles(
    first_name: &str,
    last_name: &str,
    encounters: &[&Encounter],
) -> Vec<CycleRecord> {
    let mut ordered: Vec<&Encounter> = encounters.to_vec();
    ordered.sort_by_key(|e| e.date);

    let mut cycles = Vec::with_capacity(ordered.len());
    let mut previous: Option<NaiveDate> = None;
    for (index, encounter) in ordered.iter().enumerate() {
        cycles.push(CycleRecord {
            patient_id: encounter.patient_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            cycle_start_date: encounter.date,
            days_since_previous: previous
                .map(|p| encounter.date.signed_duration_since(p).num_days()),
            cycle_number: (index + 1) as u32,
        });
        previous = Some(encounter.date);
    }
    cycles
}
