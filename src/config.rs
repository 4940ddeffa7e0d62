use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Oncordia";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Upper limit of normal applied when a lab result carries no reference_range_high.
pub const DEFAULT_ULN_FALLBACK: f64 = 35.0;

/// Nominal chemotherapy cycle length in days. Reported for context only;
/// cycle numbering never skips or merges based on it.
pub const DEFAULT_NOMINAL_CYCLE_DAYS: i64 = 14;

/// Minimum interval between two lab results for the recurrence rule.
pub const DEFAULT_RECURRENCE_MIN_GAP_DAYS: i64 = 7;

/// Tunable engine constants, overridable per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub uln_fallback: f64,
    pub nominal_cycle_days: i64,
    pub recurrence_min_gap_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            uln_fallback: DEFAULT_ULN_FALLBACK,
            nominal_cycle_days: DEFAULT_NOMINAL_CYCLE_DAYS,
            recurrence_min_gap_days: DEFAULT_RECURRENCE_MIN_GAP_DAYS,
        }
    }
}
