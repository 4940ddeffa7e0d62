pub mod cohort;
pub mod concordance;
pub mod cycles;
pub mod encounter;
pub mod engine;
pub mod recurrence;
pub mod rules;
pub mod types;

pub use engine::RuleEngine;
pub use rules::{
    CohortCriteria, ConcordanceAnalysis, GuidelineRule, RecurrenceAnalysis, RegimenAnalysis,
    RegimenSignature, RuleSet,
};
pub use types::{
    ConcordanceCounts, ConcordanceRecord, ConcordanceReport, ConcordanceStatus, CycleRecord,
    EngineError, FactSnapshot, RecurrenceRecord, RecurrenceReport, RegimenReport, SkippedFact,
};
