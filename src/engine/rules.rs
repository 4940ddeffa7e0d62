use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::EngineError;

// ---------------------------------------------------------------------------
// RegimenSignature
// ---------------------------------------------------------------------------

/// Named regimen pattern: an encounter matches when every required drug was
/// given that day and no excluded drug was. Drug sets are held lowercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimenSignature {
    pub name: String,
    pub required_drugs: BTreeSet<String>,
    pub excluded_drugs: BTreeSet<String>,
}

impl RegimenSignature {
    /// required ⊆ drugs ∧ excluded ∩ drugs = ∅, over lowercase drug names.
    pub fn matches(&self, drugs: &BTreeSet<String>) -> bool {
        self.required_drugs.iter().all(|d| drugs.contains(d))
            && self.excluded_drugs.iter().all(|d| !drugs.contains(d))
    }

    /// Union of required and excluded drugs; bounds the administrations
    /// pulled from the store and fed to the grouper.
    pub fn allowlist(&self) -> BTreeSet<String> {
        self.required_drugs
            .union(&self.excluded_drugs)
            .cloned()
            .collect()
    }

    fn normalize(&mut self) {
        self.required_drugs = lowercase_set(&self.required_drugs);
        self.excluded_drugs = lowercase_set(&self.excluded_drugs);
    }
}

fn lowercase_set(set: &BTreeSet<String>) -> BTreeSet<String> {
    set.iter().map(|s| s.trim().to_lowercase()).collect()
}

// ---------------------------------------------------------------------------
// GuidelineRule
// ---------------------------------------------------------------------------

/// One actionable-marker rule. The position in the rule list is the
/// evaluation priority: the first positive marker wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidelineRule {
    /// Short display label, e.g. "EGFR".
    pub label: String,
    /// Fact-store marker name this rule tests, e.g. "EGFR Mutation".
    pub marker_name: String,
    /// Result values that count as positive (case-insensitive).
    pub positive_results: BTreeSet<String>,
    /// First-line drugs concordant with a positive result (case-insensitive).
    pub concordant_drugs: BTreeSet<String>,
}

impl GuidelineRule {
    pub fn is_positive(&self, result: &str) -> bool {
        self.positive_results
            .iter()
            .any(|v| v.eq_ignore_ascii_case(result))
    }

    pub fn is_concordant(&self, drug_name: &str) -> bool {
        self.concordant_drugs
            .iter()
            .any(|v| v.eq_ignore_ascii_case(drug_name))
    }
}

// ---------------------------------------------------------------------------
// CohortCriteria
// ---------------------------------------------------------------------------

/// Diagnosis predicate selecting a patient cohort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortCriteria {
    /// Any-of prefix match against classification_code (case-insensitive).
    pub code_prefixes: Vec<String>,
    /// Exact histology match when given (case-insensitive).
    #[serde(default)]
    pub histology: Option<String>,
    /// Prefix match against the diagnosis's current overall_stage when given.
    #[serde(default)]
    pub stage_prefix: Option<String>,
}

// ---------------------------------------------------------------------------
// Analyses & RuleSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimenAnalysis {
    pub cohort: CohortCriteria,
    pub signature: RegimenSignature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcordanceAnalysis {
    pub cohort: CohortCriteria,
    /// Evaluation order is priority order.
    pub rules: Vec<GuidelineRule>,
    /// Drug classes acceptable as first-line therapy when no actionable
    /// marker is positive (case-insensitive).
    pub non_targeted_classes: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceAnalysis {
    pub cohort: CohortCriteria,
    pub test_name: String,
}

/// The complete rule configuration. Rules are data: content changes are
/// table updates, never evaluator changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub regimen: RegimenAnalysis,
    pub concordance: ConcordanceAnalysis,
    pub recurrence: RecurrenceAnalysis,
}

impl RuleSet {
    /// Load and validate a rule table from a JSON file. Any structural
    /// problem is fatal here, before a single patient is processed.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            EngineError::RuleTableLoad(path.display().to_string(), e.to_string())
        })?;
        let mut rules: RuleSet = serde_json::from_str(&json).map_err(|e| {
            EngineError::RuleTableParse(path.display().to_string(), e.to_string())
        })?;
        rules.regimen.signature.normalize();
        rules.validate()?;
        Ok(rules)
    }

    /// The shipped rule content: FOLFOX cycle analysis for colorectal
    /// cancer, NSCLC targeted-therapy concordance, and CA-125 biochemical
    /// recurrence for ovarian cancer.
    pub fn default_oncology() -> Self {
        let mut rules = Self {
            regimen: RegimenAnalysis {
                cohort: CohortCriteria {
                    code_prefixes: vec!["C18".into(), "C19".into(), "C20".into()],
                    histology: None,
                    stage_prefix: None,
                },
                signature: RegimenSignature {
                    name: "FOLFOX".into(),
                    required_drugs: ["5-FU", "Leucovorin", "Oxaliplatin"]
                        .map(String::from)
                        .into(),
                    excluded_drugs: ["Irinotecan"].map(String::from).into(),
                },
            },
            concordance: ConcordanceAnalysis {
                cohort: CohortCriteria {
                    code_prefixes: vec!["C34".into()],
                    histology: None,
                    stage_prefix: None,
                },
                rules: vec![
                    GuidelineRule {
                        label: "EGFR".into(),
                        marker_name: "EGFR Mutation".into(),
                        positive_results: ["L858R", "Exon 19 Deletion", "Positive"]
                            .map(String::from)
                            .into(),
                        concordant_drugs: ["Osimertinib", "Erlotinib", "Gefitinib", "Afatinib"]
                            .map(String::from)
                            .into(),
                    },
                    GuidelineRule {
                        label: "ALK".into(),
                        marker_name: "ALK Fusion".into(),
                        positive_results: ["Positive", "Detected"].map(String::from).into(),
                        concordant_drugs: ["Alectinib", "Crizotinib", "Brigatinib", "Lorlatinib"]
                            .map(String::from)
                            .into(),
                    },
                    GuidelineRule {
                        label: "ROS1".into(),
                        marker_name: "ROS1 Fusion".into(),
                        positive_results: ["Positive", "Detected"].map(String::from).into(),
                        concordant_drugs: ["Crizotinib", "Entrectinib"].map(String::from).into(),
                    },
                    GuidelineRule {
                        label: "BRAF".into(),
                        marker_name: "BRAF Mutation".into(),
                        positive_results: ["V600E", "Positive"].map(String::from).into(),
                        concordant_drugs: ["Dabrafenib", "Trametinib"].map(String::from).into(),
                    },
                ],
                non_targeted_classes: ["Chemotherapy", "Immunotherapy"].map(String::from).into(),
            },
            recurrence: RecurrenceAnalysis {
                cohort: CohortCriteria {
                    code_prefixes: vec!["C56".into()],
                    histology: None,
                    stage_prefix: None,
                },
                test_name: "CA-125".into(),
            },
        };
        rules.regimen.signature.normalize();
        rules
    }

    /// Structural validation of the rule tables. Content is configuration;
    /// shape is not negotiable.
    pub fn validate(&self) -> Result<(), EngineError> {
        validate_cohort("regimen.cohort", &self.regimen.cohort)?;
        validate_cohort("concordance.cohort", &self.concordance.cohort)?;
        validate_cohort("recurrence.cohort", &self.recurrence.cohort)?;

        let signature = &self.regimen.signature;
        if signature.name.trim().is_empty() {
            return Err(invalid("regimen.signature", "name must not be empty"));
        }
        if signature.required_drugs.is_empty() {
            return Err(invalid(
                &signature.name,
                "required_drugs must not be empty",
            ));
        }
        if signature
            .required_drugs
            .intersection(&signature.excluded_drugs)
            .next()
            .is_some()
        {
            return Err(invalid(
                &signature.name,
                "required_drugs and excluded_drugs overlap",
            ));
        }

        if self.concordance.rules.is_empty() {
            return Err(invalid("concordance.rules", "rule list must not be empty"));
        }
        let mut seen_markers = BTreeSet::new();
        for rule in &self.concordance.rules {
            if rule.label.trim().is_empty() || rule.marker_name.trim().is_empty() {
                return Err(invalid(
                    "concordance.rules",
                    "label and marker_name must not be empty",
                ));
            }
            if rule.positive_results.is_empty() {
                return Err(invalid(&rule.marker_name, "positive_results must not be empty"));
            }
            if rule.concordant_drugs.is_empty() {
                return Err(invalid(&rule.marker_name, "concordant_drugs must not be empty"));
            }
            if !seen_markers.insert(rule.marker_name.to_lowercase()) {
                return Err(invalid(&rule.marker_name, "duplicate marker rule"));
            }
        }

        if self.recurrence.test_name.trim().is_empty() {
            return Err(invalid("recurrence", "test_name must not be empty"));
        }
        Ok(())
    }
}

fn validate_cohort(rule: &str, cohort: &CohortCriteria) -> Result<(), EngineError> {
    if cohort.code_prefixes.is_empty()
        || cohort.code_prefixes.iter().any(|p| p.trim().is_empty())
    {
        return Err(invalid(rule, "code_prefixes must be non-empty strings"));
    }
    Ok(())
}

fn invalid(rule: &str, reason: &str) -> EngineError {
    EngineError::InvalidRule {
        rule: rule.to_string(),
        reason: reason.to_string(),
    }
}
