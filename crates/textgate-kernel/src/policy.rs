//! The policy decision machine.
//!
//! Turns one evaluation's scores, checks, and violations into a single
//! enforcement action with a human-readable justification. Rules are
//! evaluated in strict priority order and the first match wins, so a
//! Block can never be downgraded by a later Warn or Review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PolicyConfig;
use crate::guard::FailClosedReason;
use crate::score::DimensionScores;
use crate::validate::ValidationReport;

/// Dimensions critical to safety or ethics below this absolute floor
/// block regardless of configured thresholds.
pub const CRITICAL_FLOOR: f64 = 50.0;

/// How many violations a justification preview names.
pub const VIOLATION_PREVIEW: usize = 3;

/// The enforcement action for one evaluation. Terminal per call; the
/// machine has no memory between evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Warn,
    Review,
    Block,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Warn => "warn",
            Action::Review => "review",
            Action::Block => "block",
        }
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Action::Allow),
            "warn" => Ok(Action::Warn),
            "review" => Ok(Action::Review),
            "block" => Ok(Action::Block),
            other => Err(format!("unknown action: {other:?}")),
        }
    }
}

/// Severity of a violation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// One recorded violation. Immutable after creation: produced by the
/// scorer or validator, consumed by the decision machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// The dimension or check that produced this violation.
    pub source: String,
    pub detail: String,
    pub severity: Severity,
}

impl Violation {
    pub fn new(source: impl Into<String>, detail: impl Into<String>, severity: Severity) -> Self {
        Self {
            source: source.into(),
            detail: detail.into(),
            severity,
        }
    }
}

/// The full outcome of one evaluation. Created once, never mutated;
/// the audit chain references it by hash, not ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: Uuid,
    pub input: String,
    pub output: String,
    pub action: Action,
    pub scores: DimensionScores,
    pub composite: f64,
    pub checks: ValidationReport,
    pub violations: Vec<Violation>,
    pub justification: String,
    /// Set only when the guard substituted this decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fail_closed_reason: Option<FailClosedReason>,
    /// Generic decline text safe to show the original caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_message: Option<String>,
    pub latency_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// First `VIOLATION_PREVIEW` violation details, comma-joined.
fn preview(violations: &[Violation]) -> String {
    violations
        .iter()
        .take(VIOLATION_PREVIEW)
        .map(|v| v.detail.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Apply the transition rules in priority order; first match wins.
pub fn decide(
    scores: &DimensionScores,
    checks: &ValidationReport,
    violations: &[Violation],
    config: &PolicyConfig,
) -> (Action, String) {
    let thresholds = &config.thresholds;

    if scores.safety < CRITICAL_FLOOR || scores.ethics < CRITICAL_FLOOR {
        return (
            Action::Block,
            "Critical safety or ethics violation".to_string(),
        );
    }

    if scores.safety < thresholds.safety {
        return (
            Action::Block,
            format!(
                "Safety below threshold ({:.1} < {})",
                scores.safety, thresholds.safety
            ),
        );
    }

    if scores.ethics < thresholds.ethics {
        return (
            Action::Block,
            format!(
                "Ethics below threshold ({:.1} < {})",
                scores.ethics, thresholds.ethics
            ),
        );
    }

    if scores.integrity < thresholds.integrity {
        return (
            Action::Warn,
            format!(
                "Integrity below threshold ({:.1} < {})",
                scores.integrity, thresholds.integrity
            ),
        );
    }

    if scores.logic < thresholds.logic {
        return (
            Action::Warn,
            format!(
                "Logic below threshold ({:.1} < {})",
                scores.logic, thresholds.logic
            ),
        );
    }

    if !checks.compliant {
        return (
            Action::Warn,
            format!(
                "Compliance checks failed (confidence {:.2}): {}",
                checks.confidence,
                checks.issues.join("; ")
            ),
        );
    }

    if !violations.is_empty() {
        return (
            Action::Review,
            format!("Violations detected: {}", preview(violations)),
        );
    }

    (Action::Allow, "All policy criteria passed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passing_checks() -> ValidationReport {
        ValidationReport {
            truth: true,
            honesty: true,
            transparency: true,
            confidence: 1.0,
            compliant: true,
            issues: Vec::new(),
        }
    }

    fn clean_scores() -> DimensionScores {
        DimensionScores {
            safety: 100.0,
            personalization: 90.0,
            integrity: 95.0,
            ethics: 100.0,
            logic: 90.0,
        }
    }

    #[test]
    fn clean_evaluation_allows() {
        let (action, justification) = decide(
            &clean_scores(),
            &passing_checks(),
            &[],
            &PolicyConfig::default(),
        );
        assert_eq!(action, Action::Allow);
        assert_eq!(justification, "All policy criteria passed");
    }

    #[test]
    fn critical_floor_blocks_before_thresholds() {
        let mut scores = clean_scores();
        scores.ethics = 40.0;
        let (action, justification) = decide(
            &scores,
            &passing_checks(),
            &[],
            &PolicyConfig::default(),
        );
        assert_eq!(action, Action::Block);
        assert!(justification.contains("Critical"));
    }

    #[test]
    fn safety_threshold_blocks() {
        let mut scores = clean_scores();
        scores.safety = 70.0;
        let (action, justification) = decide(
            &scores,
            &passing_checks(),
            &[],
            &PolicyConfig::default(),
        );
        assert_eq!(action, Action::Block);
        assert!(justification.contains("Safety below threshold"));
    }

    #[test]
    fn integrity_threshold_warns() {
        let mut scores = clean_scores();
        scores.integrity = 65.0;
        let (action, _) = decide(
            &scores,
            &passing_checks(),
            &[],
            &PolicyConfig::default(),
        );
        assert_eq!(action, Action::Warn);
    }

    #[test]
    fn block_is_not_downgraded_by_compliance_failure() {
        // Safety breach and failing checks together: the Block rule fires
        // first, the compliance Warn never sees the evaluation.
        let mut scores = clean_scores();
        scores.safety = 40.0;
        let mut checks = passing_checks();
        checks.compliant = false;
        checks.confidence = 0.33;
        let (action, _) = decide(&scores, &checks, &[], &PolicyConfig::default());
        assert_eq!(action, Action::Block);
    }

    #[test]
    fn non_compliant_checks_warn() {
        let mut checks = passing_checks();
        checks.truth = false;
        checks.compliant = false;
        checks.confidence = 2.0 / 3.0;
        checks.issues.push("Truth verification failed".to_string());
        let (action, justification) = decide(
            &clean_scores(),
            &checks,
            &[],
            &PolicyConfig::default(),
        );
        assert_eq!(action, Action::Warn);
        assert!(justification.contains("Compliance checks failed"));
    }

    #[test]
    fn residual_violations_request_review() {
        let violations = vec![
            Violation::new("integrity", "dishonest phrase: secret", Severity::Medium),
        ];
        let mut scores = clean_scores();
        scores.integrity = 80.0; // at the threshold, not below
        let (action, justification) = decide(
            &scores,
            &passing_checks(),
            &violations,
            &PolicyConfig::default(),
        );
        assert_eq!(action, Action::Review);
        assert!(justification.contains("secret"));
    }

    #[test]
    fn preview_is_truncated_to_three() {
        let violations: Vec<Violation> = (0..5)
            .map(|i| Violation::new("safety", format!("v{i}"), Severity::High))
            .collect();
        let text = preview(&violations);
        assert_eq!(text, "v0, v1, v2");
    }
}
