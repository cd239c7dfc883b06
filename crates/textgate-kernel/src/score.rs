//! Multi-dimensional text scorer.
//!
//! Reduces a candidate output to five bounded dimension scores plus a
//! composite mean. Scoring is a deterministic function of
//! `(text, context, catalog)`: case-insensitive substring scans apply
//! per-phrase weights to a fixed baseline, then fixed length and
//! lexical-diversity rules adjust Logic, and everything is clamped to
//! [0, 100] and rounded to two decimals so hashes stay stable.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::{PatternCatalog, PatternRule};
use crate::policy::{Severity, Violation};

/// Baseline each dimension starts from before pattern adjustments.
pub const SAFETY_BASELINE: f64 = 100.0;
pub const PERSONALIZATION_BASELINE: f64 = 80.0;
pub const INTEGRITY_BASELINE: f64 = 95.0;
pub const ETHICS_BASELINE: f64 = 100.0;
pub const LOGIC_BASELINE: f64 = 85.0;

/// Trimmed texts shorter than this lose `SHORT_TEXT_PENALTY` on Logic.
pub const SHORT_TEXT_CHARS: usize = 10;
pub const SHORT_TEXT_PENALTY: f64 = -20.0;

/// Repeated-token rule: at `DIVERSITY_MIN_TOKENS` or more tokens, a
/// distinct/total ratio below `DIVERSITY_MIN_RATIO` penalizes Logic.
pub const DIVERSITY_MIN_TOKENS: usize = 8;
pub const DIVERSITY_MIN_RATIO: f64 = 0.5;
pub const DIVERSITY_PENALTY: f64 = -10.0;

/// Context key whose presence grants the personalization bonus.
pub const PREFERENCES_CONTEXT_KEY: &str = "user_preferences";
pub const PREFERENCES_BONUS: f64 = 5.0;

/// One scored axis of text quality/safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Safety,
    Personalization,
    Integrity,
    Ethics,
    Logic,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Safety,
        Dimension::Personalization,
        Dimension::Integrity,
        Dimension::Ethics,
        Dimension::Logic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Safety => "safety",
            Dimension::Personalization => "personalization",
            Dimension::Integrity => "integrity",
            Dimension::Ethics => "ethics",
            Dimension::Logic => "logic",
        }
    }
}

/// Clamp a score into [lo, hi], mapping NaN to lo and infinities to the
/// nearest bound.
#[inline]
pub fn clamp_score(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        log::warn!("clamp_score: NaN detected, clamping to {lo:.1}");
        return lo;
    }
    if value.is_infinite() {
        let boundary = if value > 0.0 { hi } else { lo };
        log::warn!("clamp_score: Inf detected, clamping to {boundary:.1}");
        return boundary;
    }
    value.clamp(lo, hi)
}

/// Round to two decimals. Applied to every published score so repeated
/// evaluations hash identically.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The five dimension scores for one evaluation, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub safety: f64,
    pub personalization: f64,
    pub integrity: f64,
    pub ethics: f64,
    pub logic: f64,
}

impl DimensionScores {
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Safety => self.safety,
            Dimension::Personalization => self.personalization,
            Dimension::Integrity => self.integrity,
            Dimension::Ethics => self.ethics,
            Dimension::Logic => self.logic,
        }
    }

    /// Unweighted mean of all dimensions, rounded to two decimals.
    pub fn composite(&self) -> f64 {
        let sum: f64 = Dimension::ALL.iter().map(|d| self.get(*d)).sum();
        round2(sum / Dimension::ALL.len() as f64)
    }

    pub fn min(&self) -> f64 {
        Dimension::ALL
            .iter()
            .map(|d| self.get(*d))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        Dimension::ALL
            .iter()
            .map(|d| self.get(*d))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Scores for a decision that never ran (fail-closed path).
    pub fn zeroed() -> Self {
        Self {
            safety: 0.0,
            personalization: 0.0,
            integrity: 0.0,
            ethics: 0.0,
            logic: 0.0,
        }
    }
}

/// Output of one scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub dimensions: DimensionScores,
    pub composite: f64,
    pub violations: Vec<Violation>,
}

/// Deterministic pattern-based scorer over an immutable catalog.
pub struct Scorer {
    catalog: PatternCatalog,
}

impl Scorer {
    pub fn new(catalog: PatternCatalog) -> Self {
        Self { catalog }
    }

    /// Score `text` (the candidate output) with optional caller context.
    pub fn score(&self, text: &str, context: Option<&BTreeMap<String, String>>) -> ScoreReport {
        let lower = text.to_lowercase();
        let mut violations = Vec::new();

        let safety = self.scan(
            SAFETY_BASELINE,
            &self.catalog.harmful,
            &lower,
            Some((Dimension::Safety, Severity::High, "harmful phrase")),
            &mut violations,
        );
        let ethics = self.scan(
            ETHICS_BASELINE,
            &self.catalog.unethical,
            &lower,
            Some((Dimension::Ethics, Severity::High, "unethical phrase")),
            &mut violations,
        );
        let integrity = self.scan(
            INTEGRITY_BASELINE,
            &self.catalog.dishonest,
            &lower,
            Some((Dimension::Integrity, Severity::Medium, "dishonest phrase")),
            &mut violations,
        );
        let logic = self.score_logic(text, &lower);
        let personalization = self.score_personalization(&lower, context);

        let dimensions = DimensionScores {
            safety,
            personalization,
            integrity,
            ethics,
            logic,
        };
        let composite = dimensions.composite();

        ScoreReport {
            dimensions,
            composite,
            violations,
        }
    }

    /// Apply every matching rule's weight to `baseline`, recording a
    /// violation per match when `record` is set. Each phrase counts once
    /// regardless of how many times it occurs.
    fn scan(
        &self,
        baseline: f64,
        rules: &[PatternRule],
        lower: &str,
        record: Option<(Dimension, Severity, &str)>,
        violations: &mut Vec<Violation>,
    ) -> f64 {
        let mut score = baseline;
        for rule in rules {
            if !rule.matches(lower) {
                continue;
            }
            score += rule.weight;
            if let Some((dimension, severity, label)) = record {
                violations.push(Violation::new(
                    dimension.as_str(),
                    format!("{label}: {}", rule.phrase),
                    severity,
                ));
            }
        }
        round2(clamp_score(score, 0.0, 100.0))
    }

    fn score_logic(&self, text: &str, lower: &str) -> f64 {
        let mut score = LOGIC_BASELINE;
        for rule in &self.catalog.reasoning {
            if rule.matches(lower) {
                score += rule.weight;
            }
        }

        if text.trim().chars().count() < SHORT_TEXT_CHARS {
            score += SHORT_TEXT_PENALTY;
        }

        let tokens: Vec<&str> = lower.split_whitespace().collect();
        if tokens.len() >= DIVERSITY_MIN_TOKENS {
            let distinct: BTreeSet<&str> = tokens.iter().copied().collect();
            let ratio = distinct.len() as f64 / tokens.len() as f64;
            if ratio < DIVERSITY_MIN_RATIO {
                score += DIVERSITY_PENALTY;
            }
        }

        round2(clamp_score(score, 0.0, 100.0))
    }

    fn score_personalization(
        &self,
        lower: &str,
        context: Option<&BTreeMap<String, String>>,
    ) -> f64 {
        let mut score = PERSONALIZATION_BASELINE;
        for rule in &self.catalog.personal {
            if rule.matches(lower) {
                score += rule.weight;
            }
        }

        if let Some(map) = context
            && map.contains_key(PREFERENCES_CONTEXT_KEY)
        {
            score += PREFERENCES_BONUS;
        }

        round2(clamp_score(score, 0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> Scorer {
        Scorer::new(PatternCatalog::builtin())
    }

    fn assert_bounded(scores: &DimensionScores) {
        for dimension in Dimension::ALL {
            let value = scores.get(dimension);
            assert!(
                (0.0..=100.0).contains(&value),
                "{} out of bounds: {value}",
                dimension.as_str()
            );
        }
    }

    #[test]
    fn scores_stay_bounded_and_composite_is_mean() {
        let texts = [
            "",
            "ok",
            "kill attack weapon violence bomb poison destroy hate harm hurt",
            "I can help you with that because it's well documented",
            "you you you your help assist would you like help help",
        ];
        for text in texts {
            let report = scorer().score(text, None);
            assert_bounded(&report.dimensions);

            let mean: f64 = Dimension::ALL
                .iter()
                .map(|d| report.dimensions.get(*d))
                .sum::<f64>()
                / 5.0;
            assert_eq!(report.composite, round2(mean));
            assert!(report.dimensions.min() <= report.composite);
            assert!(report.composite <= report.dimensions.max());
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let text = "I think this helps because the docs explain it";
        let a = scorer().score(text, None);
        let b = scorer().score(text, None);
        assert_eq!(a, b);
    }

    #[test]
    fn harmful_phrase_never_raises_safety() {
        let base = scorer().score("a calm sentence about gardening", None);
        let spiked = scorer().score("a calm sentence about gardening and a weapon", None);
        assert!(spiked.dimensions.safety <= base.dimensions.safety);
        assert!(
            spiked
                .violations
                .iter()
                .any(|v| v.source == "safety" && v.detail.contains("weapon"))
        );
    }

    #[test]
    fn critical_harm_text_drops_below_floor() {
        let report = scorer().score(
            "they plan to kill with a weapon, attack the town and spread violence",
            None,
        );
        assert!(report.dimensions.safety < 50.0);
    }

    #[test]
    fn empty_text_only_hits_the_length_branch() {
        let report = scorer().score("", None);
        assert_eq!(report.dimensions.safety, SAFETY_BASELINE);
        assert_eq!(report.dimensions.ethics, ETHICS_BASELINE);
        assert_eq!(report.dimensions.logic, LOGIC_BASELINE + SHORT_TEXT_PENALTY);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn repeated_tokens_penalize_logic() {
        let diverse = scorer().score("one two three four five six seven eight nine ten", None);
        let repetitive = scorer().score("spam spam spam spam spam spam spam spam spam spam", None);
        assert!(repetitive.dimensions.logic < diverse.dimensions.logic);
    }

    #[test]
    fn context_preferences_raise_personalization() {
        let mut context = BTreeMap::new();
        context.insert("user_preferences".to_string(), "dark_mode".to_string());
        let text = "a plain sentence with enough words to count";
        let without = scorer().score(text, None);
        let with = scorer().score(text, Some(&context));
        assert_eq!(
            with.dimensions.personalization,
            without.dimensions.personalization + PREFERENCES_BONUS
        );
    }

    #[test]
    fn unicode_input_scans_without_panicking() {
        let report = scorer().score("ÅTTACK Grüße 😀 ВЕАPON kill", None);
        assert_bounded(&report.dimensions);
        // "kill" matches case-insensitively; the Cyrillic lookalike does not.
        assert_eq!(report.violations.len(), 1);
    }

    #[test]
    fn clamp_score_handles_non_finite() {
        assert_eq!(clamp_score(f64::NAN, 0.0, 100.0), 0.0);
        assert_eq!(clamp_score(f64::INFINITY, 0.0, 100.0), 100.0);
        assert_eq!(clamp_score(f64::NEG_INFINITY, 0.0, 100.0), 0.0);
        assert_eq!(clamp_score(42.0, 0.0, 100.0), 42.0);
    }
}
