//! Truth / Honesty / Transparency compliance checks.
//!
//! Three independent boolean checks over the candidate text:
//! - Truth fails when an overconfident absolute claim is present.
//! - Honesty fails when a secrecy/manipulation phrase is present.
//! - Transparency requires a reasoning marker when the text makes a
//!   claim and is long enough to owe one; short texts and non-claims
//!   are exempt.
//!
//! Confidence is the fraction of passing checks. Compliance means all
//! checks pass and confidence clears the configured threshold.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::PatternCatalog;
use crate::error::EngineError;

/// Texts shorter than this (in characters) are exempt from the
/// Transparency reasoning requirement.
pub const TRANSPARENCY_MIN_CHARS: usize = 50;

const CHECK_COUNT: usize = 3;

/// A named compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    Truth,
    Honesty,
    Transparency,
}

impl Check {
    pub fn as_str(&self) -> &'static str {
        match self {
            Check::Truth => "truth",
            Check::Honesty => "honesty",
            Check::Transparency => "transparency",
        }
    }
}

/// Result of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub truth: bool,
    pub honesty: bool,
    pub transparency: bool,
    /// Fraction of checks passing, in [0, 1].
    pub confidence: f64,
    /// All checks pass and confidence clears the configured threshold.
    pub compliant: bool,
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self, check: Check) -> bool {
        match check {
            Check::Truth => self.truth,
            Check::Honesty => self.honesty,
            Check::Transparency => self.transparency,
        }
    }

    /// Report for a decision that never ran: nothing verified.
    pub fn fail_closed() -> Self {
        Self {
            truth: false,
            honesty: false,
            transparency: false,
            confidence: 0.0,
            compliant: false,
            issues: Vec::new(),
        }
    }

    /// Remediation advice, one line per failing check.
    pub fn recommendations(&self) -> Vec<String> {
        let mut advice = Vec::new();
        if !self.truth {
            advice.push(
                "Avoid absolute claims. Use hedging language like 'likely', 'may', 'suggests'."
                    .to_string(),
            );
        }
        if !self.honesty {
            advice.push(
                "Avoid secretive language. Be open about the nature of the information."
                    .to_string(),
            );
        }
        if !self.transparency {
            advice.push("Provide reasoning for claims. Explain 'why' or cite sources.".to_string());
        }
        advice
    }
}

/// Deterministic compliance validator over the catalog's fixed phrase
/// sets.
pub struct Validator {
    overconfident: Vec<String>,
    secretive: Vec<String>,
    transparency_markers: Vec<String>,
    claim_re: Regex,
}

impl Validator {
    /// Build from a catalog; compiles the whole-word claim matcher.
    pub fn new(catalog: &PatternCatalog) -> Result<Self, EngineError> {
        let alternatives: Vec<String> = catalog
            .claim_words
            .iter()
            .map(|w| regex::escape(w))
            .collect();
        let claim_re = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
            .map_err(|e| EngineError::Internal(format!("claim matcher: {e}")))?;

        Ok(Self {
            overconfident: catalog.overconfident.clone(),
            secretive: catalog.secretive.clone(),
            transparency_markers: catalog.transparency_markers.clone(),
            claim_re,
        })
    }

    /// Validate `text` against all three checks.
    pub fn validate(&self, text: &str, confidence_threshold: f64) -> ValidationReport {
        let lower = text.to_lowercase();
        let mut issues = Vec::new();

        let truth = !self.overconfident.iter().any(|p| lower.contains(p));
        if !truth {
            issues.push("Truth verification failed: overconfident claims detected".to_string());
        }

        let honesty = !self.secretive.iter().any(|p| lower.contains(p));
        if !honesty {
            issues.push(
                "Honesty check failed: secretive or manipulative patterns detected".to_string(),
            );
        }

        let transparency = self.check_transparency(text, &lower);
        if !transparency {
            issues.push("Transparency check failed: claims without supporting reasoning".to_string());
        }

        let passing = [truth, honesty, transparency]
            .iter()
            .filter(|v| **v)
            .count();
        let confidence = passing as f64 / CHECK_COUNT as f64;
        let compliant = truth && honesty && transparency && confidence >= confidence_threshold;

        ValidationReport {
            truth,
            honesty,
            transparency,
            confidence,
            compliant,
            issues,
        }
    }

    fn check_transparency(&self, text: &str, lower: &str) -> bool {
        if !self.claim_re.is_match(text) {
            return true;
        }
        // Short replies are exempt even when they make claims.
        if text.chars().count() < TRANSPARENCY_MIN_CHARS {
            return true;
        }
        self.transparency_markers.iter().any(|m| lower.contains(m))
    }
}
