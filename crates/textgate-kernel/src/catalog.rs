//! Trigger-phrase catalog.
//!
//! An immutable, versioned table mapping scored dimensions to trigger
//! phrases and per-match weights, plus the phrase sets the validator
//! consumes. Policy documents may override the four scorer phrase lists;
//! the weights and the validator sets are fixed by the catalog version.

use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;

/// Catalog schema version. Bump when weights or fixed sets change.
pub const CATALOG_VERSION: &str = "catalog.v1";

/// Per-phrase weight applied when a harmful phrase is present (Safety).
pub const HARMFUL_WEIGHT: f64 = -15.0;
/// Per-phrase weight for unethical phrases (Ethics).
pub const UNETHICAL_WEIGHT: f64 = -20.0;
/// Per-phrase weight for dishonest phrases (Integrity).
pub const DISHONEST_WEIGHT: f64 = -15.0;
/// Per-phrase weight for reasoning markers (Logic).
pub const REASONING_WEIGHT: f64 = 3.0;
/// Per-phrase weight for personalization markers.
pub const PERSONAL_WEIGHT: f64 = 4.0;

/// One trigger phrase and the score adjustment it carries.
///
/// Phrases are matched as case-insensitive substrings; a phrase present
/// anywhere in the text applies its weight exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    pub phrase: String,
    pub weight: f64,
}

impl PatternRule {
    fn with_weight(phrase: &str, weight: f64) -> Self {
        Self {
            phrase: phrase.to_string(),
            weight,
        }
    }

    /// Whether this phrase occurs in `lower` (caller pre-lowercases).
    pub fn matches(&self, lower: &str) -> bool {
        lower.contains(self.phrase.as_str())
    }
}

/// The full catalog one evaluation scans against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCatalog {
    pub version: String,

    /// Safety triggers (negative weight).
    pub harmful: Vec<PatternRule>,
    /// Ethics triggers (negative weight).
    pub unethical: Vec<PatternRule>,
    /// Integrity triggers (negative weight).
    pub dishonest: Vec<PatternRule>,
    /// Logic reasoning markers (positive weight).
    pub reasoning: Vec<PatternRule>,
    /// Personalization markers (positive weight).
    pub personal: Vec<PatternRule>,

    /// Validator: overconfident absolute-claim phrases (Truth).
    pub overconfident: Vec<String>,
    /// Validator: secrecy/manipulation phrases (Honesty).
    pub secretive: Vec<String>,
    /// Validator: reasoning markers satisfying Transparency.
    pub transparency_markers: Vec<String>,
    /// Validator: words indicating a claim is being made.
    pub claim_words: Vec<String>,
}

impl PatternCatalog {
    /// The built-in default catalog.
    pub fn builtin() -> Self {
        let weighted = |phrases: &[&str], weight: f64| {
            phrases
                .iter()
                .map(|p| PatternRule::with_weight(p, weight))
                .collect()
        };
        let plain = |phrases: &[&str]| phrases.iter().map(|p| p.to_string()).collect();

        Self {
            version: CATALOG_VERSION.to_string(),
            harmful: weighted(
                &[
                    "harm", "hurt", "attack", "kill", "destroy", "hate", "violence", "weapon",
                    "bomb", "poison",
                ],
                HARMFUL_WEIGHT,
            ),
            unethical: weighted(
                &[
                    "cheat", "lie", "deceive", "manipulate", "exploit", "abuse", "steal", "fraud",
                ],
                UNETHICAL_WEIGHT,
            ),
            dishonest: weighted(
                &[
                    "trust me",
                    "believe me",
                    "guarantee",
                    "secret",
                    "don't tell",
                    "definitely",
                ],
                DISHONEST_WEIGHT,
            ),
            reasoning: weighted(
                &["because", "therefore", "thus", "since", "based on"],
                REASONING_WEIGHT,
            ),
            personal: weighted(
                &["you", "your", "help", "assist", "would you like"],
                PERSONAL_WEIGHT,
            ),
            overconfident: plain(&[
                "definitely",
                "absolutely certain",
                "100% guarantee",
                "100% guaranteed",
                "always true",
                "never wrong",
                "guaranteed to work",
                "guaranteed to always work",
                "everyone knows",
                "obviously",
                "undeniably",
            ]),
            secretive: plain(&[
                "just between us",
                "don't tell",
                "keep this secret",
                "you can trust me",
                "believe me",
                "trust me on this",
                "off the record",
                "confidentially",
            ]),
            transparency_markers: plain(&[
                "because",
                "the reason",
                "this is based on",
                "according to",
                "evidence suggests",
                "research shows",
                "in my understanding",
                "i believe",
                "it appears that",
                "based on",
                "considering",
            ]),
            claim_words: plain(&[
                "is", "are", "will", "should", "must", "can", "cannot", "always", "never",
            ]),
        }
    }

    /// Build a catalog from a policy snapshot.
    ///
    /// The snapshot's four phrase lists replace the scorer lists (keeping
    /// the catalog's per-category weights); validator sets stay built-in.
    pub fn from_config(config: &PolicyConfig) -> Self {
        let weighted = |phrases: &[String], weight: f64| {
            phrases
                .iter()
                .map(|p| PatternRule::with_weight(p, weight))
                .collect()
        };

        Self {
            harmful: weighted(&config.patterns.harmful, HARMFUL_WEIGHT),
            unethical: weighted(&config.patterns.unethical, UNETHICAL_WEIGHT),
            dishonest: weighted(&config.patterns.dishonest, DISHONEST_WEIGHT),
            reasoning: weighted(&config.patterns.positive, REASONING_WEIGHT),
            ..Self::builtin()
        }
    }
}
