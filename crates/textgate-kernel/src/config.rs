//! Policy configuration: thresholds, phrase lists, fail-closed knobs.
//!
//! A `PolicyConfig` is a read-only snapshot. `PolicyStore` hands out
//! `Arc` snapshots and swaps them atomically on reload, so an in-flight
//! evaluation always finishes against the snapshot it started with.
//!
//! Malformed or missing documents are never fatal: loading falls back to
//! the built-in defaults and logs a warning for the host.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Current policy document version.
pub const POLICY_VERSION: &str = "1.0.0";

/// Per-dimension minimum scores (0–100) below which the decision machine
/// reacts. Safety/ethics breaches block; integrity/logic breaches warn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub safety: f64,
    pub ethics: f64,
    pub integrity: f64,
    pub logic: f64,
    pub personalization: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            safety: 85.0,
            ethics: 90.0,
            integrity: 80.0,
            logic: 75.0,
            personalization: 70.0,
        }
    }
}

/// Scorer phrase lists a policy document may override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternLists {
    pub harmful: Vec<String>,
    pub unethical: Vec<String>,
    pub dishonest: Vec<String>,
    pub positive: Vec<String>,
}

impl Default for PatternLists {
    fn default() -> Self {
        let list = |phrases: &[&str]| phrases.iter().map(|p| p.to_string()).collect();
        Self {
            harmful: list(&[
                "harm", "hurt", "attack", "kill", "destroy", "hate", "violence", "weapon", "bomb",
                "poison",
            ]),
            unethical: list(&[
                "cheat", "lie", "deceive", "manipulate", "exploit", "abuse", "steal", "fraud",
            ]),
            dishonest: list(&[
                "trust me",
                "believe me",
                "guarantee",
                "secret",
                "don't tell",
                "definitely",
            ]),
            positive: list(&[
                "help", "assist", "support", "understand", "because", "reason", "based on",
            ]),
        }
    }
}

/// One versioned policy document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub version: String,

    /// When false, faults propagate to the host instead of degrading to
    /// Block. Hosts that set this take over the safety obligation.
    pub fail_closed: bool,

    /// Minimum passing-check fraction for validator compliance.
    pub confidence_threshold: f64,

    /// Guard-level minimum confidence, distinct from the validator's
    /// compliance threshold. Results below it block with `uncertainty`.
    pub min_confidence: f64,

    /// Supervised pipeline deadline in milliseconds.
    pub timeout_ms: u64,

    pub thresholds: Thresholds,
    pub patterns: PatternLists,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            fail_closed: true,
            confidence_threshold: 0.8,
            min_confidence: 0.5,
            timeout_ms: 5_000,
            thresholds: Thresholds::default(),
            patterns: PatternLists::default(),
        }
    }
}

impl PolicyConfig {
    /// Parse a TOML policy document.
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Parse a JSON policy document.
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        serde_json::from_str(text).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Parse by extension (`.json` means JSON, anything else TOML).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_toml_str(&text),
        }
    }

    /// Load a policy document, substituting the built-in defaults on any
    /// failure. The failure is logged, not returned.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::from_path(path) {
            Ok(config) => config,
            Err(error) => {
                log::warn!(
                    "policy load failed for {}, using built-in defaults: {error}",
                    path.display()
                );
                Self::default()
            }
        }
    }
}

/// Hot-reloadable holder for the active policy snapshot.
pub struct PolicyStore {
    inner: RwLock<Arc<PolicyConfig>>,
}

impl PolicyStore {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    /// The current snapshot. Holders keep it valid across reloads.
    pub fn snapshot(&self) -> Arc<PolicyConfig> {
        Arc::clone(&self.inner.read())
    }

    /// Atomically replace the active snapshot.
    pub fn swap(&self, config: PolicyConfig) {
        *self.inner.write() = Arc::new(config);
    }

    /// Reload from a document path, keeping the previous snapshot if the
    /// document is malformed.
    pub fn reload_from_path(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let config = PolicyConfig::from_path(path)?;
        self.swap(config);
        Ok(())
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = PolicyConfig::default();
        assert_eq!(config.thresholds.safety, 85.0);
        assert_eq!(config.thresholds.ethics, 90.0);
        assert_eq!(config.thresholds.integrity, 80.0);
        assert_eq!(config.thresholds.logic, 75.0);
        assert_eq!(config.thresholds.personalization, 70.0);
        assert!(config.fail_closed);
        assert_eq!(config.confidence_threshold, 0.8);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config = PolicyConfig::from_toml_str(
            r#"
            version = "2.0.0"

            [thresholds]
            safety = 90.0
            "#,
        )
        .unwrap();
        assert_eq!(config.version, "2.0.0");
        assert_eq!(config.thresholds.safety, 90.0);
        // Untouched fields keep their defaults.
        assert_eq!(config.thresholds.ethics, 90.0);
        assert!(!config.patterns.harmful.is_empty());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = PolicyConfig::from_toml_str("thresholds = 12").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn load_or_default_falls_back_on_missing_file() {
        let config = PolicyConfig::load_or_default("/nonexistent/policy.toml");
        assert_eq!(config, PolicyConfig::default());
    }

    #[test]
    fn json_documents_parse_too() {
        let config =
            PolicyConfig::from_json_str(r#"{"fail_closed": false, "timeout_ms": 100}"#).unwrap();
        assert!(!config.fail_closed);
        assert_eq!(config.timeout_ms, 100);
    }

    #[test]
    fn store_snapshot_survives_swap() {
        let store = PolicyStore::default();
        let before = store.snapshot();

        let mut updated = PolicyConfig::default();
        updated.thresholds.safety = 99.0;
        store.swap(updated);

        // The old snapshot is unchanged; new readers see the swap.
        assert_eq!(before.thresholds.safety, 85.0);
        assert_eq!(store.snapshot().thresholds.safety, 99.0);
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let store = PolicyStore::default();
        let result = store.reload_from_path("/nonexistent/policy.toml");
        assert!(result.is_err());
        assert_eq!(store.snapshot().thresholds.safety, 85.0);
    }
}
