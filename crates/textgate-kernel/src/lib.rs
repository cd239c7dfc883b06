//! # Textgate Kernel
//!
//! Deterministic policy enforcement between a text generator and its
//! consumer. Every candidate output passes through one pipeline before
//! release, and the pipeline is fail-closed: any fault, timeout, or
//! uncertain result degrades to a Block decision, never to silence.
//!
//! ## Architecture
//!
//! ```text
//! PatternCatalog         ← Versioned phrase lists and weights
//!     │
//! Scorer                 ← Five 0–100 dimension scores + violations
//!     │
//! Validator              ← Truth / Honesty / Transparency checks
//!     │
//! decide                 ← Priority-ordered rules → Action
//!     │
//! Engine (guard)         ← Deadline, panic capture, uncertainty floor
//! ```
//!
//! Scoring is pure: the same text, context, and policy always produce
//! the same `Decision` fields apart from id, latency, and timestamp.

pub mod catalog;
pub mod config;
pub mod error;
pub mod guard;
pub mod policy;
pub mod score;
pub mod validate;

pub use catalog::{CATALOG_VERSION, PatternCatalog, PatternRule};
pub use config::{PatternLists, PolicyConfig, PolicyStore, Thresholds};
pub use error::EngineError;
pub use guard::{Engine, FailClosedReason, SAFE_DECLINE_MESSAGE, Supervised, supervise};
pub use policy::{Action, CRITICAL_FLOOR, Decision, Severity, Violation, decide};
pub use score::{Dimension, DimensionScores, ScoreReport, Scorer};
pub use validate::{Check, TRANSPARENCY_MIN_CHARS, ValidationReport, Validator};
