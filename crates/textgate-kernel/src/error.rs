//! Error types for the Textgate evaluation pipeline.

/// Errors arising inside one evaluation.
///
/// None of these escape `Engine::evaluate` — the guard converts every
/// variant into a Block decision. `try_evaluate` propagates them for
/// hosts that disable fail-closed mode.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A required field was empty or missing.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A policy document could not be parsed. Recovered at load time by
    /// falling back to the built-in default policy.
    #[error("policy configuration error: {0}")]
    Config(String),

    /// The supervised pipeline exceeded its deadline.
    #[error("evaluation timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Any unexpected computation fault (including a captured panic).
    #[error("internal fault: {0}")]
    Internal(String),
}
