//! Fail-closed execution guard.
//!
//! `supervise` runs a closure on a worker thread under a deadline and
//! with panic capture; a result that arrives after the deadline is
//! discarded, never partially merged. `Engine` wraps the whole
//! scorer → validator → decision pipeline behind that guard: every
//! fault, timeout, invalid input, or low-confidence result degrades to
//! a Block decision. This is the single place where "unknown" becomes
//! "unsafe"; nothing else defaults to Allow.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::PatternCatalog;
use crate::config::{PolicyConfig, PolicyStore};
use crate::error::EngineError;
use crate::policy::{Action, Decision, Severity, Violation, decide};
use crate::score::{DimensionScores, ScoreReport, Scorer};
use crate::validate::{ValidationReport, Validator};

/// Generic decline text returned to the untrusted caller on any
/// fail-closed path. Diagnostics go to the log, never into this.
pub const SAFE_DECLINE_MESSAGE: &str =
    "I'm unable to process that request at this time. Please try again or rephrase it.";

/// Why the guard substituted a Block decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailClosedReason {
    Exception,
    Timeout,
    InvalidInput,
    Uncertainty,
}

impl FailClosedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailClosedReason::Exception => "exception",
            FailClosedReason::Timeout => "timeout",
            FailClosedReason::InvalidInput => "invalid_input",
            FailClosedReason::Uncertainty => "uncertainty",
        }
    }
}

/// Outcome of a supervised computation.
#[derive(Debug)]
pub enum Supervised<T> {
    Completed(T),
    TimedOut,
    Faulted(String),
}

/// Run `f` on a worker thread with a deadline and panic capture.
///
/// Once the deadline fires the receiver is dropped; a result the worker
/// produces later has nowhere to go and is discarded.
pub fn supervise<T, F>(timeout: Duration, f: F) -> Supervised<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(f));
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(value)) => Supervised::Completed(value),
        Ok(Err(payload)) => Supervised::Faulted(panic_message(payload)),
        Err(_) => Supervised::TimedOut,
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// The evaluation entry point the host calls.
///
/// Owns the validator (fixed phrase sets) and the hot-reloadable policy
/// store. Stateless per call: safe to share across threads.
pub struct Engine {
    store: PolicyStore,
    validator: Arc<Validator>,
}

impl Engine {
    pub fn new(config: PolicyConfig) -> Result<Self, EngineError> {
        let validator = Arc::new(Validator::new(&PatternCatalog::builtin())?);
        Ok(Self {
            store: PolicyStore::new(config),
            validator,
        })
    }

    /// Engine over the built-in default policy.
    pub fn with_defaults() -> Result<Self, EngineError> {
        Self::new(PolicyConfig::default())
    }

    /// The active policy snapshot.
    pub fn policy(&self) -> Arc<PolicyConfig> {
        self.store.snapshot()
    }

    /// Atomically swap the active policy. In-flight evaluations finish
    /// on the snapshot they started with.
    pub fn reload(&self, config: PolicyConfig) {
        self.store.swap(config);
    }

    /// Evaluate a candidate output, fail-closed. Never panics past this
    /// boundary and never returns an error: any abnormal condition
    /// yields a Block decision.
    pub fn evaluate(
        &self,
        input: &str,
        output: &str,
        context: Option<&BTreeMap<String, String>>,
    ) -> Decision {
        let started = Instant::now();
        // One snapshot covers the whole evaluation, pipeline and
        // uncertainty floor alike; a reload mid-call waits its turn.
        let config = self.store.snapshot();

        match self.try_evaluate_with(&config, input, output, context) {
            Ok(decision) => self.apply_uncertainty_floor(decision, &config),
            Err(error) => {
                log::error!("fail-closed evaluation fault: {error}");
                let reason = match &error {
                    EngineError::InvalidInput(_) => FailClosedReason::InvalidInput,
                    EngineError::Timeout { .. } => FailClosedReason::Timeout,
                    _ => FailClosedReason::Exception,
                };
                blocked_decision(input, output, reason, started.elapsed())
            }
        }
    }

    /// The unguarded pipeline: propagates faults instead of converting
    /// them. For hosts that set `fail_closed = false` and take over the
    /// safety obligation themselves.
    pub fn try_evaluate(
        &self,
        input: &str,
        output: &str,
        context: Option<&BTreeMap<String, String>>,
    ) -> Result<Decision, EngineError> {
        let config = self.store.snapshot();
        self.try_evaluate_with(&config, input, output, context)
    }

    fn try_evaluate_with(
        &self,
        config: &Arc<PolicyConfig>,
        input: &str,
        output: &str,
        context: Option<&BTreeMap<String, String>>,
    ) -> Result<Decision, EngineError> {
        let started = Instant::now();

        if input.trim().is_empty() {
            return Err(EngineError::InvalidInput("input text is empty".to_string()));
        }
        if output.trim().is_empty() {
            return Err(EngineError::InvalidInput(
                "candidate output is empty".to_string(),
            ));
        }

        let text = output.to_string();
        let ctx = context.cloned();
        let validator = Arc::clone(&self.validator);
        let snapshot = Arc::clone(config);

        let outcome = supervise(Duration::from_millis(config.timeout_ms), move || {
            run_pipeline(&snapshot, &validator, &text, ctx.as_ref())
        });

        let (report, checks, action, justification) = match outcome {
            Supervised::Completed(parts) => parts,
            Supervised::TimedOut => {
                return Err(EngineError::Timeout {
                    timeout_ms: config.timeout_ms,
                });
            }
            Supervised::Faulted(message) => return Err(EngineError::Internal(message)),
        };

        Ok(Decision {
            id: Uuid::new_v4(),
            input: input.to_string(),
            output: output.to_string(),
            action,
            scores: report.dimensions,
            composite: report.composite,
            checks,
            violations: report.violations,
            justification,
            fail_closed_reason: None,
            safe_message: None,
            latency_ms: elapsed_ms(started),
            timestamp: Utc::now(),
        })
    }

    /// Guard-level uncertainty rule: a result whose confidence is below
    /// the configured minimum blocks, whatever the pipeline decided.
    /// An existing Block keeps its stronger justification.
    fn apply_uncertainty_floor(&self, mut decision: Decision, config: &PolicyConfig) -> Decision {
        if decision.action != Action::Block && decision.checks.confidence < config.min_confidence {
            log::warn!(
                "fail-closed: confidence {:.2} below guard minimum {:.2}",
                decision.checks.confidence,
                config.min_confidence
            );
            decision.action = Action::Block;
            decision.fail_closed_reason = Some(FailClosedReason::Uncertainty);
            decision.justification = format!(
                "Result confidence {:.2} below guard minimum {:.2}",
                decision.checks.confidence, config.min_confidence
            );
            decision.safe_message = Some(SAFE_DECLINE_MESSAGE.to_string());
        }
        decision
    }
}

type PipelineParts = (ScoreReport, ValidationReport, Action, String);

fn run_pipeline(
    config: &PolicyConfig,
    validator: &Validator,
    text: &str,
    context: Option<&BTreeMap<String, String>>,
) -> PipelineParts {
    let scorer = Scorer::new(PatternCatalog::from_config(config));
    let report = scorer.score(text, context);
    let checks = validator.validate(text, config.confidence_threshold);
    let (action, justification) = decide(&report.dimensions, &checks, &report.violations, config);
    (report, checks, action, justification)
}

/// The substituted decision for any fail-closed path: zeroed scores,
/// nothing verified, a generic justification. Fault details are logged
/// by the caller, not carried here.
fn blocked_decision(
    input: &str,
    output: &str,
    reason: FailClosedReason,
    elapsed: Duration,
) -> Decision {
    Decision {
        id: Uuid::new_v4(),
        input: input.to_string(),
        output: output.to_string(),
        action: Action::Block,
        scores: DimensionScores::zeroed(),
        composite: 0.0,
        checks: ValidationReport::fail_closed(),
        violations: vec![Violation::new("guard", "system_error", Severity::Critical)],
        justification: format!("Fail-closed: evaluation did not complete ({})", reason.as_str()),
        fail_closed_reason: Some(reason),
        safe_message: Some(SAFE_DECLINE_MESSAGE.to_string()),
        latency_ms: elapsed.as_secs_f64() * 1000.0,
        timestamp: Utc::now(),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supervise_returns_completed_result() {
        let outcome = supervise(Duration::from_secs(1), || 21 * 2);
        assert!(matches!(outcome, Supervised::Completed(42)));
    }

    #[test]
    fn supervise_times_out_and_discards_late_result() {
        let outcome: Supervised<u32> = supervise(Duration::from_millis(5), || {
            thread::sleep(Duration::from_millis(200));
            7
        });
        assert!(matches!(outcome, Supervised::TimedOut));
    }

    #[test]
    fn supervise_captures_panics() {
        let outcome: Supervised<()> =
            supervise(Duration::from_secs(1), || panic!("deliberate fault"));
        match outcome {
            Supervised::Faulted(message) => assert!(message.contains("deliberate fault")),
            other => panic!("expected Faulted, got {other:?}"),
        }
    }

    #[test]
    fn empty_output_blocks_with_invalid_input() {
        let engine = Engine::with_defaults().unwrap();
        let decision = engine.evaluate("tell me something", "   ", None);
        assert_eq!(decision.action, Action::Block);
        assert_eq!(
            decision.fail_closed_reason,
            Some(FailClosedReason::InvalidInput)
        );
        assert_eq!(decision.safe_message.as_deref(), Some(SAFE_DECLINE_MESSAGE));
        // Diagnostics stay out of caller-visible text.
        assert!(!decision.justification.contains("empty"));
    }

    #[test]
    fn zero_timeout_blocks_with_timeout_reason() {
        let mut config = PolicyConfig::default();
        config.timeout_ms = 0;
        let engine = Engine::new(config).unwrap();
        let decision = engine.evaluate("q", "a perfectly ordinary answer", None);
        assert_eq!(decision.action, Action::Block);
        assert_eq!(decision.fail_closed_reason, Some(FailClosedReason::Timeout));
    }

    #[test]
    fn low_confidence_result_blocks_with_uncertainty() {
        let engine = Engine::with_defaults().unwrap();
        // Truth and honesty both fail; transparency is exempt (short).
        // Confidence 1/3 is under the guard minimum of 0.5.
        let decision = engine.evaluate(
            "is it right?",
            "Trust me on this, it is definitely correct",
            None,
        );
        assert_eq!(decision.action, Action::Block);
        assert_eq!(
            decision.fail_closed_reason,
            Some(FailClosedReason::Uncertainty)
        );
        // The pipeline's real scores survive on the decision.
        assert!(decision.scores.integrity < 80.0);
    }

    #[test]
    fn try_evaluate_propagates_invalid_input() {
        let engine = Engine::with_defaults().unwrap();
        let error = engine.try_evaluate("", "some output", None).unwrap_err();
        assert!(matches!(error, EngineError::InvalidInput(_)));
    }

    #[test]
    fn uncertainty_floor_shares_the_pipeline_snapshot() {
        // Truth fails, the other checks pass: confidence 2/3. The same
        // snapshot must drive both the threshold rules and the floor.
        let text = "The results are definitely solid because the benchmark covers every case";

        let mut strict = PolicyConfig::default();
        strict.min_confidence = 0.9;
        let engine = Engine::new(strict).unwrap();
        let blocked = engine.evaluate("q", text, None);
        assert_eq!(blocked.action, Action::Block);
        assert_eq!(
            blocked.fail_closed_reason,
            Some(FailClosedReason::Uncertainty)
        );

        let mut relaxed = PolicyConfig::default();
        relaxed.min_confidence = 0.2;
        engine.reload(relaxed);
        let warned = engine.evaluate("q", text, None);
        assert_eq!(warned.action, Action::Warn);
        assert!(warned.fail_closed_reason.is_none());
    }

    #[test]
    fn reload_applies_to_later_evaluations() {
        let engine = Engine::with_defaults().unwrap();
        let text = "The plan should work because the rollout is staged carefully";
        let before = engine.evaluate("q", text, None);
        assert_eq!(before.action, Action::Allow);

        let mut strict = PolicyConfig::default();
        strict.thresholds.logic = 100.0;
        engine.reload(strict);

        let after = engine.evaluate("q", text, None);
        assert_eq!(after.action, Action::Warn);
    }
}
