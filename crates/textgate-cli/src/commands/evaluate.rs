use std::path::Path;

use textgate_audit::{AuditChain, GENESIS, read_records_from_path, write_records_to_path};
use textgate_kernel::{Action, Decision};

use crate::support::{engine_or_exit, parse_context_or_exit, print_json_pretty};

/// Exit code for a blocked evaluation.
const EXIT_BLOCKED: i32 = 2;

pub struct Args {
    pub input: String,
    pub output: String,
    pub policy: Option<String>,
    pub audit: Option<String>,
    pub context: Vec<String>,
    pub json: bool,
}

pub fn run(args: Args) {
    let engine = engine_or_exit(args.policy.as_deref());
    let context = parse_context_or_exit(&args.context);

    let decision = if engine.policy().fail_closed {
        engine.evaluate(&args.input, &args.output, context.as_ref())
    } else {
        engine
            .try_evaluate(&args.input, &args.output, context.as_ref())
            .unwrap_or_else(|e| {
                eprintln!("error: {e}");
                std::process::exit(1);
            })
    };

    let record = args
        .audit
        .as_deref()
        .map(|path| append_to_log_or_exit(path, &decision));

    if args.json {
        let mut payload = serde_json::to_value(&decision).expect("json serialization");
        if let (Some(record), Some(map)) = (&record, payload.as_object_mut()) {
            map.insert(
                "auditRecord".to_string(),
                serde_json::to_value(record).expect("json serialization"),
            );
        }
        print_json_pretty(&payload);
    } else {
        print_decision(&decision);
        if let Some(record) = &record {
            println!("  Audit: sequence {} link {}", record.sequence_id, record.link_hash);
        }
    }

    if decision.action == Action::Block {
        std::process::exit(EXIT_BLOCKED);
    }
}

/// Rebuild the chain from the log file, append, and write it back. A log
/// that no longer verifies from genesis is refused, not extended.
///
/// The file-backed chain is unbounded: the log always carries its full
/// history from genesis, so a later run can re-anchor there. Retention
/// is the host's concern, applied via `audit export`, not silently here.
fn append_to_log_or_exit(path: &str, decision: &Decision) -> textgate_audit::AuditRecord {
    let existing = if Path::new(path).exists() {
        read_records_from_path(path).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            std::process::exit(1);
        })
    } else {
        Vec::new()
    };

    let chain = AuditChain::hydrate(GENESIS, existing, usize::MAX).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    let record = chain.append(decision);

    write_records_to_path(path, &chain.records()).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    record
}

fn print_decision(decision: &Decision) {
    println!("textgate evaluate");
    println!("  Action: {}", decision.action.as_str());
    println!("  Justification: {}", decision.justification);
    println!(
        "  Scores: safety {:.1}, personalization {:.1}, integrity {:.1}, ethics {:.1}, logic {:.1}",
        decision.scores.safety,
        decision.scores.personalization,
        decision.scores.integrity,
        decision.scores.ethics,
        decision.scores.logic,
    );
    println!("  Composite: {:.2}", decision.composite);
    println!(
        "  Checks: truth {}, honesty {}, transparency {} (confidence {:.2})",
        decision.checks.truth,
        decision.checks.honesty,
        decision.checks.transparency,
        decision.checks.confidence,
    );
    for violation in &decision.violations {
        println!("  Violation [{}]: {}", violation.source, violation.detail);
    }
    for advice in decision.checks.recommendations() {
        println!("  Advice: {advice}");
    }
    if let Some(reason) = decision.fail_closed_reason {
        println!("  Fail-closed: {}", reason.as_str());
    }
    if let Some(message) = &decision.safe_message {
        println!("  Safe message: {message}");
    }
}
