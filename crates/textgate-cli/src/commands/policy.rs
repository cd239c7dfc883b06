use serde_json::json;
use textgate_kernel::PolicyConfig;

use crate::support::print_json_pretty;

pub fn run_check(path: Option<String>, json_output: bool) {
    let (config, source) = match path.as_deref() {
        Some(path) => {
            let config = PolicyConfig::from_path(path).unwrap_or_else(|e| {
                eprintln!("error: {e}");
                std::process::exit(1);
            });
            (config, path.to_string())
        }
        None => (PolicyConfig::default(), "built-in defaults".to_string()),
    };

    if json_output {
        let payload = json!({
            "source": source,
            "policy": config,
        });
        print_json_pretty(&payload);
    } else {
        println!("textgate policy check");
        println!("  Source: {source}");
        println!("  Version: {}", config.version);
        println!("  Fail closed: {}", config.fail_closed);
        println!("  Timeout: {} ms", config.timeout_ms);
        println!(
            "  Confidence: compliance {:.2}, guard minimum {:.2}",
            config.confidence_threshold, config.min_confidence
        );
        println!(
            "  Thresholds: safety {}, ethics {}, integrity {}, logic {}, personalization {}",
            config.thresholds.safety,
            config.thresholds.ethics,
            config.thresholds.integrity,
            config.thresholds.logic,
            config.thresholds.personalization,
        );
        println!(
            "  Patterns: {} harmful, {} unethical, {} dishonest, {} positive",
            config.patterns.harmful.len(),
            config.patterns.unethical.len(),
            config.patterns.dishonest.len(),
            config.patterns.positive.len(),
        );
    }
}
