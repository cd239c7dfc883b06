use std::collections::BTreeMap;

use textgate_kernel::{Action, Engine, PolicyConfig};

/// Build an engine from an optional policy path. A missing or malformed
/// document falls back to the built-in defaults; a broken catalog is a
/// hard error.
pub fn engine_or_exit(policy: Option<&str>) -> Engine {
    let config = match policy {
        Some(path) => PolicyConfig::load_or_default(path),
        None => PolicyConfig::default(),
    };
    Engine::new(config).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

/// Parse repeatable `key=value` context arguments.
pub fn parse_context_or_exit(entries: &[String]) -> Option<BTreeMap<String, String>> {
    if entries.is_empty() {
        return None;
    }
    let mut map = BTreeMap::new();
    for entry in entries {
        match entry.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                map.insert(key.to_string(), value.to_string());
            }
            _ => {
                eprintln!("error: context entry must be key=value, got {entry:?}");
                std::process::exit(1);
            }
        }
    }
    Some(map)
}

pub fn parse_action_or_exit(action: &str) -> Action {
    action.parse().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

pub fn print_json_pretty(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("json serialization")
    );
}
