//! Canonical decision hashing.
//!
//! Two independent auditors replaying the same decisions MUST compute
//! identical hashes, so the hashed form is fully pinned down:
//!
//! 1. Build the canonical decision key (schema, id, action, scores,
//!    composite, compliant, input, output, timestamp)
//! 2. Serialize it RFC 8785 style: sorted keys, no whitespace,
//!    canonical numbers
//! 3. decisionHash = lowercase hex SHA-256 of those bytes
//! 4. linkHash = SHA256(previousLink || "|" || decisionHash), seeded
//!    from the genesis sentinel
//!
//! Latency and the guard's safe message are provenance, not substance;
//! they stay out of the hash.

use chrono::SecondsFormat;
use serde_json::Value;
use sha2::{Digest, Sha256};

use textgate_kernel::{Decision, Dimension};

/// Canonical key schema version. Bump when hashed fields change.
pub const HASH_SCHEMA: u64 = 1;

/// Sentinel the first link is computed from.
pub const GENESIS: &str = "genesis";

/// Separator between the previous link and the decision hash.
const LINK_SEPARATOR: &str = "|";

/// Lowercase hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// The canonical hash of one decision.
pub fn decision_hash(decision: &Decision) -> String {
    let key = canonical_decision_key(decision);
    sha256_hex(&canonical_serialize(&key))
}

/// The next chain link: hash of the previous link joined to the
/// decision hash. The first call passes [`GENESIS`] as `previous`.
pub fn chain_link(previous: &str, decision_hash: &str) -> String {
    sha256_hex(format!("{previous}{LINK_SEPARATOR}{decision_hash}").as_bytes())
}

/// Build the canonical decision key JSON object.
fn canonical_decision_key(decision: &Decision) -> Value {
    let mut scores = serde_json::Map::new();
    for dimension in Dimension::ALL {
        scores.insert(
            dimension.as_str().to_string(),
            number(decision.scores.get(dimension)),
        );
    }

    let mut map = serde_json::Map::new();
    map.insert("schema".to_string(), Value::Number(HASH_SCHEMA.into()));
    map.insert("id".to_string(), Value::String(decision.id.to_string()));
    map.insert(
        "action".to_string(),
        Value::String(decision.action.as_str().to_string()),
    );
    map.insert("scores".to_string(), Value::Object(scores));
    map.insert("composite".to_string(), number(decision.composite));
    map.insert(
        "compliant".to_string(),
        Value::Bool(decision.checks.compliant),
    );
    map.insert("input".to_string(), Value::String(decision.input.clone()));
    map.insert("output".to_string(), Value::String(decision.output.clone()));
    map.insert(
        "timestamp".to_string(),
        Value::String(
            decision
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    );
    Value::Object(map)
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Canonical JSON serialization: lexicographically sorted keys, no
/// whitespace, ES6-style numbers.
fn canonical_serialize(value: &Value) -> Vec<u8> {
    match value {
        Value::Null => b"null".to_vec(),
        Value::Bool(b) => {
            if *b {
                b"true".to_vec()
            } else {
                b"false".to_vec()
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                format!("{i}").into_bytes()
            } else if let Some(u) = n.as_u64() {
                format!("{u}").into_bytes()
            } else if let Some(f) = n.as_f64() {
                format!("{f}").into_bytes()
            } else {
                n.to_string().into_bytes()
            }
        }
        Value::String(_) => serde_json::to_vec(value).unwrap_or_default(),
        Value::Array(items) => {
            let mut buf = Vec::new();
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                buf.extend_from_slice(&canonical_serialize(item));
            }
            buf.push(b']');
            buf
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut buf = Vec::new();
            buf.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                buf.extend_from_slice(
                    &serde_json::to_vec(&Value::String((*key).clone())).unwrap_or_default(),
                );
                buf.push(b':');
                buf.extend_from_slice(&canonical_serialize(&map[*key]));
            }
            buf.push(b'}');
            buf
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textgate_kernel::Engine;

    fn decision() -> Decision {
        Engine::with_defaults()
            .unwrap()
            .evaluate("is it fine?", "It is fine.", None)
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn decision_hash_is_deterministic() {
        let d = decision();
        assert_eq!(decision_hash(&d), decision_hash(&d));
    }

    #[test]
    fn decision_hash_is_sensitive_to_output_text() {
        let mut a = decision();
        let hash_a = decision_hash(&a);
        a.output.push('!');
        assert_ne!(decision_hash(&a), hash_a);
    }

    #[test]
    fn decision_hash_ignores_latency() {
        let mut d = decision();
        let before = decision_hash(&d);
        d.latency_ms += 1234.0;
        assert_eq!(decision_hash(&d), before);
    }

    #[test]
    fn chain_link_is_order_sensitive() {
        let a = chain_link(GENESIS, "aaaa");
        let b = chain_link(GENESIS, "bbbb");
        assert_ne!(a, b);
        assert_ne!(chain_link(&a, "bbbb"), chain_link(&b, "aaaa"));
    }

    #[test]
    fn canonical_key_sorts_lexicographically() {
        let d = decision();
        let key = canonical_decision_key(&d);
        let text = String::from_utf8(canonical_serialize(&key)).unwrap();
        let action = text.find("\"action\"").unwrap();
        let compliant = text.find("\"compliant\"").unwrap();
        let composite = text.find("\"composite\"").unwrap();
        let schema = text.find("\"schema\"").unwrap();
        assert!(action < compliant);
        assert!(compliant < composite);
        assert!(composite < schema);
        assert!(!text.contains(' '));
    }
}
