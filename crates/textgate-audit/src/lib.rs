//! # Textgate Audit
//!
//! Tamper-evident audit trail for policy decisions.
//!
//! Each decision is reduced to a canonical hash and appended to a
//! SHA-256 link chain seeded from a genesis sentinel. Editing, removing,
//! or reordering any historical record breaks every link after it, and
//! an external auditor can re-verify an exported window with nothing but
//! the anchor link and the records themselves.
//!
//! ```text
//! Decision ──decision_hash──▶ AuditRecord ──chain_link──▶ tail
//!                                  │
//!                              JSONL file (one record per line)
//! ```

pub mod chain;
pub mod error;
pub mod hash;
pub mod jsonl;

pub use chain::{
    AuditChain, AuditRecord, DEFAULT_CAPACITY, ExportFilter, LinkMismatch, VerifyReport,
    verify_window,
};
pub use error::AuditError;
pub use hash::{GENESIS, HASH_SCHEMA, chain_link, decision_hash, sha256_hex};
pub use jsonl::{read_records, read_records_from_path, write_records, write_records_to_path};
