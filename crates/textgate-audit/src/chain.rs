//! The tamper-evident decision chain.
//!
//! Every decision appends one record whose link hash commits to the
//! entire history before it. The chain keeps a bounded in-memory window;
//! when a record is evicted the anchor advances to its link hash, so the
//! retained suffix stays independently verifiable.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use textgate_kernel::{Action, Decision};

use crate::error::AuditError;
use crate::hash::{GENESIS, chain_link, decision_hash};

/// How many records the in-memory window retains by default.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// One link of the chain. Append-only: records are never edited after
/// creation, only evicted from the head of the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Monotonic position in the chain, never reused.
    pub sequence_id: u64,
    /// Id of the decision this record commits to.
    pub decision_id: String,
    pub action: Action,
    /// Canonical hash of the decision itself.
    pub decision_hash: String,
    /// Hash of the previous link joined to `decision_hash`.
    pub link_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A mismatch found while recomputing the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMismatch {
    pub sequence_id: u64,
    pub expected: String,
    pub computed: String,
}

/// Outcome of one verification pass over a window of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReport {
    pub valid: bool,
    pub records_checked: usize,
    pub first_sequence: Option<u64>,
    pub last_sequence: Option<u64>,
    /// Tail link recomputed from the anchor.
    pub computed_tail: String,
    /// Externally supplied tail to compare against, when given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_tail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<LinkMismatch>,
}

/// Selection criteria for exporting records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportFilter {
    /// Lowest sequence id to include.
    pub from: Option<u64>,
    /// Highest sequence id to include.
    pub to: Option<u64>,
    pub action: Option<Action>,
}

impl ExportFilter {
    /// Whether `record` falls inside this selection.
    pub fn accepts(&self, record: &AuditRecord) -> bool {
        if let Some(from) = self.from
            && record.sequence_id < from
        {
            return false;
        }
        if let Some(to) = self.to
            && record.sequence_id > to
        {
            return false;
        }
        if let Some(action) = self.action
            && record.action != action
        {
            return false;
        }
        true
    }
}

#[derive(Debug)]
struct ChainState {
    records: VecDeque<AuditRecord>,
    /// Link value immediately before the oldest retained record;
    /// [`GENESIS`] until the first eviction.
    anchor_link: String,
    /// Link of the newest record, or the anchor when empty.
    tail_link: String,
    next_sequence: u64,
}

/// Bounded, thread-safe chain of audit records.
#[derive(Debug)]
pub struct AuditChain {
    capacity: usize,
    state: Mutex<ChainState>,
}

impl AuditChain {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(ChainState {
                records: VecDeque::new(),
                anchor_link: GENESIS.to_string(),
                tail_link: GENESIS.to_string(),
                next_sequence: 0,
            }),
        }
    }

    /// Rebuild a chain from previously exported records. The window is
    /// verified against `anchor` before it is accepted.
    pub fn hydrate(
        anchor: &str,
        records: Vec<AuditRecord>,
        capacity: usize,
    ) -> Result<Self, AuditError> {
        let report = verify_window(anchor, &records, None);
        if let Some(mismatch) = report.mismatch {
            return Err(AuditError::TamperDetected {
                sequence_id: mismatch.sequence_id,
                expected: mismatch.expected,
                computed: mismatch.computed,
            });
        }

        let tail_link = records
            .last()
            .map(|r| r.link_hash.clone())
            .unwrap_or_else(|| anchor.to_string());
        let next_sequence = records.last().map(|r| r.sequence_id + 1).unwrap_or(0);

        Ok(Self {
            capacity: capacity.max(1),
            state: Mutex::new(ChainState {
                records: records.into(),
                anchor_link: anchor.to_string(),
                tail_link,
                next_sequence,
            }),
        })
    }

    /// Append a decision, returning the new record.
    pub fn append(&self, decision: &Decision) -> AuditRecord {
        let mut state = self.state.lock();

        let decision_hash = decision_hash(decision);
        let link_hash = chain_link(&state.tail_link, &decision_hash);
        let record = AuditRecord {
            sequence_id: state.next_sequence,
            decision_id: decision.id.to_string(),
            action: decision.action,
            decision_hash,
            link_hash: link_hash.clone(),
            created_at: Utc::now(),
        };

        state.next_sequence += 1;
        state.tail_link = link_hash;
        state.records.push_back(record.clone());

        if state.records.len() > self.capacity
            && let Some(evicted) = state.records.pop_front()
        {
            // The suffix after the evicted record verifies from its link.
            state.anchor_link = evicted.link_hash;
            log::debug!("audit window full, evicted sequence {}", evicted.sequence_id);
        }

        record
    }

    /// Recompute every retained link from the anchor.
    pub fn verify(&self) -> VerifyReport {
        let state = self.state.lock();
        let records: Vec<AuditRecord> = state.records.iter().cloned().collect();
        verify_window(&state.anchor_link, &records, Some(&state.tail_link))
    }

    /// Records matching the filter, in sequence order.
    pub fn export(&self, filter: &ExportFilter) -> Vec<AuditRecord> {
        let state = self.state.lock();
        state
            .records
            .iter()
            .filter(|r| filter.accepts(r))
            .cloned()
            .collect()
    }

    /// All retained records, in sequence order.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.export(&ExportFilter::default())
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Link of the newest record; share this out-of-band so a reader can
    /// detect truncation of the log file.
    pub fn tail_link(&self) -> String {
        self.state.lock().tail_link.clone()
    }

    /// Link value the retained window verifies from.
    pub fn anchor_link(&self) -> String {
        self.state.lock().anchor_link.clone()
    }
}

impl Default for AuditChain {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Recompute a window of records from `anchor` and compare every link.
///
/// An empty window is valid; its computed tail is the anchor itself.
/// When `expected_tail` is given, the recomputed tail must match it too,
/// which catches truncation of the newest records.
pub fn verify_window(
    anchor: &str,
    records: &[AuditRecord],
    expected_tail: Option<&str>,
) -> VerifyReport {
    let mut previous = anchor.to_string();
    let mut mismatch = None;

    for record in records {
        let computed = chain_link(&previous, &record.decision_hash);
        if computed != record.link_hash {
            log::warn!(
                "audit chain mismatch at sequence {}",
                record.sequence_id
            );
            mismatch = Some(LinkMismatch {
                sequence_id: record.sequence_id,
                expected: record.link_hash.clone(),
                computed,
            });
            break;
        }
        previous = record.link_hash.clone();
    }

    let computed_tail = previous;
    let tail_matches = expected_tail.is_none_or(|t| t == computed_tail);
    let valid = mismatch.is_none() && tail_matches;

    VerifyReport {
        valid,
        records_checked: records.len(),
        first_sequence: records.first().map(|r| r.sequence_id),
        last_sequence: records.last().map(|r| r.sequence_id),
        computed_tail,
        expected_tail: expected_tail.map(|t| t.to_string()),
        mismatch,
    }
}
