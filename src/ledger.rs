use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{member::MemberId, resource::ResourceId, timestamp::TimeStamp};

/// Identifier of a ledger entry, assigned in strictly increasing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Raw sequence number
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TX{}", self.0)
    }
}

/// What a ledger entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum TransactionKind {
    /// A copy was lent
    Borrow,
    /// A copy came back
    Return,
}

/// An immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Transaction {
    /// Entry identifier
    pub id: TransactionId,
    /// Borrow or return
    pub kind: TransactionKind,
    /// When the entry was recorded
    pub timestamp: TimeStamp,
    /// Member involved
    pub member: MemberId,
    /// Resource involved
    pub resource: ResourceId,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} {} -> {} at {}", self.id, self.kind, self.member, self.resource, self.timestamp)
    }
}

/// Append-only record of borrow and return events
///
/// Ids come from a dedicated counter rather than the number of stored
/// entries, so they stay unique if the storage is ever compacted. The id is
/// drawn while the write lock is held, which keeps the stored order equal to
/// id order.
#[derive(Debug)]
pub struct TransactionLedger {
    /// Next id to hand out
    next_id: CachePadded<AtomicU64>,
    /// Entries in id order
    entries: RwLock<Vec<Transaction>>,
}

impl Default for TransactionLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionLedger {
    /// Create an empty ledger whose first id is 1
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: CachePadded::new(AtomicU64::new(1)), entries: RwLock::new(Vec::new()) }
    }

    /// Append an entry and return its id
    pub fn record(
        &self,
        kind: TransactionKind,
        member: &MemberId,
        resource: &ResourceId,
    ) -> TransactionId {
        let mut entries = self.entries.write();
        let id = TransactionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        entries.push(Transaction {
            id,
            kind,
            timestamp: TimeStamp::now(),
            member: member.clone(),
            resource: resource.clone(),
        });
        id
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing has been recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of every entry, oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<Transaction> {
        self.entries.read().clone()
    }

    /// Look up one entry
    #[must_use]
    pub fn get(&self, id: TransactionId) -> Option<Transaction> {
        let entries = self.entries.read();
        entries.binary_search_by_key(&id, |t| t.id).ok().and_then(|i| entries.get(i).cloned())
    }

    /// Most recent entry
    #[must_use]
    pub fn last(&self) -> Option<Transaction> {
        self.entries.read().last().cloned()
    }

    /// Entries involving `member`, oldest first
    #[must_use]
    pub fn for_member(&self, member: &str) -> Vec<Transaction> {
        self.entries.read().iter().filter(|t| t.member.as_str() == member).cloned().collect()
    }

    /// Entries involving `resource`, oldest first
    #[must_use]
    pub fn for_resource(&self, resource: &str) -> Vec<Transaction> {
        self.entries.read().iter().filter(|t| t.resource.as_str() == resource).cloned().collect()
    }
}
