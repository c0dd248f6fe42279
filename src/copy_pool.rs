use std::fmt;

use serde::{Deserialize, Serialize};

/// Damage count past which a copy is withdrawn instead of repaired
pub const REPAIR_THRESHOLD: u32 = 5;

/// Identifier of a physical copy, unique within its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct CopyId(u32);

impl CopyId {
    /// Raw sequence number of the copy
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for CopyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{}", self.0)
    }
}

/// One lendable unit of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PhysicalCopy {
    /// Identifier within the owning pool
    id: CopyId,
    /// Whether the copy is on the shelf
    available: bool,
    /// Whether the copy came back damaged and awaits repair
    damaged: bool,
    /// How many times the copy has been returned damaged
    damage_count: u32,
}

impl PhysicalCopy {
    /// Create a fresh, available, undamaged copy
    fn new(id: CopyId) -> Self {
        Self { id, available: true, damaged: false, damage_count: 0 }
    }

    /// Identifier of this copy
    #[must_use]
    pub fn id(&self) -> CopyId {
        self.id
    }

    /// Whether the copy can be lent right now
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Whether the copy is flagged as damaged
    #[must_use]
    pub fn is_damaged(&self) -> bool {
        self.damaged
    }

    /// Lifetime number of damaged returns
    #[must_use]
    pub fn damage_count(&self) -> u32 {
        self.damage_count
    }
}

/// Result of asking the pool to repair one copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum CopyRepair {
    /// The copy was not damaged; nothing changed
    Untouched,
    /// The damage flag was cleared; the copy rejoins the shelf on its next return
    Cleared,
    /// The copy was past the threshold and has been withdrawn for good
    Removed,
    /// No copy with that id exists in the pool
    NotFound,
}

/// Ordered collection of the physical copies of one resource
///
/// Copies are kept in creation order, which makes "first available" lending
/// deterministic. Every copy is either available or borrowed; damaged copies
/// count as borrowed until they are repaired and released.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CopyPool {
    /// Copies in creation order
    copies: Vec<PhysicalCopy>,
    /// Sequence number handed to the next copy
    next_id: u32,
}

impl CopyPool {
    /// Create a pool holding `count` fresh copies
    #[must_use]
    pub fn with_copies(count: u32) -> Self {
        let mut pool = Self::default();
        for _ in 0..count {
            pool.add_copy();
        }
        pool
    }

    /// Append a fresh available, undamaged copy
    pub fn add_copy(&mut self) -> CopyId {
        let id = CopyId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.copies.push(PhysicalCopy::new(id));
        id
    }

    /// Claim the first available copy in creation order
    ///
    /// Returns `None` without touching the pool when every copy is out.
    pub fn claim_first_available(&mut self) -> Option<CopyId> {
        let copy = self.copies.iter_mut().find(|c| c.available)?;
        copy.available = false;
        Some(copy.id)
    }

    /// Put a copy back on the shelf unless it is flagged as damaged
    ///
    /// Returns `false` when the copy is not part of this pool.
    pub fn release(&mut self, id: CopyId) -> bool {
        match self.copy_mut(id) {
            Some(copy) => {
                if !copy.damaged {
                    copy.available = true;
                }
                true
            }
            None => false,
        }
    }

    /// Flag a copy as damaged and bump its damage counter
    ///
    /// The copy is also taken off the shelf, so it cannot be lent until it
    /// has been repaired and released again.
    pub fn mark_damaged(&mut self, id: CopyId) -> bool {
        match self.copy_mut(id) {
            Some(copy) => {
                copy.damaged = true;
                copy.available = false;
                copy.damage_count = copy.damage_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Repair a damaged copy, withdrawing it if its damage count exceeds `threshold`
    pub fn repair(&mut self, id: CopyId, threshold: u32) -> CopyRepair {
        let Some(index) = self.copies.iter().position(|c| c.id == id) else {
            return CopyRepair::NotFound;
        };
        let Some(copy) = self.copies.get_mut(index) else {
            return CopyRepair::NotFound;
        };
        if !copy.damaged {
            return CopyRepair::Untouched;
        }
        if copy.damage_count <= threshold {
            copy.damaged = false;
            CopyRepair::Cleared
        } else {
            self.copies.remove(index);
            CopyRepair::Removed
        }
    }

    /// Clear a damaged copy and put it back on the shelf, whatever its damage count
    ///
    /// Returns `false` for unknown or undamaged copies.
    pub fn restore(&mut self, id: CopyId) -> bool {
        match self.copy_mut(id) {
            Some(copy) if copy.damaged => {
                copy.damaged = false;
                copy.available = true;
                true
            }
            _ => false,
        }
    }

    /// Look up a copy by id
    #[must_use]
    pub fn get(&self, id: CopyId) -> Option<&PhysicalCopy> {
        self.copies.iter().find(|c| c.id == id)
    }

    /// Mutable lookup by id
    fn copy_mut(&mut self, id: CopyId) -> Option<&mut PhysicalCopy> {
        self.copies.iter_mut().find(|c| c.id == id)
    }

    /// Iterate over the copies in creation order
    pub fn iter(&self) -> impl Iterator<Item = &PhysicalCopy> {
        self.copies.iter()
    }

    /// Ids of every copy currently flagged as damaged
    #[must_use]
    pub fn damaged_ids(&self) -> Vec<CopyId> {
        self.copies.iter().filter(|c| c.damaged).map(|c| c.id).collect()
    }

    /// Whether any copy is awaiting repair
    #[must_use]
    pub fn has_damaged(&self) -> bool {
        self.copies.iter().any(|c| c.damaged)
    }

    /// Number of copies on the shelf
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.copies.iter().filter(|c| c.available).count()
    }

    /// Number of copies off the shelf, whether lent or awaiting repair
    #[must_use]
    pub fn borrowed_count(&self) -> usize {
        self.copies.iter().filter(|c| !c.available).count()
    }

    /// Current number of copies in the pool
    #[must_use]
    pub fn total(&self) -> usize {
        self.copies.len()
    }

    /// Whether the pool has no copies left at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty()
    }
}
