use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::copy_pool::{CopyId, CopyPool, CopyRepair, PhysicalCopy};

/// Catalog identifier of a resource
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wrap a raw identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for ResourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of catalog entry and the descriptive fields that come with it
///
/// Kinds never change lending behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    /// A book, identified by ISBN
    Book {
        /// International standard book number
        isbn: String,
    },
    /// A thesis
    Thesis {
        /// Degree the thesis was submitted for
        degree: String,
        /// Awarding university
        university: String,
    },
    /// A research paper
    ResearchPaper {
        /// Digital object identifier
        doi: String,
        /// Venue the paper appeared at
        conference: String,
    },
}

impl ResourceKind {
    /// A book with a freshly generated ISBN placeholder
    #[must_use]
    pub fn book() -> Self {
        Self::Book { isbn: Uuid::new_v4().to_string() }
    }

    /// Short lowercase label for the kind
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Book { .. } => "book",
            Self::Thesis { .. } => "thesis",
            Self::ResearchPaper { .. } => "paper",
        }
    }
}

/// View and download counters of a resource's digital edition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DigitalUsage {
    /// Times the digital edition was viewed
    pub views: u64,
    /// Times the digital edition was downloaded
    pub downloads: u64,
}

/// A catalog entry owning its pool of physical copies
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Resource {
    /// Catalog identifier
    id: ResourceId,
    /// Title
    title: String,
    /// Author
    author: String,
    /// Subject area
    topic: String,
    /// Number of pages
    page_count: u32,
    /// Lifetime number of successful lends
    borrow_count: u64,
    /// Kind tag with its descriptive payload
    kind: ResourceKind,
    /// Physical copies
    pool: CopyPool,
    /// Digital edition counters, if a digital edition exists
    digital: Option<DigitalUsage>,
}

impl Resource {
    /// Create a resource with no copies and blank descriptive fields
    pub fn new(id: impl Into<ResourceId>, title: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            author: String::new(),
            topic: String::new(),
            page_count: 0,
            borrow_count: 0,
            kind,
            pool: CopyPool::default(),
            digital: None,
        }
    }

    /// Set the author
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the topic
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set the page count
    #[must_use]
    pub fn with_pages(mut self, page_count: u32) -> Self {
        self.page_count = page_count;
        self
    }

    /// Replace the pool with `count` fresh copies
    #[must_use]
    pub fn with_copies(mut self, count: u32) -> Self {
        self.pool = CopyPool::with_copies(count);
        self
    }

    /// Lend the first available copy
    ///
    /// Bumps the lifetime borrow count on success. Returns `None` with no side
    /// effects when nothing is on the shelf.
    pub fn borrow(&mut self) -> Option<CopyId> {
        let copy = self.pool.claim_first_available()?;
        self.borrow_count = self.borrow_count.saturating_add(1);
        Some(copy)
    }

    /// Take a copy back; damaged copies stay off the shelf
    ///
    /// Returns `false` when the copy is not part of this resource.
    pub fn return_copy(&mut self, copy: CopyId) -> bool {
        self.pool.release(copy)
    }

    /// Flag a copy as damaged
    pub fn mark_damaged(&mut self, copy: CopyId) -> bool {
        self.pool.mark_damaged(copy)
    }

    /// Repair one copy against the given damage threshold
    pub fn repair(&mut self, copy: CopyId, threshold: u32) -> CopyRepair {
        self.pool.repair(copy, threshold)
    }

    /// Clear a damaged copy and make it available again, with no threshold
    pub fn restore(&mut self, copy: CopyId) -> bool {
        self.pool.restore(copy)
    }

    /// Add a new copy to the pool
    pub fn add_copy(&mut self) -> CopyId {
        self.pool.add_copy()
    }

    /// Create the digital edition if it does not exist yet
    pub fn create_digital_version(&mut self) {
        self.digital.get_or_insert_with(DigitalUsage::default);
    }

    /// Count a view of the digital edition; `false` if there is none
    pub fn record_view(&mut self) -> bool {
        match self.digital.as_mut() {
            Some(usage) => {
                usage.views = usage.views.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Count a download of the digital edition; `false` if there is none
    pub fn record_download(&mut self) -> bool {
        match self.digital.as_mut() {
            Some(usage) => {
                usage.downloads = usage.downloads.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Catalog identifier
    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Author
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Subject area
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Number of pages
    #[must_use]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Lifetime number of successful lends
    #[must_use]
    pub fn borrow_count(&self) -> u64 {
        self.borrow_count
    }

    /// Kind tag
    #[must_use]
    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    /// Digital edition counters, if any
    #[must_use]
    pub fn digital(&self) -> Option<&DigitalUsage> {
        self.digital.as_ref()
    }

    /// The underlying copy pool
    #[must_use]
    pub fn pool(&self) -> &CopyPool {
        &self.pool
    }

    /// Copies in creation order
    pub fn copies(&self) -> impl Iterator<Item = &PhysicalCopy> {
        self.pool.iter()
    }

    /// Copies currently awaiting repair
    #[must_use]
    pub fn damaged_copies(&self) -> Vec<CopyId> {
        self.pool.damaged_ids()
    }

    /// Whether any copy is awaiting repair
    #[must_use]
    pub fn has_damaged_copies(&self) -> bool {
        self.pool.has_damaged()
    }

    /// Copies on the shelf
    #[must_use]
    pub fn available_copies(&self) -> usize {
        self.pool.available_count()
    }

    /// Copies lent out or awaiting repair
    #[must_use]
    pub fn borrowed_copies(&self) -> usize {
        self.pool.borrowed_count()
    }

    /// Current size of the pool
    #[must_use]
    pub fn total_copies(&self) -> usize {
        self.pool.total()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" by {} ({}, {}/{} available)",
            self.id,
            self.title,
            self.author,
            self.kind.label(),
            self.available_copies(),
            self.total_copies()
        )
    }
}
