use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};

use crate::{
    error::LendingError,
    ranking,
    resource::{Resource, ResourceId},
};

/// Shared handle to one catalogued resource
pub type ResourceHandle = Arc<Mutex<Resource>>;

/// Entries and their lookup index
#[derive(Debug, Default)]
struct CatalogInner {
    /// Resources in catalog order
    order: Vec<ResourceHandle>,
    /// Position of each resource in `order`
    index: HashMap<ResourceId, usize>,
}

/// Insertion-ordered set of resources, each behind its own lock
///
/// The catalog lock only guards membership; copy state is guarded per
/// resource, so lending on different resources never contends.
#[derive(Debug, Default)]
pub struct Catalog {
    /// Guarded entries
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource
    ///
    /// # Errors
    ///
    /// Returns `LendingError::DuplicateResource` if the id is already taken.
    pub fn add(&self, resource: Resource) -> Result<ResourceHandle, LendingError> {
        let mut inner = self.inner.write();
        if inner.index.contains_key(resource.id()) {
            return Err(LendingError::DuplicateResource(resource.id().clone()));
        }
        let position = inner.order.len();
        inner.index.insert(resource.id().clone(), position);
        let handle = Arc::new(Mutex::new(resource));
        inner.order.push(Arc::clone(&handle));
        Ok(handle)
    }

    /// Look up a resource by id
    #[must_use]
    pub fn handle(&self, id: &str) -> Option<ResourceHandle> {
        let inner = self.inner.read();
        inner.index.get(id).and_then(|&i| inner.order.get(i)).map(Arc::clone)
    }

    /// Number of catalogued resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }

    /// Copy of every resource in catalog order
    ///
    /// Each resource is read under its own lock, so the snapshot is
    /// consistent per resource but not across resources.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Resource> {
        let handles: Vec<ResourceHandle> = self.inner.read().order.clone();
        handles.iter().map(|h| h.lock().clone()).collect()
    }

    /// The most borrowed resource
    #[must_use]
    pub fn most_popular(&self) -> Option<Resource> {
        ranking::most_popular(&self.snapshot()).cloned()
    }

    /// The `k` most borrowed resources
    #[must_use]
    pub fn most_popular_top(&self, k: usize) -> Vec<Resource> {
        ranking::top_by_borrow_count(&self.snapshot(), k).into_iter().cloned().collect()
    }

    /// The digital edition with the most views
    #[must_use]
    pub fn most_viewed_digital(&self) -> Option<Resource> {
        ranking::most_viewed_digital(&self.snapshot()).cloned()
    }

    /// The digital edition with the most downloads
    #[must_use]
    pub fn most_downloaded_digital(&self) -> Option<Resource> {
        ranking::most_downloaded_digital(&self.snapshot()).cloned()
    }

    /// Resources whose title contains `needle`, ignoring case
    #[must_use]
    pub fn search_by_title(&self, needle: &str) -> Vec<Resource> {
        ranking::search_by_title(&self.snapshot(), needle).into_iter().cloned().collect()
    }

    /// Resources whose author contains `needle`, ignoring case
    #[must_use]
    pub fn search_by_author(&self, needle: &str) -> Vec<Resource> {
        ranking::search_by_author(&self.snapshot(), needle).into_iter().cloned().collect()
    }
}
