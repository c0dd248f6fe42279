//! Popularity and usage rankings over a catalog snapshot.
//!
//! Every ranking breaks ties by catalog order.

use crate::resource::Resource;

/// The resource with the highest borrow count, earliest entry on ties
#[must_use]
pub fn most_popular(resources: &[Resource]) -> Option<&Resource> {
    first_max_by_key(resources.iter(), Resource::borrow_count)
}

/// The `k` most borrowed resources, most borrowed first
///
/// The sort is stable, so equally popular resources keep their catalog order.
#[must_use]
pub fn top_by_borrow_count(resources: &[Resource], k: usize) -> Vec<&Resource> {
    let mut ranked: Vec<&Resource> = resources.iter().collect();
    ranked.sort_by(|a, b| b.borrow_count().cmp(&a.borrow_count()));
    ranked.truncate(k);
    ranked
}

/// The digital edition with the most views
#[must_use]
pub fn most_viewed_digital(resources: &[Resource]) -> Option<&Resource> {
    first_max_by_key(resources.iter().filter(|r| r.digital().is_some()), |r| {
        r.digital().map_or(0, |d| d.views)
    })
}

/// The digital edition with the most downloads
#[must_use]
pub fn most_downloaded_digital(resources: &[Resource]) -> Option<&Resource> {
    first_max_by_key(resources.iter().filter(|r| r.digital().is_some()), |r| {
        r.digital().map_or(0, |d| d.downloads)
    })
}

/// Case-insensitive substring match on the title
#[must_use]
pub fn search_by_title<'a>(resources: &'a [Resource], needle: &str) -> Vec<&'a Resource> {
    let needle = needle.to_lowercase();
    resources.iter().filter(|r| r.title().to_lowercase().contains(&needle)).collect()
}

/// Case-insensitive substring match on the author
#[must_use]
pub fn search_by_author<'a>(resources: &'a [Resource], needle: &str) -> Vec<&'a Resource> {
    let needle = needle.to_lowercase();
    resources.iter().filter(|r| r.author().to_lowercase().contains(&needle)).collect()
}

/// First item holding the maximum key; `Iterator::max_by_key` keeps the last
fn first_max_by_key<'a, I, F>(items: I, key: F) -> Option<&'a Resource>
where
    I: Iterator<Item = &'a Resource>,
    F: Fn(&Resource) -> u64,
{
    items.fold(None, |best: Option<&'a Resource>, candidate| match best {
        Some(current) if key(candidate) <= key(current) => Some(current),
        _ => Some(candidate),
    })
}
