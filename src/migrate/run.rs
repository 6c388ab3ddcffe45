use std::collections::BTreeMap;

use crate::bridge::TaxonomySnapshot;
use crate::types::{AuthorGrant, IdRemap, NewPost, StoredValue, TenantContext};

use super::report::PairCounters;

/// A post read from the source tenant, stripped of its id.
#[derive(Debug, Clone)]
pub struct ContentItem {
    pub source_id: i64,
    pub post: NewPost,
    /// Meta key → every value stored under it, in storage order.
    pub meta: BTreeMap<String, Vec<StoredValue>>,
    /// Direct children. Always empty on a child.
    pub children: Vec<ContentItem>,
}

impl ContentItem {
    /// The item followed by its children.
    pub fn with_children(&self) -> impl Iterator<Item = &ContentItem> {
        std::iter::once(self).chain(self.children.iter())
    }
}

/// Working state of one source → destination migration.
///
/// A fresh run is created for every source tenant, so nothing leaks from
/// one pair into the next.
#[derive(Debug)]
pub struct MigrationRun {
    pub source: TenantContext,
    pub destination: TenantContext,
    pub items: Vec<ContentItem>,
    pub taxonomy: TaxonomySnapshot,
    pub posts: IdRemap,
    pub comments: IdRemap,
    pub grants: Vec<AuthorGrant>,
    pub counters: PairCounters,
}

impl MigrationRun {
    #[must_use]
    pub fn new(source: TenantContext, destination: TenantContext) -> Self {
        Self {
            source,
            destination,
            items: Vec::new(),
            taxonomy: TaxonomySnapshot::default(),
            posts: IdRemap::new(),
            comments: IdRemap::new(),
            grants: Vec::new(),
            counters: PairCounters::default(),
        }
    }

    /// Every extracted item, top-level ones each followed by their children.
    pub fn all_items(&self) -> impl Iterator<Item = &ContentItem> {
        self.items.iter().flat_map(ContentItem::with_children)
    }
}
