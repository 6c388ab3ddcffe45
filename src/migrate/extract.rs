use std::collections::BTreeMap;

use tracing::debug;

use super::run::{ContentItem, MigrationRun};
use crate::bridge::TaxonomyBridge;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Post, StoredValue};

/// Reads the source tenant's top-level posts, their direct children and all
/// their meta into `run`, while the taxonomy snapshot is taken alongside.
///
/// Only one level of nesting is walked: grandchildren are not read.
pub fn extract(run: &mut MigrationRun, store: &dyn Store, bridge: &dyn TaxonomyBridge) -> Result<()> {
    let source = run.source.clone();

    let (items, snapshot) = std::thread::scope(|scope| {
        let snapshot = scope.spawn(|| bridge.snapshot_taxonomy(&source));
        let items = read_items(store, source.site_id);
        let snapshot = snapshot
            .join()
            .map_err(|_| Error::Bridge("taxonomy snapshot worker panicked".to_string()))?;
        Ok::<_, Error>((items?, snapshot?))
    })?;

    debug!(
        site_id = source.site_id,
        items = items.len(),
        terms = snapshot.term_count(),
        "Extracted source content"
    );
    run.items = items;
    run.taxonomy = snapshot;
    Ok(())
}

fn read_items(store: &dyn Store, site_id: i64) -> Result<Vec<ContentItem>> {
    let mut items = Vec::new();
    for post in store.list_posts_by_parent(site_id, 0)? {
        let mut item = read_item(store, site_id, post)?;
        for child in store.list_posts_by_parent(site_id, item.source_id)? {
            item.children.push(read_item(store, site_id, child)?);
        }
        items.push(item);
    }
    Ok(items)
}

fn read_item(store: &dyn Store, site_id: i64, post: Post) -> Result<ContentItem> {
    let mut meta: BTreeMap<String, Vec<StoredValue>> = BTreeMap::new();
    for (key, raw) in store.get_post_meta(site_id, post.id)? {
        meta.entry(key).or_default().push(StoredValue::decode(&raw));
    }

    Ok(ContentItem {
        source_id: post.id,
        post: post.fields,
        meta,
        children: Vec::new(),
    })
}
