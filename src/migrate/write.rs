use std::collections::BTreeMap;

use tracing::debug;

use super::report::PairCounters;
use super::run::MigrationRun;
use crate::error::Result;
use crate::store::Store;
use crate::types::{NewPost, StoredValue};

/// Inserts the extracted items into the destination and records every
/// `source id → new id` pair in the post remap.
///
/// Each top-level item is written with its children before the next one
/// starts. Children point at their parent's new id.
pub fn write(run: &mut MigrationRun, store: &dyn Store) -> Result<()> {
    let MigrationRun {
        destination,
        items,
        posts,
        counters,
        ..
    } = run;
    let site_id = destination.site_id;

    for item in items.iter() {
        let parent_id = insert_item(store, site_id, &item.post, &item.meta, counters)?;
        posts.record(item.source_id, parent_id);

        for child in &item.children {
            let post = child.post.clone().with_parent(parent_id);
            let child_id = insert_item(store, site_id, &post, &child.meta, counters)?;
            posts.record(child.source_id, child_id);
        }
    }

    debug!(site_id, posts = counters.posts, meta = counters.meta, "Wrote content");
    Ok(())
}

fn insert_item(
    store: &dyn Store,
    site_id: i64,
    post: &NewPost,
    meta: &BTreeMap<String, Vec<StoredValue>>,
    counters: &mut PairCounters,
) -> Result<i64> {
    let id = store.insert_post(site_id, post)?;
    counters.posts += 1;

    for (key, values) in meta {
        for value in values {
            store.add_post_meta(site_id, id, key, &value.encode())?;
            counters.meta += 1;
        }
    }
    Ok(id)
}
