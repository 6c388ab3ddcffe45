use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::run::MigrationRun;
use crate::config::CommentOrder;
use crate::error::Result;
use crate::store::Store;
use crate::types::Comment;

/// Copies the comments of every remapped post, building the comment remap
/// as it goes.
///
/// With [`CommentOrder::Legacy`] each post's comments are inserted by
/// descending source id and a reply whose parent has not been inserted yet
/// keeps the source parent id. With [`CommentOrder::ParentFirst`] parents
/// always go first and a reply whose parent is not among the copied
/// comments becomes top-level.
pub fn migrate_comments(run: &mut MigrationRun, store: &dyn Store, order: CommentOrder) -> Result<()> {
    let source = run.source.site_id;
    let destination = run.destination.site_id;

    let mut batches = Vec::new();
    for (old_post, new_post) in run.posts.iter() {
        let comments = store.list_post_comments(source, old_post)?;
        if !comments.is_empty() {
            batches.push((new_post, comments));
        }
    }

    for (new_post, comments) in batches {
        let comments = match order {
            CommentOrder::Legacy => newest_first(comments),
            CommentOrder::ParentFirst => parents_first(comments),
        };

        for comment in comments {
            let mut fields = comment.fields;
            fields.post_id = new_post;

            if fields.parent != 0 {
                match (run.comments.resolve(fields.parent), order) {
                    (Some(parent), _) => fields.parent = parent,
                    (None, CommentOrder::Legacy) => {
                        debug!(comment = comment.id, parent = fields.parent, "Parent not copied yet, keeping source id");
                    }
                    (None, CommentOrder::ParentFirst) => {
                        warn!(comment = comment.id, parent = fields.parent, "Parent comment not migrated, reply becomes top-level");
                        fields.parent = 0;
                    }
                }
            }

            let new_id = store.insert_comment(destination, &fields)?;
            run.comments.record(comment.id, new_id);
            run.counters.comments += 1;
        }
    }

    Ok(())
}

fn newest_first(mut comments: Vec<Comment>) -> Vec<Comment> {
    comments.sort_by(|a, b| b.id.cmp(&a.id));
    comments
}

/// Depth-first from the top-level comments, siblings by ascending id.
/// Replies to a comment outside `comments` count as top-level.
fn parents_first(comments: Vec<Comment>) -> Vec<Comment> {
    let ids: BTreeSet<i64> = comments.iter().map(|c| c.id).collect();
    let mut replies: BTreeMap<i64, Vec<Comment>> = BTreeMap::new();
    let mut roots = Vec::new();

    for comment in comments {
        let parent = comment.fields.parent;
        if parent != 0 && parent != comment.id && ids.contains(&parent) {
            replies.entry(parent).or_default().push(comment);
        } else {
            roots.push(comment);
        }
    }
    roots.sort_by_key(|c| c.id);
    for siblings in replies.values_mut() {
        siblings.sort_by_key(|c| c.id);
    }

    let mut ordered = Vec::with_capacity(ids.len());
    let mut stack: Vec<Comment> = roots.into_iter().rev().collect();
    while let Some(comment) = stack.pop() {
        if let Some(children) = replies.remove(&comment.id) {
            stack.extend(children.into_iter().rev());
        }
        ordered.push(comment);
    }

    // Anything left sits in a reply cycle.
    ordered.extend(replies.into_values().flatten());
    ordered
}
