mod common;

use std::fs;
use std::sync::{Arc, Mutex};

use common::Network;
use consolidator::bridge::{LocalBridge, TaxonomyBridge, TaxonomyOp};
use consolidator::config::CommentOrder;
use consolidator::error::{Error, Result};
use consolidator::migrate::{ConsolidationRequest, Consolidator, PairStatus, Stage};
use consolidator::store::Store;
use consolidator::types::{NewComment, NewPost, NewTerm, Taxonomy, TenantContext};
use serde_json::Value;

fn new_post_id(network: &Network, source: i64, old: i64) -> i64 {
    network
        .store
        .get_redirect(source, old)
        .unwrap()
        .expect("redirect for migrated post")
        .new_post_id
}

fn term(network: &Network, site: i64, taxonomy: &str, name: &str, parent: i64) -> i64 {
    network
        .store
        .insert_term(
            site,
            &NewTerm {
                taxonomy: taxonomy.to_string(),
                name: name.to_string(),
                slug: consolidator::types::slugify(name),
                parent,
            },
        )
        .unwrap()
        .id
}

#[test]
fn test_end_to_end_post_meta_child_and_author() {
    let network = Network::new();
    let source = network.site("a.example.com");
    let dest = network.site("b.example.com");
    let author = network.user_with_id(42, "writer");
    network.store.add_user_to_site(source.id, author.id, "editor").unwrap();

    network.post_with_id(source.id, 5, &NewPost::new("post", "Hello", 42));
    network.post_with_id(source.id, 6, &NewPost::new("attachment", "Photo", 42).with_parent(5));
    network.store.add_post_meta(source.id, 5, "color", "red").unwrap();
    network.store.add_post_meta(source.id, 5, "color", "blue").unwrap();

    let report = network
        .engine()
        .run(&ConsolidationRequest::new(vec![source.id], dest.id))
        .unwrap();

    assert!(report.is_success());
    let pair = &report.pairs[0];
    assert_eq!(pair.status, PairStatus::Success);
    assert_eq!(pair.counters.posts, 2);
    assert_eq!(pair.counters.meta, 2);
    assert_eq!(pair.counters.authors, 1);
    assert_eq!(pair.counters.redirects, 2);

    assert_eq!(network.store.count_posts(dest.id).unwrap(), 2);
    let parent = new_post_id(&network, source.id, 5);
    let child = new_post_id(&network, source.id, 6);

    let meta = network.store.get_post_meta(dest.id, parent).unwrap();
    assert_eq!(
        meta,
        vec![
            ("color".to_string(), "red".to_string()),
            ("color".to_string(), "blue".to_string()),
        ]
    );

    let child_post = network.store.get_post(dest.id, child).unwrap().unwrap();
    assert_eq!(child_post.fields.parent, parent);
    assert_eq!(child_post.fields.title, "Photo");

    assert_eq!(
        network.store.get_user_role(dest.id, 42).unwrap().as_deref(),
        Some("editor")
    );

    // The source is left untouched.
    assert_eq!(network.store.count_posts(source.id).unwrap(), 2);
}

#[test]
fn test_children_point_at_new_parent() {
    let network = Network::new();
    let source = network.site("a.example.com");
    let dest = network.site("b.example.com");

    // Occupy the low ids on the destination so old and new ids differ.
    for title in ["One", "Two", "Three"] {
        network.post(dest.id, &NewPost::new("post", title, 0));
    }

    let parent = network.post(source.id, &NewPost::new("page", "Parent", 0));
    let children: Vec<i64> = (0..3)
        .map(|i| network.post(source.id, &NewPost::new("page", &format!("Child {i}"), 0).with_parent(parent)))
        .collect();
    let grandchild = network.post(
        source.id,
        &NewPost::new("page", "Grandchild", 0).with_parent(children[0]),
    );

    let report = network
        .engine()
        .run(&ConsolidationRequest::new(vec![source.id], dest.id))
        .unwrap();
    assert!(report.is_success());

    // N children plus the parent; grandchildren are not walked.
    assert_eq!(report.pairs[0].counters.posts, 4);
    assert_eq!(network.store.count_posts(dest.id).unwrap(), 3 + 4);
    assert!(network.store.get_redirect(source.id, grandchild).unwrap().is_none());

    let new_parent = new_post_id(&network, source.id, parent);
    assert_ne!(new_parent, parent);
    let migrated = network.store.list_posts_by_parent(dest.id, new_parent).unwrap();
    assert_eq!(migrated.len(), 3);
    for old in children {
        let new = new_post_id(&network, source.id, old);
        let post = network.store.get_post(dest.id, new).unwrap().unwrap();
        assert_eq!(post.fields.parent, new_parent);
    }
}

#[test]
fn test_taxonomy_is_rebuilt_on_destination() {
    let network = Network::new();
    let source = network.site("a.example.com");
    let dest = network.site("b.example.com");
    network
        .store
        .register_taxonomy(
            source.id,
            &Taxonomy {
                name: "genre".to_string(),
                hierarchical: false,
            },
        )
        .unwrap();

    let post = network.post(source.id, &NewPost::new("post", "Hello", 0));
    let news = term(&network, source.id, "category", "News", 0);
    let local = term(&network, source.id, "category", "Local", news);
    let tag = term(&network, source.id, "post_tag", "Rust", 0);
    let genre = term(&network, source.id, "genre", "Jazz", 0);
    network.store.set_object_terms(source.id, post, "category", &[local], false).unwrap();
    network.store.set_object_terms(source.id, post, "post_tag", &[tag], false).unwrap();
    network.store.set_object_terms(source.id, post, "genre", &[genre], false).unwrap();
    // Linked object that is not a migrated post.
    network.store.set_object_terms(source.id, 99, "post_tag", &[tag], true).unwrap();

    // "News" already exists on the destination.
    let existing_news = term(&network, dest.id, "category", "News", 0);

    let report = network
        .engine()
        .run(&ConsolidationRequest::new(vec![source.id], dest.id))
        .unwrap();
    assert!(report.is_success());
    let counters = report.pairs[0].counters;
    assert_eq!(counters.terms_created, 2);
    assert_eq!(counters.terms_existing, 1);
    assert_eq!(counters.links, 2);
    assert_eq!(counters.skipped_links, 1);

    let new_post = new_post_id(&network, source.id, post);
    let categories = network.store.list_object_terms(dest.id, new_post, "category").unwrap();
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].slug, "local");
    assert_eq!(categories[0].parent, existing_news);

    let tags = network.store.list_object_terms(dest.id, new_post, "post_tag").unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].slug, "rust");

    assert!(!network.store.taxonomy_exists(dest.id, "genre").unwrap());
    assert_eq!(network.store.list_terms(dest.id, "post_tag").unwrap().len(), 1);
}

#[test]
fn test_applying_snapshot_twice_is_idempotent() {
    let network = Network::new();
    let source = network.site("a.example.com");
    let dest = network.site("b.example.com");
    let post = network.post(source.id, &NewPost::new("post", "Hello", 0));
    let parent = term(&network, source.id, "category", "Parent", 0);
    let child = term(&network, source.id, "category", "Child", parent);
    network.store.set_object_terms(source.id, post, "category", &[child], false).unwrap();

    network
        .engine()
        .run(&ConsolidationRequest::new(vec![source.id], dest.id))
        .unwrap();
    let terms_before = network.store.list_terms(dest.id, "category").unwrap();
    let new_post = new_post_id(&network, source.id, post);
    let links_before = network.store.list_object_terms(dest.id, new_post, "category").unwrap();

    // Replays the handoff that the run left behind.
    let bridge = LocalBridge::new(network.store.clone());
    let second = bridge
        .apply_taxonomy_snapshot(&dest.context(), source.id, dest.id)
        .unwrap();
    assert!(second.created.is_empty());
    assert_eq!(second.existing.len(), 2);
    assert_eq!(second.linked, 0);

    let terms_after = network.store.list_terms(dest.id, "category").unwrap();
    let links_after = network.store.list_object_terms(dest.id, new_post, "category").unwrap();
    assert_eq!(
        terms_before.iter().map(|t| (t.id, t.slug.clone(), t.parent)).collect::<Vec<_>>(),
        terms_after.iter().map(|t| (t.id, t.slug.clone(), t.parent)).collect::<Vec<_>>()
    );
    assert_eq!(
        links_before.iter().map(|t| t.id).collect::<Vec<_>>(),
        links_after.iter().map(|t| t.id).collect::<Vec<_>>()
    );
}

#[test]
fn test_legacy_comment_order_leaves_reply_parent_unresolved() {
    let network = Network::new();
    let source = network.site("a.example.com");
    let dest = network.site("b.example.com");
    network.post_with_id(source.id, 5, &NewPost::new("post", "Hello", 0));
    network.comment_with_id(source.id, 10, &NewComment::new(5, "alice", "First"));
    network.comment_with_id(source.id, 11, &NewComment::new(5, "bob", "Reply").reply_to(10));

    let report = network
        .engine()
        .run(&ConsolidationRequest::new(vec![source.id], dest.id))
        .unwrap();
    assert_eq!(report.pairs[0].counters.comments, 2);

    let new_post = new_post_id(&network, source.id, 5);
    let comments = network.store.list_post_comments(dest.id, new_post).unwrap();
    assert_eq!(comments.len(), 2);

    let first = comments.iter().find(|c| c.fields.content == "First").unwrap();
    let reply = comments.iter().find(|c| c.fields.content == "Reply").unwrap();

    // Comment 11 went in first and kept its source parent id.
    assert!(reply.id < first.id);
    assert_eq!(reply.fields.parent, 10);
    assert_ne!(reply.fields.parent, first.id);
    assert_eq!(first.fields.parent, 0);
}

#[test]
fn test_parent_first_comment_order_resolves_replies() {
    let network = Network::new();
    let source = network.site("a.example.com");
    let dest = network.site("b.example.com");
    network.post_with_id(source.id, 5, &NewPost::new("post", "Hello", 0));
    network.comment_with_id(source.id, 10, &NewComment::new(5, "alice", "First"));
    network.comment_with_id(source.id, 11, &NewComment::new(5, "bob", "Reply").reply_to(10));

    network
        .engine()
        .comment_order(CommentOrder::ParentFirst)
        .run(&ConsolidationRequest::new(vec![source.id], dest.id))
        .unwrap();

    let new_post = new_post_id(&network, source.id, 5);
    let comments = network.store.list_post_comments(dest.id, new_post).unwrap();
    let first = comments.iter().find(|c| c.fields.content == "First").unwrap();
    let reply = comments.iter().find(|c| c.fields.content == "Reply").unwrap();
    assert!(first.id < reply.id);
    assert_eq!(reply.fields.parent, first.id);
}

#[test]
fn test_attachment_files_are_copied() {
    let network = Network::new();
    let source = network.site("a.example.com");
    let dest = network.site("b.example.com");

    let source_root = network.upload_root(source.id);
    fs::create_dir_all(source_root.join("a")).unwrap();
    fs::create_dir_all(source_root.join("c")).unwrap();
    let bytes = [0x89_u8, b'P', b'N', b'G', 0, 1, 2, 3];
    fs::write(source_root.join("a/b.png"), bytes).unwrap();

    let report = network
        .engine()
        .run(&ConsolidationRequest::new(vec![source.id], dest.id))
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.pairs[0].counters.files, 1);

    let copied = network.upload_root(dest.id).join("a/b.png");
    assert_eq!(fs::read(copied).unwrap(), bytes);
    assert!(source_root.join("a/b.png").exists());
}

/// Delegates to the local bridge, records whether the cache was suspended
/// on each call and fails snapshot application for one source.
struct ProbeBridge {
    inner: LocalBridge,
    store: Arc<dyn Store>,
    failing_source: i64,
    suspended: Mutex<Vec<bool>>,
}

impl TaxonomyBridge for ProbeBridge {
    fn call(&self, tenant: &TenantContext, op: &TaxonomyOp) -> Result<Value> {
        self.suspended.lock().unwrap().push(self.store.cache_suspended());
        if let TaxonomyOp::ApplyTaxonomySnapshot { source, .. } = op {
            if *source == self.failing_source {
                return Err(Error::Bridge("apply_taxonomy_snapshot: 500".to_string()));
            }
        }
        self.inner.call(tenant, op)
    }
}

#[test]
fn test_failing_source_does_not_stop_the_batch() {
    let network = Network::new();
    let failing = network.site("a.example.com");
    let healthy = network.site("b.example.com");
    let dest = network.site("c.example.com");
    let failing_post = network.post(failing.id, &NewPost::new("post", "Broken", 0));
    let healthy_post = network.post(healthy.id, &NewPost::new("post", "Fine", 0));

    let bridge = Arc::new(ProbeBridge {
        inner: LocalBridge::new(network.store.clone()),
        store: network.store.clone(),
        failing_source: failing.id,
        suspended: Mutex::new(Vec::new()),
    });
    let engine = Consolidator::new(network.store.clone(), bridge.clone(), network.uploads_dir());

    assert!(!network.store.cache_suspended());
    let report = engine
        .run(&ConsolidationRequest::new(vec![failing.id, healthy.id], dest.id))
        .unwrap();
    assert!(!network.store.cache_suspended());

    let calls = bridge.suspended.lock().unwrap();
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|suspended| *suspended));

    assert!(!report.is_success());
    let first = &report.pairs[0];
    assert_eq!(first.source, failing.id);
    assert_eq!(first.status, PairStatus::Partial);
    assert_eq!(first.stage, Some(Stage::Taxonomy));
    assert!(first.error.as_deref().unwrap().contains("500"));
    // Content written before the failure stays.
    assert_eq!(first.counters.posts, 1);
    assert!(network.store.get_redirect(failing.id, failing_post).unwrap().is_none());

    let second = &report.pairs[1];
    assert_eq!(second.status, PairStatus::Success);
    assert_eq!(second.counters.posts, 1);
    assert_eq!(second.counters.redirects, 1);
    assert!(network.store.get_redirect(healthy.id, healthy_post).unwrap().is_some());
    assert_eq!(network.store.count_posts(dest.id).unwrap(), 2);
}

#[test]
fn test_each_source_gets_a_fresh_run() {
    let network = Network::new();
    let first = network.site("a.example.com");
    let second = network.site("b.example.com");
    let dest = network.site("c.example.com");
    network.post(first.id, &NewPost::new("post", "From A", 0));
    network.post(first.id, &NewPost::new("post", "Also from A", 0));
    network.post(second.id, &NewPost::new("post", "From B", 0));

    let report = network
        .engine()
        .run(&ConsolidationRequest::new(vec![first.id, second.id, first.id, dest.id], dest.id))
        .unwrap();

    assert_eq!(report.pairs.len(), 2);
    assert_eq!(report.pairs[0].counters.posts, 2);
    assert_eq!(report.pairs[1].counters.posts, 1);
    assert_eq!(report.pairs[1].counters.redirects, 1);
    assert_eq!(network.store.count_posts(dest.id).unwrap(), 3);

    let b = new_post_id(&network, second.id, 1);
    let post = network.store.get_post(dest.id, b).unwrap().unwrap();
    assert_eq!(post.fields.title, "From B");
}

#[test]
fn test_unusable_requests_are_rejected() {
    let network = Network::new();
    let source = network.site("a.example.com");
    let engine = network.engine();

    let err = engine
        .run(&ConsolidationRequest::new(vec![source.id], source.id))
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    let err = engine
        .run(&ConsolidationRequest::new(Vec::new(), source.id))
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    let err = engine
        .run(&ConsolidationRequest::new(vec![source.id], 404))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownSite(404)));
    assert!(!network.store.cache_suspended());
}

#[test]
fn test_unknown_source_fails_at_extract() {
    let network = Network::new();
    let dest = network.site("b.example.com");

    let report = network
        .engine()
        .run(&ConsolidationRequest::new(vec![77], dest.id))
        .unwrap();
    let pair = &report.pairs[0];
    assert_eq!(pair.status, PairStatus::Failed);
    assert_eq!(pair.stage, Some(Stage::Extract));
}

#[test]
fn test_fallback_role_for_authors_without_source_role() {
    let network = Network::new();
    let source = network.site("a.example.com");
    let dest = network.site("b.example.com");
    let guest = network.user("guest");
    network.post(source.id, &NewPost::new("post", "Guest post", guest.id));

    let report = network
        .engine()
        .run(&ConsolidationRequest::new(vec![source.id], dest.id))
        .unwrap();
    assert_eq!(report.pairs[0].counters.authors, 0);
    assert!(network.store.get_user_role(dest.id, guest.id).unwrap().is_none());

    let other = network.site("c.example.com");
    network
        .engine()
        .fallback_author_role(Some("contributor".to_string()))
        .run(&ConsolidationRequest::new(vec![source.id], other.id))
        .unwrap();
    assert_eq!(
        network.store.get_user_role(other.id, guest.id).unwrap().as_deref(),
        Some("contributor")
    );
}
