use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::snapshot::{SnapshotTerm, TaxonomySnapshot};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{IdRemap, NewTerm};

/// Network option holding the taxonomy snapshot handed from `source` to
/// `destination`.
#[must_use]
pub fn snapshot_key(source: i64, destination: i64) -> String {
    format!("consolidator_taxonomy_{source}_{destination}")
}

/// Network option holding the post remap handed from `source` to
/// `destination`.
#[must_use]
pub fn remap_key(source: i64, destination: i64) -> String {
    format!("consolidator_remap_{source}_{destination}")
}

/// Persists the snapshot and post remap for a tenant pair so the
/// destination tenant can apply them later.
pub fn save_handoff(
    store: &dyn Store,
    source: i64,
    destination: i64,
    snapshot: &TaxonomySnapshot,
    remap: &IdRemap,
) -> Result<()> {
    store.set_network_option(
        &snapshot_key(source, destination),
        &serde_json::to_string(snapshot)?,
    )?;
    store.set_network_option(&remap_key(source, destination), &serde_json::to_string(remap)?)?;
    Ok(())
}

pub fn load_handoff(
    store: &dyn Store,
    source: i64,
    destination: i64,
) -> Result<(TaxonomySnapshot, IdRemap)> {
    let missing = || {
        Error::BadRequest(format!(
            "no taxonomy handoff stored for {source} -> {destination}"
        ))
    };
    let snapshot = store
        .get_network_option(&snapshot_key(source, destination))?
        .ok_or_else(missing)?;
    let remap = store
        .get_network_option(&remap_key(source, destination))?
        .ok_or_else(missing)?;

    Ok((serde_json::from_str(&snapshot)?, serde_json::from_str(&remap)?))
}

/// What applying a snapshot to a tenant did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// `taxonomy/slug` of each term created.
    pub created: Vec<String>,
    /// `taxonomy/slug` of each term that was already there.
    pub existing: Vec<String>,
    /// Taxonomies not registered on the tenant; none of their terms were
    /// touched.
    pub skipped_taxonomies: Vec<String>,
    /// Object-term links written. Links already present are not counted.
    pub linked: usize,
    /// Tagged objects without a remap entry.
    pub skipped_links: usize,
}

/// Re-creates the snapshot's terms on `site_id` and links every remapped
/// object to them. Running it again only reports the terms as existing.
pub fn apply_snapshot(
    store: &dyn Store,
    site_id: i64,
    snapshot: &TaxonomySnapshot,
    remap: &IdRemap,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();

    for (taxonomy, terms) in &snapshot.taxonomies {
        if !store.taxonomy_exists(site_id, taxonomy)? {
            warn!(site_id, taxonomy = %taxonomy, "Taxonomy not registered, skipping its terms");
            report.skipped_taxonomies.push(taxonomy.clone());
            continue;
        }

        for term in terms {
            let term_id = ensure_term(store, site_id, taxonomy, terms, term, &mut report, 0)?;

            for object in &term.objects {
                match remap.resolve(*object) {
                    Some(new_id) => {
                        report.linked +=
                            store.set_object_terms(site_id, new_id, taxonomy, &[term_id], true)?;
                    }
                    None => {
                        debug!(taxonomy = %taxonomy, slug = %term.slug, object, "No remap entry, link skipped");
                        report.skipped_links += 1;
                    }
                }
            }
        }
    }

    Ok(report)
}

/// Returns the id of `term` on the tenant, creating it (and, first, any
/// missing ancestors) when needed. A term reached again through a parent
/// cycle is created as a root.
fn ensure_term(
    store: &dyn Store,
    site_id: i64,
    taxonomy: &str,
    siblings: &[SnapshotTerm],
    term: &SnapshotTerm,
    report: &mut ApplyReport,
    depth: usize,
) -> Result<i64> {
    let label = format!("{taxonomy}/{}", term.slug);

    if let Some(existing) = store.get_term_by_slug(site_id, taxonomy, &term.slug)? {
        if !report.existing.contains(&label) && !report.created.contains(&label) {
            report.existing.push(label);
        }
        return Ok(existing.id);
    }

    let parent = match &term.parent {
        Some(slug) if depth < siblings.len() => {
            match siblings.iter().find(|t| &t.slug == slug) {
                Some(parent) => {
                    ensure_term(store, site_id, taxonomy, siblings, parent, report, depth + 1)?
                }
                None => {
                    let bare = SnapshotTerm {
                        slug: slug.clone(),
                        name: slug.clone(),
                        parent: None,
                        objects: Default::default(),
                    };
                    ensure_term(store, site_id, taxonomy, siblings, &bare, report, depth + 1)?
                }
            }
        }
        _ => 0,
    };

    // Walking a parent cycle may have created this term already.
    if let Some(existing) = store.get_term_by_slug(site_id, taxonomy, &term.slug)? {
        return Ok(existing.id);
    }

    let created = store.insert_term(
        site_id,
        &NewTerm {
            taxonomy: taxonomy.to_string(),
            name: term.name.clone(),
            slug: term.slug.clone(),
            parent,
        },
    )?;
    debug!(site_id, term = %label, id = created.id, "Created term");
    report.created.push(label);
    Ok(created.id)
}
