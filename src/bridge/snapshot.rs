use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::Store;
use crate::types::Term;

/// Point-in-time export of a tenant's taxonomies, terms and object links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomySnapshot {
    /// Taxonomy name → its terms, parents always listed before children.
    pub taxonomies: BTreeMap<String, Vec<SnapshotTerm>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTerm {
    pub slug: String,
    pub name: String,
    /// Slug of the parent term, if any.
    pub parent: Option<String>,
    /// Ids of the content items tagged with the term.
    pub objects: BTreeSet<i64>,
}

impl TaxonomySnapshot {
    #[must_use]
    pub fn term_count(&self) -> usize {
        self.taxonomies.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn find(&self, taxonomy: &str, slug: &str) -> Option<&SnapshotTerm> {
        self.taxonomies
            .get(taxonomy)?
            .iter()
            .find(|term| term.slug == slug)
    }
}

/// Builds a fresh snapshot of every taxonomy registered on `site_id`.
/// Taxonomies without any term are left out.
pub fn build_snapshot(store: &dyn Store, site_id: i64) -> Result<TaxonomySnapshot> {
    let mut snapshot = TaxonomySnapshot::default();

    for taxonomy in store.list_taxonomies(site_id)? {
        let terms = store.list_terms(site_id, &taxonomy.name)?;
        if terms.is_empty() {
            continue;
        }

        let slugs: HashMap<i64, &str> = terms.iter().map(|t| (t.id, t.slug.as_str())).collect();
        let mut entries = Vec::with_capacity(terms.len());
        for term in parents_first(&terms) {
            let objects = store.objects_in_term(site_id, &taxonomy.name, &[term.id])?;
            entries.push(SnapshotTerm {
                slug: term.slug.clone(),
                name: term.name.clone(),
                parent: slugs.get(&term.parent).map(|slug| (*slug).to_string()),
                objects: objects.into_iter().collect(),
            });
        }

        snapshot.taxonomies.insert(taxonomy.name, entries);
    }

    Ok(snapshot)
}

/// Orders terms so each parent precedes its children.
///
/// Terms are walked depth-first from the roots, siblings by ascending id.
/// A term whose parent is not in `terms` counts as a root. Terms caught in a
/// parent cycle are appended last, by id.
#[must_use]
pub fn parents_first(terms: &[Term]) -> Vec<&Term> {
    let ids: BTreeSet<i64> = terms.iter().map(|t| t.id).collect();
    let mut children: BTreeMap<i64, Vec<&Term>> = BTreeMap::new();
    let mut roots: Vec<&Term> = Vec::new();

    for term in terms {
        if term.parent != 0 && term.parent != term.id && ids.contains(&term.parent) {
            children.entry(term.parent).or_default().push(term);
        } else {
            roots.push(term);
        }
    }
    roots.sort_by_key(|t| t.id);
    for siblings in children.values_mut() {
        siblings.sort_by_key(|t| t.id);
    }

    let mut ordered = Vec::with_capacity(terms.len());
    let mut seen = BTreeSet::new();
    let mut stack: Vec<&Term> = roots.into_iter().rev().collect();
    while let Some(term) = stack.pop() {
        if !seen.insert(term.id) {
            continue;
        }
        ordered.push(term);
        if let Some(kids) = children.get(&term.id) {
            stack.extend(kids.iter().rev());
        }
    }

    if ordered.len() < terms.len() {
        let mut rest: Vec<&Term> = terms.iter().filter(|t| !seen.contains(&t.id)).collect();
        rest.sort_by_key(|t| t.id);
        ordered.extend(rest);
    }

    ordered
}
