//! Cross-tenant taxonomy bridge.
//!
//! A caller names one of a fixed set of taxonomy operations and the tenant it
//! should run against; the bridge executes it in that tenant and hands back
//! the JSON result. [`LocalBridge`] runs the operation in-process,
//! [`HttpBridge`] sends it to the tenant's `/bridge/{site}` endpoint.

mod apply;
mod http;
mod ops;
mod service;
mod snapshot;

pub use apply::{ApplyReport, apply_snapshot, load_handoff, remap_key, save_handoff, snapshot_key};
pub use http::HttpBridge;
pub use ops::{
    InsertTermOptions, OPERATION_NAMES, ObjectsQuery, SortOrder, TaxonomyOp, TermField,
    TermFilter, TermOrderBy, TermOutput, TermQuery, TermRef,
};
pub use service::{InsertTermOutcome, TaxonomyService};
pub use snapshot::{SnapshotTerm, TaxonomySnapshot, build_snapshot, parents_first};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{TenantContext, Term};

fn decode<T: DeserializeOwned>(op: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::Bridge(format!("unexpected {op} response: {e}")))
}

/// Client side of the bridge.
pub trait TaxonomyBridge: Send + Sync {
    /// Runs `op` in `tenant` and returns the raw JSON result.
    fn call(&self, tenant: &TenantContext, op: &TaxonomyOp) -> Result<Value>;

    fn get_taxonomies(&self, tenant: &TenantContext) -> Result<Vec<String>> {
        decode("get_taxonomies", self.call(tenant, &TaxonomyOp::GetTaxonomies)?)
    }

    fn get_terms(
        &self,
        tenant: &TenantContext,
        taxonomy: &str,
        query: TermQuery,
    ) -> Result<Vec<Term>> {
        let op = TaxonomyOp::GetTerms {
            taxonomy: taxonomy.to_string(),
            query,
        };
        decode("get_terms", self.call(tenant, &op)?)
    }

    fn get_objects_in_term(
        &self,
        tenant: &TenantContext,
        term_ids: &[i64],
        taxonomy: &str,
    ) -> Result<Vec<i64>> {
        let op = TaxonomyOp::GetObjectsInTerm {
            term_ids: term_ids.to_vec(),
            taxonomy: taxonomy.to_string(),
            query: ObjectsQuery::default(),
        };
        decode("get_objects_in_term", self.call(tenant, &op)?)
    }

    fn get_term_by(
        &self,
        tenant: &TenantContext,
        field: TermField,
        value: &str,
        taxonomy: &str,
    ) -> Result<Option<Term>> {
        let op = TaxonomyOp::GetTermBy {
            field,
            value: value.to_string(),
            taxonomy: taxonomy.to_string(),
            output: TermOutput::Object,
            filter: TermFilter::Raw,
        };
        decode("get_term_by", self.call(tenant, &op)?)
    }

    fn taxonomy_exists(&self, tenant: &TenantContext, taxonomy: &str) -> Result<bool> {
        let op = TaxonomyOp::TaxonomyExists {
            taxonomy: taxonomy.to_string(),
        };
        decode("taxonomy_exists", self.call(tenant, &op)?)
    }

    /// A null, zero or false result means the term does not exist.
    fn term_exists(
        &self,
        tenant: &TenantContext,
        term: TermRef,
        taxonomy: &str,
        parent: Option<i64>,
    ) -> Result<bool> {
        let op = TaxonomyOp::TermExists {
            term,
            taxonomy: taxonomy.to_string(),
            parent,
        };
        Ok(match self.call(tenant, &op)? {
            Value::Null => false,
            Value::Bool(exists) => exists,
            Value::Number(id) => id.as_i64().is_some_and(|id| id != 0),
            Value::String(id) => !id.is_empty() && id != "0",
            Value::Array(_) | Value::Object(_) => true,
        })
    }

    fn insert_term(
        &self,
        tenant: &TenantContext,
        name: &str,
        taxonomy: &str,
        options: InsertTermOptions,
    ) -> Result<InsertTermOutcome> {
        let op = TaxonomyOp::InsertTerm {
            name: name.to_string(),
            taxonomy: taxonomy.to_string(),
            options,
        };
        decode("insert_term", self.call(tenant, &op)?)
    }

    fn set_object_terms(
        &self,
        tenant: &TenantContext,
        object_id: i64,
        terms: Vec<TermRef>,
        taxonomy: &str,
        append: bool,
    ) -> Result<Vec<i64>> {
        let op = TaxonomyOp::SetObjectTerms {
            object_id,
            terms,
            taxonomy: taxonomy.to_string(),
            append,
        };
        decode("set_object_terms", self.call(tenant, &op)?)
    }

    fn snapshot_taxonomy(&self, tenant: &TenantContext) -> Result<TaxonomySnapshot> {
        decode(
            "snapshot_taxonomy",
            self.call(tenant, &TaxonomyOp::SnapshotTaxonomy)?,
        )
    }

    /// Applies the stored `source → destination` handoff in `tenant`, which
    /// must be the destination.
    fn apply_taxonomy_snapshot(
        &self,
        tenant: &TenantContext,
        source: i64,
        destination: i64,
    ) -> Result<ApplyReport> {
        let op = TaxonomyOp::ApplyTaxonomySnapshot {
            source,
            destination,
        };
        decode("apply_taxonomy_snapshot", self.call(tenant, &op)?)
    }
}

/// Runs bridge operations directly against the shared store.
pub struct LocalBridge {
    store: Arc<dyn Store>,
}

impl LocalBridge {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

impl TaxonomyBridge for LocalBridge {
    fn call(&self, tenant: &TenantContext, op: &TaxonomyOp) -> Result<Value> {
        if self.store.get_site(tenant.site_id)?.is_none() {
            return Err(Error::UnknownSite(tenant.site_id));
        }
        TaxonomyService::new(self.store.as_ref(), tenant.site_id).execute(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::NewPost;
    use tempfile::TempDir;

    fn bridge(temp: &TempDir) -> (LocalBridge, Arc<dyn Store>, TenantContext) {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let site = store.create_site("a.example.com", "/", "http://a").unwrap();
        let store: Arc<dyn Store> = Arc::new(store);
        (LocalBridge::new(store.clone()), store, site.context())
    }

    #[test]
    fn test_typed_calls_through_local_bridge() {
        let temp = TempDir::new().unwrap();
        let (bridge, store, tenant) = bridge(&temp);

        assert_eq!(
            bridge.get_taxonomies(&tenant).unwrap(),
            vec!["category", "post_tag"]
        );
        assert!(bridge.taxonomy_exists(&tenant, "category").unwrap());

        let outcome = bridge
            .insert_term(&tenant, "News", "category", InsertTermOptions::default())
            .unwrap();
        let term_id = outcome.term_id();
        assert!(matches!(outcome, InsertTermOutcome::Created { .. }));

        let post = store
            .insert_post(tenant.site_id, &NewPost::new("post", "Hello", 1))
            .unwrap();
        let linked = bridge
            .set_object_terms(&tenant, post, vec![TermRef::Slug("news".into())], "category", false)
            .unwrap();
        assert_eq!(linked, vec![term_id]);

        assert_eq!(
            bridge.get_objects_in_term(&tenant, &[term_id], "category").unwrap(),
            vec![post]
        );
        let term = bridge
            .get_term_by(&tenant, TermField::Slug, "news", "category")
            .unwrap()
            .unwrap();
        assert_eq!(term.count, 1);
        assert!(bridge
            .get_term_by(&tenant, TermField::Name, "Nope", "category")
            .unwrap()
            .is_none());
        assert!(bridge
            .term_exists(&tenant, TermRef::Id(term_id), "category", None)
            .unwrap());
        assert!(!bridge
            .term_exists(&tenant, TermRef::Id(0), "category", None)
            .unwrap());

        let snapshot = bridge.snapshot_taxonomy(&tenant).unwrap();
        assert_eq!(snapshot.term_count(), 1);
        assert!(snapshot.find("category", "news").unwrap().objects.contains(&post));
    }

    #[test]
    fn test_unknown_site_is_rejected() {
        let temp = TempDir::new().unwrap();
        let (bridge, _, tenant) = bridge(&temp);
        let other = TenantContext {
            site_id: tenant.site_id + 10,
            base_url: tenant.base_url.clone(),
        };

        let err = bridge.get_taxonomies(&other).unwrap_err();
        assert!(matches!(err, Error::UnknownSite(_)));
    }
}
