use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::apply::{apply_snapshot, load_handoff};
use super::ops::{
    InsertTermOptions, ObjectsQuery, SortOrder, TaxonomyOp, TermField, TermFilter, TermOrderBy,
    TermOutput, TermQuery, TermRef,
};
use super::snapshot::build_snapshot;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{NewTerm, Term, slugify};

/// Result of `insert_term`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsertTermOutcome {
    Created { term: Term },
    Exists { term_id: i64 },
}

impl InsertTermOutcome {
    #[must_use]
    pub fn term_id(&self) -> i64 {
        match self {
            Self::Created { term } => term.id,
            Self::Exists { term_id } => *term_id,
        }
    }
}

/// Runs taxonomy operations against a single tenant.
pub struct TaxonomyService<'a> {
    store: &'a dyn Store,
    site_id: i64,
}

impl<'a> TaxonomyService<'a> {
    pub fn new(store: &'a dyn Store, site_id: i64) -> Self {
        Self { store, site_id }
    }

    pub fn execute(&self, op: &TaxonomyOp) -> Result<Value> {
        debug!(site_id = self.site_id, op = op.name(), "Executing taxonomy operation");

        match op {
            TaxonomyOp::GetTaxonomies => {
                let names: Vec<String> = self
                    .store
                    .list_taxonomies(self.site_id)?
                    .into_iter()
                    .map(|t| t.name)
                    .collect();
                Ok(json!(names))
            }
            TaxonomyOp::GetTerms { taxonomy, query } => Ok(json!(self.get_terms(taxonomy, query)?)),
            TaxonomyOp::GetObjectsInTerm {
                term_ids,
                taxonomy,
                query,
            } => Ok(json!(self.get_objects_in_term(term_ids, taxonomy, query)?)),
            TaxonomyOp::GetTermBy {
                field,
                value,
                taxonomy,
                output,
                filter,
            } => {
                let term = self.get_term_by(*field, value, taxonomy)?;
                Ok(term.map_or(Value::Null, |t| shape_term(t, *output, *filter)))
            }
            TaxonomyOp::TaxonomyExists { taxonomy } => {
                Ok(json!(self.store.taxonomy_exists(self.site_id, taxonomy)?))
            }
            TaxonomyOp::TermExists {
                term,
                taxonomy,
                parent,
            } => Ok(json!(self.term_exists(term, taxonomy, *parent)?)),
            TaxonomyOp::InsertTerm {
                name,
                taxonomy,
                options,
            } => Ok(json!(self.insert_term(name, taxonomy, options)?)),
            TaxonomyOp::SetObjectTerms {
                object_id,
                terms,
                taxonomy,
                append,
            } => Ok(json!(
                self.set_object_terms(*object_id, terms, taxonomy, *append)?
            )),
            TaxonomyOp::SnapshotTaxonomy => Ok(json!(build_snapshot(self.store, self.site_id)?)),
            TaxonomyOp::ApplyTaxonomySnapshot {
                source,
                destination,
            } => {
                if *destination != self.site_id {
                    return Err(Error::BadRequest(format!(
                        "snapshot for site {destination} cannot be applied to site {}",
                        self.site_id
                    )));
                }
                let (snapshot, remap) = load_handoff(self.store, *source, *destination)?;
                Ok(json!(apply_snapshot(self.store, self.site_id, &snapshot, &remap)?))
            }
        }
    }

    fn get_terms(&self, taxonomy: &str, query: &TermQuery) -> Result<Vec<Term>> {
        let mut terms: Vec<Term> = self
            .store
            .list_terms(self.site_id, taxonomy)?
            .into_iter()
            .filter(|t| !query.hide_empty || t.count > 0)
            .filter(|t| query.parent.is_none_or(|p| t.parent == p))
            .collect();

        match query.orderby {
            TermOrderBy::Id => terms.sort_by_key(|t| t.id),
            TermOrderBy::Name => terms.sort_by(|a, b| a.name.cmp(&b.name)),
            TermOrderBy::Slug => terms.sort_by(|a, b| a.slug.cmp(&b.slug)),
            TermOrderBy::Count => terms.sort_by_key(|t| t.count),
        }
        if query.order == SortOrder::Desc {
            terms.reverse();
        }
        Ok(terms)
    }

    fn get_objects_in_term(
        &self,
        term_ids: &[i64],
        taxonomy: &str,
        query: &ObjectsQuery,
    ) -> Result<Vec<i64>> {
        let mut objects = self.store.objects_in_term(self.site_id, taxonomy, term_ids)?;
        if query.order == SortOrder::Desc {
            objects.reverse();
        }
        Ok(objects)
    }

    fn get_term_by(&self, field: TermField, value: &str, taxonomy: &str) -> Result<Option<Term>> {
        match field {
            TermField::Id => match value.trim().parse::<i64>() {
                Ok(id) => self.store.get_term(self.site_id, taxonomy, id),
                Err(_) => Ok(None),
            },
            TermField::Slug => self
                .store
                .get_term_by_slug(self.site_id, taxonomy, &slugify(value)),
            TermField::Name => self.store.get_term_by_name(self.site_id, taxonomy, value),
        }
    }

    /// Resolves a term reference: ids directly, strings by slug and then by
    /// name. An empty `taxonomy` searches every taxonomy of the tenant.
    fn find_term(&self, term: &TermRef, taxonomy: &str) -> Result<Option<Term>> {
        let taxonomies: Vec<String> = if taxonomy.is_empty() {
            self.store
                .list_taxonomies(self.site_id)?
                .into_iter()
                .map(|t| t.name)
                .collect()
        } else {
            vec![taxonomy.to_string()]
        };

        for taxonomy in &taxonomies {
            let found = match term {
                TermRef::Id(0) => None,
                TermRef::Id(id) => self.store.get_term(self.site_id, taxonomy, *id)?,
                TermRef::Slug(s) if s.trim().is_empty() => None,
                TermRef::Slug(s) => match self
                    .store
                    .get_term_by_slug(self.site_id, taxonomy, &slugify(s))?
                {
                    Some(term) => Some(term),
                    None => self.store.get_term_by_name(self.site_id, taxonomy, s)?,
                },
            };
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    fn term_exists(&self, term: &TermRef, taxonomy: &str, parent: Option<i64>) -> Result<bool> {
        Ok(self
            .find_term(term, taxonomy)?
            .is_some_and(|t| parent.is_none_or(|p| t.parent == p)))
    }

    fn insert_term(
        &self,
        name: &str,
        taxonomy: &str,
        options: &InsertTermOptions,
    ) -> Result<InsertTermOutcome> {
        if !self.store.taxonomy_exists(self.site_id, taxonomy)? {
            return Err(Error::BadRequest(format!("invalid taxonomy: {taxonomy}")));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::BadRequest("a term name is required".to_string()));
        }
        let slug = slugify(options.slug.as_deref().unwrap_or(name));
        if slug.is_empty() {
            return Err(Error::BadRequest(format!("cannot derive a slug from {name:?}")));
        }
        if options.parent != 0
            && self
                .store
                .get_term(self.site_id, taxonomy, options.parent)?
                .is_none()
        {
            return Err(Error::BadRequest(format!(
                "parent term {} does not exist",
                options.parent
            )));
        }

        if let Some(existing) = self.store.get_term_by_slug(self.site_id, taxonomy, &slug)? {
            return Ok(InsertTermOutcome::Exists {
                term_id: existing.id,
            });
        }

        let new_term = NewTerm {
            taxonomy: taxonomy.to_string(),
            name: name.to_string(),
            slug: slug.clone(),
            parent: options.parent,
        };
        match self.store.insert_term(self.site_id, &new_term) {
            Ok(term) => Ok(InsertTermOutcome::Created { term }),
            Err(Error::AlreadyExists) => {
                let term_id = self
                    .store
                    .get_term_by_slug(self.site_id, taxonomy, &slug)?
                    .map(|t| t.id)
                    .ok_or(Error::AlreadyExists)?;
                Ok(InsertTermOutcome::Exists { term_id })
            }
            Err(e) => Err(e),
        }
    }

    /// Links `object_id` to the given terms and returns the linked term ids.
    /// Unknown ids are ignored; unknown slugs are created.
    fn set_object_terms(
        &self,
        object_id: i64,
        terms: &[TermRef],
        taxonomy: &str,
        append: bool,
    ) -> Result<Vec<i64>> {
        if !self.store.taxonomy_exists(self.site_id, taxonomy)? {
            return Err(Error::BadRequest(format!("invalid taxonomy: {taxonomy}")));
        }

        let mut term_ids = Vec::with_capacity(terms.len());
        for term in terms {
            let id = match (term, self.find_term(term, taxonomy)?) {
                (_, Some(found)) => found.id,
                (TermRef::Id(_), None) => continue,
                (TermRef::Slug(name), None) => self
                    .insert_term(name, taxonomy, &InsertTermOptions::default())?
                    .term_id(),
            };
            if !term_ids.contains(&id) {
                term_ids.push(id);
            }
        }

        self.store
            .set_object_terms(self.site_id, object_id, taxonomy, &term_ids, append)?;
        Ok(term_ids)
    }
}

fn shape_term(mut term: Term, output: TermOutput, filter: TermFilter) -> Value {
    if filter == TermFilter::Display {
        term.name = escape_html(&term.name);
    }
    match output {
        TermOutput::Object | TermOutput::ArrayA => json!(term),
        TermOutput::ArrayN => json!([
            term.id,
            term.name,
            term.slug,
            term.taxonomy,
            term.parent,
            term.count
        ]),
    }
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::NewPost;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> (SqliteStore, i64) {
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let site = store.create_site("a.example.com", "/", "http://a").unwrap();
        (store, site.id)
    }

    fn insert(service: &TaxonomyService<'_>, name: &str, parent: i64) -> InsertTermOutcome {
        service
            .insert_term(
                name,
                "category",
                &InsertTermOptions {
                    parent,
                    slug: None,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_insert_term_reports_existing_slug() {
        let temp = TempDir::new().unwrap();
        let (store, site) = open(&temp);
        let service = TaxonomyService::new(&store, site);

        let created = insert(&service, "Local News", 0);
        assert!(matches!(&created, InsertTermOutcome::Created { term } if term.slug == "local-news"));

        let again = insert(&service, "local news", 0);
        assert_eq!(again, InsertTermOutcome::Exists { term_id: created.term_id() });

        let value = serde_json::to_value(&again).unwrap();
        assert_eq!(value["status"], "exists");
    }

    #[test]
    fn test_insert_term_rejects_unknown_taxonomy_and_parent() {
        let temp = TempDir::new().unwrap();
        let (store, site) = open(&temp);
        let service = TaxonomyService::new(&store, site);

        let err = service
            .insert_term("x", "genre", &InsertTermOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));

        let err = service
            .insert_term(
                "x",
                "category",
                &InsertTermOptions {
                    parent: 99,
                    slug: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_term_exists_treats_zero_and_unknown_as_missing() {
        let temp = TempDir::new().unwrap();
        let (store, site) = open(&temp);
        let service = TaxonomyService::new(&store, site);
        let parent = insert(&service, "Parent", 0).term_id();
        insert(&service, "Child", parent);

        assert!(!service.term_exists(&TermRef::Id(0), "category", None).unwrap());
        assert!(!service.term_exists(&TermRef::Id(42), "category", None).unwrap());
        assert!(service.term_exists(&TermRef::Slug("Child".into()), "category", None).unwrap());
        assert!(service.term_exists(&TermRef::Slug("child".into()), "", Some(parent)).unwrap());
        assert!(!service.term_exists(&TermRef::Slug("child".into()), "category", Some(0)).unwrap());
    }

    #[test]
    fn test_set_object_terms_append_keeps_existing_links() {
        let temp = TempDir::new().unwrap();
        let (store, site) = open(&temp);
        let service = TaxonomyService::new(&store, site);
        let post = store.insert_post(site, &NewPost::new("post", "Hello", 1)).unwrap();
        let news = insert(&service, "News", 0).term_id();

        service
            .set_object_terms(post, &[TermRef::Id(news)], "category", false)
            .unwrap();
        let ids = service
            .set_object_terms(post, &[TermRef::Slug("sport".into()), TermRef::Id(999)], "category", true)
            .unwrap();
        assert_eq!(ids.len(), 1);

        let linked: Vec<String> = store
            .list_object_terms(site, post, "category")
            .unwrap()
            .into_iter()
            .map(|t| t.slug)
            .collect();
        assert_eq!(linked, vec!["news", "sport"]);

        service
            .set_object_terms(post, &[TermRef::Id(news)], "category", false)
            .unwrap();
        assert_eq!(store.list_object_terms(site, post, "category").unwrap().len(), 1);
    }

    #[test]
    fn test_get_terms_and_get_term_by_shapes() {
        let temp = TempDir::new().unwrap();
        let (store, site) = open(&temp);
        let service = TaxonomyService::new(&store, site);
        let post = store.insert_post(site, &NewPost::new("post", "Hello", 1)).unwrap();
        let used = insert(&service, "Q&A", 0).term_id();
        insert(&service, "Empty", 0);
        store
            .set_object_terms(site, post, "category", &[used], false)
            .unwrap();

        let visible = service
            .execute(&TaxonomyOp::GetTerms {
                taxonomy: "category".into(),
                query: TermQuery::default(),
            })
            .unwrap();
        assert_eq!(visible.as_array().unwrap().len(), 1);

        let all = service.get_terms("category", &TermQuery::all()).unwrap();
        assert_eq!(all.len(), 2);

        let shaped = service
            .execute(&TaxonomyOp::GetTermBy {
                field: TermField::Id,
                value: used.to_string(),
                taxonomy: "category".into(),
                output: TermOutput::ArrayN,
                filter: TermFilter::Display,
            })
            .unwrap();
        assert_eq!(shaped[0], used);
        assert_eq!(shaped[1], "Q&amp;A");

        let missing = service
            .execute(&TaxonomyOp::GetTermBy {
                field: TermField::Slug,
                value: "nope".into(),
                taxonomy: "category".into(),
                output: TermOutput::Object,
                filter: TermFilter::Raw,
            })
            .unwrap();
        assert!(missing.is_null());
    }

    #[test]
    fn test_apply_refuses_another_destination() {
        let temp = TempDir::new().unwrap();
        let (store, site) = open(&temp);
        let service = TaxonomyService::new(&store, site);

        let err = service
            .execute(&TaxonomyOp::ApplyTaxonomySnapshot {
                source: 5,
                destination: site + 1,
            })
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }
}
