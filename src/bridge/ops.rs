use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};

/// Which column `get_term_by` matches on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermField {
    #[default]
    Id,
    Slug,
    Name,
}

/// Result shape of `get_term_by`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TermOutput {
    /// The term as a keyed record.
    #[default]
    #[serde(rename = "OBJECT")]
    Object,
    #[serde(rename = "ARRAY_A")]
    ArrayA,
    /// The term's fields as a positional array.
    #[serde(rename = "ARRAY_N")]
    ArrayN,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermFilter {
    #[default]
    Raw,
    /// Escapes the term name for HTML output.
    Display,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermOrderBy {
    #[default]
    Id,
    Name,
    Slug,
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermQuery {
    /// Leave out terms no object is tagged with.
    pub hide_empty: bool,
    /// Only return direct children of this term.
    pub parent: Option<i64>,
    pub orderby: TermOrderBy,
    pub order: SortOrder,
}

impl Default for TermQuery {
    fn default() -> Self {
        Self {
            hide_empty: true,
            parent: None,
            orderby: TermOrderBy::Id,
            order: SortOrder::Asc,
        }
    }
}

impl TermQuery {
    /// Every term of the taxonomy, empty ones included.
    #[must_use]
    pub fn all() -> Self {
        Self {
            hide_empty: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectsQuery {
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertTermOptions {
    pub parent: i64,
    pub slug: Option<String>,
}

/// A term given either by id or by slug (falling back to name).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermRef {
    Id(i64),
    Slug(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// The taxonomy primitives the bridge will run on behalf of another tenant.
///
/// This is the complete allow-list: an operation name that does not map to
/// a variant here is rejected before anything executes.
#[derive(Debug, Clone, PartialEq)]
pub enum TaxonomyOp {
    GetTaxonomies,
    GetTerms {
        taxonomy: String,
        query: TermQuery,
    },
    GetObjectsInTerm {
        term_ids: Vec<i64>,
        taxonomy: String,
        query: ObjectsQuery,
    },
    GetTermBy {
        field: TermField,
        value: String,
        taxonomy: String,
        output: TermOutput,
        filter: TermFilter,
    },
    TaxonomyExists {
        taxonomy: String,
    },
    TermExists {
        term: TermRef,
        taxonomy: String,
        parent: Option<i64>,
    },
    InsertTerm {
        name: String,
        taxonomy: String,
        options: InsertTermOptions,
    },
    SetObjectTerms {
        object_id: i64,
        terms: Vec<TermRef>,
        taxonomy: String,
        append: bool,
    },
    SnapshotTaxonomy,
    ApplyTaxonomySnapshot {
        source: i64,
        destination: i64,
    },
}

pub const OPERATION_NAMES: &[&str] = &[
    "get_taxonomies",
    "get_terms",
    "get_objects_in_term",
    "get_term_by",
    "taxonomy_exists",
    "term_exists",
    "insert_term",
    "set_object_terms",
    "snapshot_taxonomy",
    "apply_taxonomy_snapshot",
];

struct Args<'a> {
    op: &'a str,
    values: Vec<Value>,
}

impl Args<'_> {
    fn take(&mut self, index: usize) -> Value {
        self.values
            .get_mut(index)
            .map(Value::take)
            .unwrap_or(Value::Null)
    }

    fn required<T: DeserializeOwned>(&mut self, index: usize) -> Result<T> {
        let value = self.take(index);
        if value.is_null() {
            return Err(Error::BadRequest(format!(
                "{}: missing argument {}",
                self.op, index
            )));
        }
        self.decode(index, value)
    }

    fn optional<T: DeserializeOwned + Default>(&mut self, index: usize) -> Result<T> {
        let value = self.take(index);
        if value.is_null() {
            return Ok(T::default());
        }
        self.decode(index, value)
    }

    fn decode<T: DeserializeOwned>(&self, index: usize, value: Value) -> Result<T> {
        serde_json::from_value(value)
            .map_err(|e| Error::BadRequest(format!("{}: argument {}: {}", self.op, index, e)))
    }

    /// Strings pass through, numbers are rendered as decimal text.
    fn text(&mut self, index: usize) -> Result<String> {
        match self.take(index) {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Null => Err(Error::BadRequest(format!(
                "{}: missing argument {}",
                self.op, index
            ))),
            other => Err(Error::BadRequest(format!(
                "{}: argument {} must be a string, got {}",
                self.op, index, other
            ))),
        }
    }
}

impl TaxonomyOp {
    /// Decodes an operation from its wire name and positional arguments.
    pub fn from_wire(name: &str, args: Vec<Value>) -> Result<Self> {
        let mut args = Args {
            op: name,
            values: args,
        };

        let op = match name {
            "get_taxonomies" => Self::GetTaxonomies,
            "get_terms" => Self::GetTerms {
                taxonomy: args.required(0)?,
                query: args.optional(1)?,
            },
            "get_objects_in_term" => Self::GetObjectsInTerm {
                term_ids: args.required::<OneOrMany<i64>>(0)?.into(),
                taxonomy: args.required(1)?,
                query: args.optional(2)?,
            },
            "get_term_by" => Self::GetTermBy {
                field: args.required(0)?,
                value: args.text(1)?,
                taxonomy: args.required(2)?,
                output: args.optional(3)?,
                filter: args.optional(4)?,
            },
            "taxonomy_exists" => Self::TaxonomyExists {
                taxonomy: args.required(0)?,
            },
            "term_exists" => Self::TermExists {
                term: args.required(0)?,
                taxonomy: args.optional(1)?,
                parent: args.optional(2)?,
            },
            "insert_term" => Self::InsertTerm {
                name: args.required(0)?,
                taxonomy: args.required(1)?,
                options: args.optional(2)?,
            },
            "set_object_terms" => Self::SetObjectTerms {
                object_id: args.required(0)?,
                terms: args.required::<OneOrMany<TermRef>>(1)?.into(),
                taxonomy: args.required(2)?,
                append: args.optional(3)?,
            },
            "snapshot_taxonomy" => Self::SnapshotTaxonomy,
            "apply_taxonomy_snapshot" => Self::ApplyTaxonomySnapshot {
                source: args.required(0)?,
                destination: args.required(1)?,
            },
            other => return Err(Error::UnsupportedOperation(other.to_string())),
        };

        Ok(op)
    }

    /// Encodes the operation as its wire name and positional arguments.
    #[must_use]
    pub fn to_wire(&self) -> (&'static str, Vec<Value>) {
        let args = match self {
            Self::GetTaxonomies | Self::SnapshotTaxonomy => Vec::new(),
            Self::GetTerms { taxonomy, query } => vec![json!(taxonomy), json!(query)],
            Self::GetObjectsInTerm {
                term_ids,
                taxonomy,
                query,
            } => vec![json!(term_ids), json!(taxonomy), json!(query)],
            Self::GetTermBy {
                field,
                value,
                taxonomy,
                output,
                filter,
            } => vec![
                json!(field),
                json!(value),
                json!(taxonomy),
                json!(output),
                json!(filter),
            ],
            Self::TaxonomyExists { taxonomy } => vec![json!(taxonomy)],
            Self::TermExists {
                term,
                taxonomy,
                parent,
            } => vec![json!(term), json!(taxonomy), json!(parent)],
            Self::InsertTerm {
                name,
                taxonomy,
                options,
            } => vec![json!(name), json!(taxonomy), json!(options)],
            Self::SetObjectTerms {
                object_id,
                terms,
                taxonomy,
                append,
            } => vec![json!(object_id), json!(terms), json!(taxonomy), json!(append)],
            Self::ApplyTaxonomySnapshot {
                source,
                destination,
            } => vec![json!(source), json!(destination)],
        };

        (self.name(), args)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetTaxonomies => "get_taxonomies",
            Self::GetTerms { .. } => "get_terms",
            Self::GetObjectsInTerm { .. } => "get_objects_in_term",
            Self::GetTermBy { .. } => "get_term_by",
            Self::TaxonomyExists { .. } => "taxonomy_exists",
            Self::TermExists { .. } => "term_exists",
            Self::InsertTerm { .. } => "insert_term",
            Self::SetObjectTerms { .. } => "set_object_terms",
            Self::SnapshotTaxonomy => "snapshot_taxonomy",
            Self::ApplyTaxonomySnapshot { .. } => "apply_taxonomy_snapshot",
        }
    }

    /// Operations that change the tenant's terms or links. These are only
    /// accepted as POST requests.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::InsertTerm { .. } | Self::SetObjectTerms { .. } | Self::ApplyTaxonomySnapshot { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_operation_is_rejected() {
        let err = TaxonomyOp::from_wire("wp_delete_site", vec![json!(1)]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation(name) if name == "wp_delete_site"));
    }

    #[test]
    fn test_every_operation_name_survives_the_wire() {
        let ops = vec![
            TaxonomyOp::GetTaxonomies,
            TaxonomyOp::GetTerms {
                taxonomy: "category".into(),
                query: TermQuery::all(),
            },
            TaxonomyOp::GetObjectsInTerm {
                term_ids: vec![1, 2],
                taxonomy: "category".into(),
                query: ObjectsQuery {
                    order: SortOrder::Desc,
                },
            },
            TaxonomyOp::GetTermBy {
                field: TermField::Slug,
                value: "news".into(),
                taxonomy: "category".into(),
                output: TermOutput::ArrayN,
                filter: TermFilter::Display,
            },
            TaxonomyOp::TaxonomyExists {
                taxonomy: "post_tag".into(),
            },
            TaxonomyOp::TermExists {
                term: TermRef::Slug("news".into()),
                taxonomy: "category".into(),
                parent: Some(3),
            },
            TaxonomyOp::InsertTerm {
                name: "News".into(),
                taxonomy: "category".into(),
                options: InsertTermOptions {
                    parent: 2,
                    slug: Some("news".into()),
                },
            },
            TaxonomyOp::SetObjectTerms {
                object_id: 9,
                terms: vec![TermRef::Id(1), TermRef::Slug("news".into())],
                taxonomy: "category".into(),
                append: true,
            },
            TaxonomyOp::SnapshotTaxonomy,
            TaxonomyOp::ApplyTaxonomySnapshot {
                source: 2,
                destination: 1,
            },
        ];

        let names: Vec<&str> = ops.iter().map(TaxonomyOp::name).collect();
        assert_eq!(names, OPERATION_NAMES);

        for op in ops {
            let (name, args) = op.to_wire();
            assert_eq!(TaxonomyOp::from_wire(name, args).unwrap(), op);
        }
    }

    #[test]
    fn test_scalar_arguments_are_widened_to_lists() {
        let op = TaxonomyOp::from_wire("get_objects_in_term", vec![json!(4), json!("category")])
            .unwrap();
        assert_eq!(
            op,
            TaxonomyOp::GetObjectsInTerm {
                term_ids: vec![4],
                taxonomy: "category".into(),
                query: ObjectsQuery::default(),
            }
        );

        let op = TaxonomyOp::from_wire(
            "set_object_terms",
            vec![json!(9), json!("news"), json!("category")],
        )
        .unwrap();
        assert_eq!(
            op,
            TaxonomyOp::SetObjectTerms {
                object_id: 9,
                terms: vec![TermRef::Slug("news".into())],
                taxonomy: "category".into(),
                append: false,
            }
        );
    }

    #[test]
    fn test_get_terms_hides_empty_terms_by_default() {
        let op = TaxonomyOp::from_wire("get_terms", vec![json!("category")]).unwrap();
        let TaxonomyOp::GetTerms { query, .. } = op else {
            panic!("wrong variant");
        };
        assert!(query.hide_empty);
    }

    #[test]
    fn test_missing_required_argument() {
        let err = TaxonomyOp::from_wire("insert_term", vec![json!("News")]).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn test_get_term_by_accepts_numeric_value() {
        let op = TaxonomyOp::from_wire("get_term_by", vec![json!("id"), json!(7), json!("category")])
            .unwrap();
        let TaxonomyOp::GetTermBy { value, output, .. } = op else {
            panic!("wrong variant");
        };
        assert_eq!(value, "7");
        assert_eq!(output, TermOutput::Object);
    }

    #[test]
    fn test_write_operations() {
        let writes: Vec<&str> = OPERATION_NAMES
            .iter()
            .copied()
            .filter(|name| {
                let args = match *name {
                    "insert_term" => vec![json!("n"), json!("category")],
                    "set_object_terms" => vec![json!(1), json!([1]), json!("category")],
                    "apply_taxonomy_snapshot" => vec![json!(1), json!(2)],
                    "get_terms" | "taxonomy_exists" => vec![json!("category")],
                    "get_objects_in_term" => vec![json!([1]), json!("category")],
                    "get_term_by" => vec![json!("slug"), json!("a"), json!("category")],
                    "term_exists" => vec![json!("a")],
                    _ => vec![],
                };
                TaxonomyOp::from_wire(name, args).unwrap().is_write()
            })
            .collect();
        assert_eq!(
            writes,
            ["insert_term", "set_object_terms", "apply_taxonomy_snapshot"]
        );
    }
}
