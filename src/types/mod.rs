mod models;
mod remap;
mod stored_value;

pub use models::*;
pub use remap::IdRemap;
pub use stored_value::{MapKey, Scalar, StoredValue};

/// Taxonomies every new site starts with, as `(name, hierarchical)`.
pub const DEFAULT_TAXONOMIES: &[(&str, bool)] = &[("category", true), ("post_tag", false)];

/// Lowercases `input` and joins its alphanumeric runs with hyphens.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}
