mod cache;
mod schema;
mod sqlite;

pub use cache::ObjectCache;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Every content operation names the site it runs against; there is no
/// implicit "current site".
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Site operations
    /// Creates a site and registers the default taxonomies on it.
    fn create_site(&self, domain: &str, path: &str, url: &str) -> Result<Site>;
    fn get_site(&self, id: i64) -> Result<Option<Site>>;
    fn list_sites(&self) -> Result<Vec<Site>>;
    fn count_sites(&self) -> Result<usize>;
    fn delete_site(&self, id: i64) -> Result<bool>;

    // User operations
    fn create_user(&self, login: &str, email: &str, display_name: &str) -> Result<User>;
    fn get_user(&self, id: i64) -> Result<Option<User>>;
    /// Adds `user_id` to the site with `role`, replacing an existing role.
    fn add_user_to_site(&self, site_id: i64, user_id: i64, role: &str) -> Result<()>;
    fn get_user_role(&self, site_id: i64, user_id: i64) -> Result<Option<String>>;
    fn list_site_members(&self, site_id: i64) -> Result<Vec<(User, String)>>;

    // Post operations
    /// Inserts a post and returns the id allocated for it on `site_id`.
    fn insert_post(&self, site_id: i64, post: &NewPost) -> Result<i64>;
    fn get_post(&self, site_id: i64, id: i64) -> Result<Option<Post>>;
    /// Lists posts of any type and status whose parent is `parent`
    /// (0 for top-level posts), ordered by id.
    fn list_posts_by_parent(&self, site_id: i64, parent: i64) -> Result<Vec<Post>>;
    fn count_posts(&self, site_id: i64) -> Result<i64>;

    // Post meta operations
    fn add_post_meta(&self, site_id: i64, post_id: i64, key: &str, value: &str) -> Result<()>;
    /// Returns `(key, stored value)` pairs in insertion order.
    fn get_post_meta(&self, site_id: i64, post_id: i64) -> Result<Vec<(String, String)>>;

    // Taxonomy operations
    fn register_taxonomy(&self, site_id: i64, taxonomy: &Taxonomy) -> Result<()>;
    fn list_taxonomies(&self, site_id: i64) -> Result<Vec<Taxonomy>>;
    fn taxonomy_exists(&self, site_id: i64, name: &str) -> Result<bool>;

    // Term operations
    /// Fails with `AlreadyExists` when the slug is taken in the taxonomy.
    fn insert_term(&self, site_id: i64, term: &NewTerm) -> Result<Term>;
    fn get_term(&self, site_id: i64, taxonomy: &str, id: i64) -> Result<Option<Term>>;
    fn get_term_by_slug(&self, site_id: i64, taxonomy: &str, slug: &str) -> Result<Option<Term>>;
    fn get_term_by_name(&self, site_id: i64, taxonomy: &str, name: &str) -> Result<Option<Term>>;
    /// Lists every term of the taxonomy, empty ones included, ordered by id.
    fn list_terms(&self, site_id: i64, taxonomy: &str) -> Result<Vec<Term>>;
    fn objects_in_term(&self, site_id: i64, taxonomy: &str, term_ids: &[i64]) -> Result<Vec<i64>>;
    /// Links `object_id` to `term_ids`. Without `append`, the object's other
    /// links in the same taxonomy are removed first. Returns how many links
    /// were newly written.
    fn set_object_terms(
        &self,
        site_id: i64,
        object_id: i64,
        taxonomy: &str,
        term_ids: &[i64],
        append: bool,
    ) -> Result<usize>;
    fn list_object_terms(&self, site_id: i64, object_id: i64, taxonomy: &str) -> Result<Vec<Term>>;

    // Comment operations
    fn insert_comment(&self, site_id: i64, comment: &NewComment) -> Result<i64>;
    fn get_comment(&self, site_id: i64, id: i64) -> Result<Option<Comment>>;
    fn list_post_comments(&self, site_id: i64, post_id: i64) -> Result<Vec<Comment>>;

    // Network option operations
    fn set_network_option(&self, key: &str, value: &str) -> Result<()>;
    fn get_network_option(&self, key: &str) -> Result<Option<String>>;
    fn delete_network_option(&self, key: &str) -> Result<bool>;

    // Redirect operations
    fn upsert_redirect(&self, redirect: &Redirect) -> Result<()>;
    fn get_redirect(&self, old_site_id: i64, old_post_id: i64) -> Result<Option<Redirect>>;

    // Cache control
    /// Suspends (or resumes) both cache additions and invalidation.
    fn suspend_cache(&self, suspended: bool);
    fn cache_suspended(&self) -> bool;

    fn close(&self) -> Result<()>;
}
