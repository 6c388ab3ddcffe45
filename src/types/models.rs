use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One site of the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub domain: String,
    pub path: String,
    /// Base URL the site's bridge endpoint is served under.
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl Site {
    #[must_use]
    pub fn context(&self) -> TenantContext {
        TenantContext {
            site_id: self.id,
            base_url: self.url.clone(),
        }
    }
}

/// The tenant every storage or bridge call is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    pub site_id: i64,
    pub base_url: String,
}

impl TenantContext {
    #[must_use]
    pub fn bridge_url(&self) -> String {
        format!("{}/bridge/{}", self.base_url.trim_end_matches('/'), self.site_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSummary {
    pub id: i64,
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Records that `user_id` was given `role` on `site_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorGrant {
    pub user_id: i64,
    pub role: String,
    pub site_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub site_id: i64,
    #[serde(flatten)]
    pub fields: NewPost,
}

/// Insertable post fields. There is no id: the store always allocates one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub post_type: String,
    pub status: String,
    pub author: i64,
    /// Parent post id, 0 for top-level posts.
    pub parent: i64,
    pub title: String,
    pub name: String,
    pub content: String,
    pub excerpt: String,
    pub guid: String,
    pub menu_order: i64,
    pub comment_status: String,
    pub date: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl NewPost {
    /// A published post with empty body fields, mostly useful for fixtures.
    #[must_use]
    pub fn new(post_type: &str, title: &str, author: i64) -> Self {
        let now = Utc::now();
        Self {
            post_type: post_type.to_string(),
            status: "publish".to_string(),
            author,
            parent: 0,
            title: title.to_string(),
            name: super::slugify(title),
            content: String::new(),
            excerpt: String::new(),
            guid: String::new(),
            menu_order: 0,
            comment_status: "open".to_string(),
            date: now,
            modified: now,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: i64) -> Self {
        self.parent = parent;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub site_id: i64,
    #[serde(flatten)]
    pub fields: NewComment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub post_id: i64,
    /// Parent comment id, 0 for top-level comments.
    pub parent: i64,
    pub author: String,
    pub author_email: String,
    pub author_url: String,
    pub user_id: i64,
    pub content: String,
    pub status: String,
    pub comment_type: String,
    pub date: DateTime<Utc>,
}

impl NewComment {
    #[must_use]
    pub fn new(post_id: i64, author: &str, content: &str) -> Self {
        Self {
            post_id,
            parent: 0,
            author: author.to_string(),
            author_email: String::new(),
            author_url: String::new(),
            user_id: 0,
            content: content.to_string(),
            status: "approved".to_string(),
            comment_type: "comment".to_string(),
            date: Utc::now(),
        }
    }

    #[must_use]
    pub fn reply_to(mut self, parent: i64) -> Self {
        self.parent = parent;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    pub name: String,
    pub hierarchical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: i64,
    pub taxonomy: String,
    pub name: String,
    pub slug: String,
    /// Parent term id, 0 for root terms.
    pub parent: i64,
    /// Number of objects tagged with the term.
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTerm {
    pub taxonomy: String,
    pub name: String,
    pub slug: String,
    pub parent: i64,
}

/// A canonical redirect from a post of a consolidated site to its copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirect {
    pub old_site_id: i64,
    pub old_post_id: i64,
    pub new_site_id: i64,
    pub new_post_id: i64,
}
