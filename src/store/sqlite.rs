use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::cache::ObjectCache;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const SITE_COLUMNS: &str = "id, domain, path, url, created_at";
const USER_COLUMNS: &str = "id, login, email, display_name, created_at";
const POST_COLUMNS: &str = "site_id, id, post_type, status, author, parent, title, name, content, \
     excerpt, guid, menu_order, comment_status, date, modified";
const COMMENT_COLUMNS: &str = "site_id, id, post_id, parent, author, author_email, author_url, \
     user_id, content, status, comment_type, date";
const TERM_COLUMNS: &str = "t.id, t.taxonomy, t.name, t.slug, t.parent, \
     (SELECT COUNT(*) FROM term_relationships r WHERE r.site_id = t.site_id AND r.term_id = t.id)";

type TermKey = (i64, String, String);

pub struct SqliteStore {
    conn: Mutex<Connection>,
    sites: ObjectCache<i64, Site>,
    terms_by_slug: ObjectCache<TermKey, Term>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
            sites: ObjectCache::new(),
            terms_by_slug: ObjectCache::new(),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }

    fn query_terms(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Term>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, term_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        domain: row.get(1)?,
        path: row.get(2)?,
        url: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        login: row.get(1)?,
        email: row.get(2)?,
        display_name: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        site_id: row.get(0)?,
        id: row.get(1)?,
        fields: NewPost {
            post_type: row.get(2)?,
            status: row.get(3)?,
            author: row.get(4)?,
            parent: row.get(5)?,
            title: row.get(6)?,
            name: row.get(7)?,
            content: row.get(8)?,
            excerpt: row.get(9)?,
            guid: row.get(10)?,
            menu_order: row.get(11)?,
            comment_status: row.get(12)?,
            date: parse_datetime(&row.get::<_, String>(13)?),
            modified: parse_datetime(&row.get::<_, String>(14)?),
        },
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        site_id: row.get(0)?,
        id: row.get(1)?,
        fields: NewComment {
            post_id: row.get(2)?,
            parent: row.get(3)?,
            author: row.get(4)?,
            author_email: row.get(5)?,
            author_url: row.get(6)?,
            user_id: row.get(7)?,
            content: row.get(8)?,
            status: row.get(9)?,
            comment_type: row.get(10)?,
            date: parse_datetime(&row.get::<_, String>(11)?),
        },
    })
}

fn term_from_row(row: &Row<'_>) -> rusqlite::Result<Term> {
    Ok(Term {
        id: row.get(0)?,
        taxonomy: row.get(1)?,
        name: row.get(2)?,
        slug: row.get(3)?,
        parent: row.get(4)?,
        count: row.get(5)?,
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Site operations

    fn create_site(&self, domain: &str, path: &str, url: &str) -> Result<Site> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let inserted = tx.query_row(
            &format!(
                "INSERT INTO sites (domain, path, url, created_at) VALUES (?1, ?2, ?3, ?4)
                 RETURNING {SITE_COLUMNS}"
            ),
            params![domain, path, url, format_datetime(&Utc::now())],
            site_from_row,
        );
        let site = match inserted {
            Ok(site) => site,
            Err(e) if is_constraint_violation(&e) => return Err(Error::AlreadyExists),
            Err(e) => return Err(e.into()),
        };

        for (name, hierarchical) in DEFAULT_TAXONOMIES {
            tx.execute(
                "INSERT INTO taxonomies (site_id, name, hierarchical) VALUES (?1, ?2, ?3)",
                params![site.id, name, hierarchical],
            )?;
        }

        tx.commit()?;
        Ok(site)
    }

    fn get_site(&self, id: i64) -> Result<Option<Site>> {
        if let Some(site) = self.sites.get(&id) {
            return Ok(Some(site));
        }

        let site = self
            .conn()
            .query_row(
                &format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?1"),
                params![id],
                site_from_row,
            )
            .optional()?;

        if let Some(site) = &site {
            self.sites.add(id, site.clone());
        }
        Ok(site)
    }

    fn list_sites(&self) -> Result<Vec<Site>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {SITE_COLUMNS} FROM sites ORDER BY id"))?;
        let rows = stmt.query_map([], site_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_sites(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM sites", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn delete_site(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sites WHERE id = ?1", params![id])?;
        self.sites.invalidate(&id);
        self.terms_by_slug.invalidate_where(|(site_id, _, _)| *site_id == id);
        Ok(rows > 0)
    }

    // User operations

    fn create_user(&self, login: &str, email: &str, display_name: &str) -> Result<User> {
        let inserted = self.conn().query_row(
            &format!(
                "INSERT INTO users (login, email, display_name, created_at) VALUES (?1, ?2, ?3, ?4)
                 RETURNING {USER_COLUMNS}"
            ),
            params![login, email, display_name, format_datetime(&Utc::now())],
            user_from_row,
        );

        match inserted {
            Ok(user) => Ok(user),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn add_user_to_site(&self, site_id: i64, user_id: i64, role: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO site_members (site_id, user_id, role, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(site_id, user_id) DO UPDATE SET role = excluded.role",
            params![site_id, user_id, role, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn get_user_role(&self, site_id: i64, user_id: i64) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT role FROM site_members WHERE site_id = ?1 AND user_id = ?2",
                params![site_id, user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_site_members(&self, site_id: i64) -> Result<Vec<(User, String)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.login, u.email, u.display_name, u.created_at, m.role
             FROM users u JOIN site_members m ON m.user_id = u.id
             WHERE m.site_id = ?1 ORDER BY u.id",
        )?;
        let rows = stmt.query_map(params![site_id], |row| {
            Ok((user_from_row(row)?, row.get::<_, String>(5)?))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Post operations

    fn insert_post(&self, site_id: i64, post: &NewPost) -> Result<i64> {
        let id = self.conn().query_row(
            "INSERT INTO posts (site_id, id, post_type, status, author, parent, title, name, content,
                                excerpt, guid, menu_order, comment_status, date, modified)
             VALUES (?1, (SELECT COALESCE(MAX(id), 0) + 1 FROM posts WHERE site_id = ?1),
                     ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             RETURNING id",
            params![
                site_id,
                post.post_type,
                post.status,
                post.author,
                post.parent,
                post.title,
                post.name,
                post.content,
                post.excerpt,
                post.guid,
                post.menu_order,
                post.comment_status,
                format_datetime(&post.date),
                format_datetime(&post.modified),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_post(&self, site_id: i64, id: i64) -> Result<Option<Post>> {
        self.conn()
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE site_id = ?1 AND id = ?2"),
                params![site_id, id],
                post_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_posts_by_parent(&self, site_id: i64, parent: i64) -> Result<Vec<Post>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE site_id = ?1 AND parent = ?2 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![site_id, parent], post_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_posts(&self, site_id: i64) -> Result<i64> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM posts WHERE site_id = ?1",
                params![site_id],
                |row| row.get(0),
            )
            .map_err(Error::from)
    }

    // Post meta operations

    fn add_post_meta(&self, site_id: i64, post_id: i64, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO post_meta (site_id, post_id, meta_key, meta_value) VALUES (?1, ?2, ?3, ?4)",
            params![site_id, post_id, key, value],
        )?;
        Ok(())
    }

    fn get_post_meta(&self, site_id: i64, post_id: i64) -> Result<Vec<(String, String)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT meta_key, meta_value FROM post_meta
             WHERE site_id = ?1 AND post_id = ?2 ORDER BY meta_id",
        )?;
        let rows = stmt.query_map(params![site_id, post_id], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Taxonomy operations

    fn register_taxonomy(&self, site_id: i64, taxonomy: &Taxonomy) -> Result<()> {
        self.conn().execute(
            "INSERT INTO taxonomies (site_id, name, hierarchical) VALUES (?1, ?2, ?3)
             ON CONFLICT(site_id, name) DO UPDATE SET hierarchical = excluded.hierarchical",
            params![site_id, taxonomy.name, taxonomy.hierarchical],
        )?;
        Ok(())
    }

    fn list_taxonomies(&self, site_id: i64) -> Result<Vec<Taxonomy>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT name, hierarchical FROM taxonomies WHERE site_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![site_id], |row| {
            Ok(Taxonomy {
                name: row.get(0)?,
                hierarchical: row.get(1)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn taxonomy_exists(&self, site_id: i64, name: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM taxonomies WHERE site_id = ?1 AND name = ?2",
            params![site_id, name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Term operations

    fn insert_term(&self, site_id: i64, term: &NewTerm) -> Result<Term> {
        let inserted = self.conn().query_row(
            "INSERT INTO terms (site_id, id, taxonomy, name, slug, parent)
             VALUES (?1, (SELECT COALESCE(MAX(id), 0) + 1 FROM terms WHERE site_id = ?1),
                     ?2, ?3, ?4, ?5)
             RETURNING id",
            params![site_id, term.taxonomy, term.name, term.slug, term.parent],
            |row| row.get::<_, i64>(0),
        );

        match inserted {
            Ok(id) => Ok(Term {
                id,
                taxonomy: term.taxonomy.clone(),
                name: term.name.clone(),
                slug: term.slug.clone(),
                parent: term.parent,
                count: 0,
            }),
            Err(e) if is_constraint_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn get_term(&self, site_id: i64, taxonomy: &str, id: i64) -> Result<Option<Term>> {
        let mut terms = self.query_terms(
            &format!(
                "SELECT {TERM_COLUMNS} FROM terms t
                 WHERE t.site_id = ?1 AND t.taxonomy = ?2 AND t.id = ?3"
            ),
            params![site_id, taxonomy, id],
        )?;
        Ok(terms.pop())
    }

    fn get_term_by_slug(&self, site_id: i64, taxonomy: &str, slug: &str) -> Result<Option<Term>> {
        let key = (site_id, taxonomy.to_string(), slug.to_string());
        if let Some(term) = self.terms_by_slug.get(&key) {
            return Ok(Some(term));
        }

        let term = self
            .query_terms(
                &format!(
                    "SELECT {TERM_COLUMNS} FROM terms t
                     WHERE t.site_id = ?1 AND t.taxonomy = ?2 AND t.slug = ?3"
                ),
                params![site_id, taxonomy, slug],
            )?
            .pop();

        if let Some(term) = &term {
            self.terms_by_slug.add(key, term.clone());
        }
        Ok(term)
    }

    fn get_term_by_name(&self, site_id: i64, taxonomy: &str, name: &str) -> Result<Option<Term>> {
        let mut terms = self.query_terms(
            &format!(
                "SELECT {TERM_COLUMNS} FROM terms t
                 WHERE t.site_id = ?1 AND t.taxonomy = ?2 AND t.name = ?3
                 ORDER BY t.id LIMIT 1"
            ),
            params![site_id, taxonomy, name],
        )?;
        Ok(terms.pop())
    }

    fn list_terms(&self, site_id: i64, taxonomy: &str) -> Result<Vec<Term>> {
        self.query_terms(
            &format!(
                "SELECT {TERM_COLUMNS} FROM terms t
                 WHERE t.site_id = ?1 AND t.taxonomy = ?2 ORDER BY t.id"
            ),
            params![site_id, taxonomy],
        )
    }

    fn objects_in_term(&self, site_id: i64, taxonomy: &str, term_ids: &[i64]) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT r.object_id FROM term_relationships r
             JOIN terms t ON t.site_id = r.site_id AND t.id = r.term_id
             WHERE r.site_id = ?1 AND t.taxonomy = ?2 AND r.term_id = ?3",
        )?;

        let mut objects: Vec<i64> = Vec::new();
        for term_id in term_ids {
            let rows =
                stmt.query_map(params![site_id, taxonomy, term_id], |row| row.get::<_, i64>(0))?;
            for row in rows {
                objects.push(row?);
            }
        }
        objects.sort_unstable();
        objects.dedup();
        Ok(objects)
    }

    fn set_object_terms(
        &self,
        site_id: i64,
        object_id: i64,
        taxonomy: &str,
        term_ids: &[i64],
        append: bool,
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if !append {
            tx.execute(
                "DELETE FROM term_relationships
                 WHERE site_id = ?1 AND object_id = ?2
                   AND term_id IN (SELECT id FROM terms WHERE site_id = ?1 AND taxonomy = ?3)",
                params![site_id, object_id, taxonomy],
            )?;
        }

        let mut written = 0;
        for term_id in term_ids {
            written += tx.execute(
                "INSERT OR IGNORE INTO term_relationships (site_id, object_id, term_id)
                 VALUES (?1, ?2, ?3)",
                params![site_id, object_id, term_id],
            )?;
        }

        tx.commit()?;
        drop(conn);

        // Cached terms carry a count.
        self.terms_by_slug
            .invalidate_where(|(site, tax, _)| *site == site_id && tax == taxonomy);
        Ok(written)
    }

    fn list_object_terms(&self, site_id: i64, object_id: i64, taxonomy: &str) -> Result<Vec<Term>> {
        self.query_terms(
            &format!(
                "SELECT {TERM_COLUMNS} FROM terms t
                 JOIN term_relationships rel ON rel.site_id = t.site_id AND rel.term_id = t.id
                 WHERE t.site_id = ?1 AND rel.object_id = ?2 AND t.taxonomy = ?3
                 ORDER BY t.id"
            ),
            params![site_id, object_id, taxonomy],
        )
    }

    // Comment operations

    fn insert_comment(&self, site_id: i64, comment: &NewComment) -> Result<i64> {
        let id = self.conn().query_row(
            "INSERT INTO comments (site_id, id, post_id, parent, author, author_email, author_url,
                                   user_id, content, status, comment_type, date)
             VALUES (?1, (SELECT COALESCE(MAX(id), 0) + 1 FROM comments WHERE site_id = ?1),
                     ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             RETURNING id",
            params![
                site_id,
                comment.post_id,
                comment.parent,
                comment.author,
                comment.author_email,
                comment.author_url,
                comment.user_id,
                comment.content,
                comment.status,
                comment.comment_type,
                format_datetime(&comment.date),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_comment(&self, site_id: i64, id: i64) -> Result<Option<Comment>> {
        self.conn()
            .query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE site_id = ?1 AND id = ?2"),
                params![site_id, id],
                comment_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_post_comments(&self, site_id: i64, post_id: i64) -> Result<Vec<Comment>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments
             WHERE site_id = ?1 AND post_id = ?2 ORDER BY date DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![site_id, post_id], comment_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Network option operations

    fn set_network_option(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO network_options (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    fn get_network_option(&self, key: &str) -> Result<Option<String>> {
        self.conn()
            .query_row(
                "SELECT value FROM network_options WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Error::from)
    }

    fn delete_network_option(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM network_options WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    // Redirect operations

    fn upsert_redirect(&self, redirect: &Redirect) -> Result<()> {
        self.conn().execute(
            "INSERT INTO redirects (old_site_id, old_post_id, new_site_id, new_post_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(old_site_id, old_post_id) DO UPDATE SET
                new_site_id = excluded.new_site_id,
                new_post_id = excluded.new_post_id",
            params![
                redirect.old_site_id,
                redirect.old_post_id,
                redirect.new_site_id,
                redirect.new_post_id,
                format_datetime(&Utc::now()),
            ],
        )?;
        Ok(())
    }

    fn get_redirect(&self, old_site_id: i64, old_post_id: i64) -> Result<Option<Redirect>> {
        self.conn()
            .query_row(
                "SELECT old_site_id, old_post_id, new_site_id, new_post_id FROM redirects
                 WHERE old_site_id = ?1 AND old_post_id = ?2",
                params![old_site_id, old_post_id],
                |row| {
                    Ok(Redirect {
                        old_site_id: row.get(0)?,
                        old_post_id: row.get(1)?,
                        new_site_id: row.get(2)?,
                        new_post_id: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    // Cache control

    fn suspend_cache(&self, suspended: bool) {
        self.sites.suspend_additions(suspended);
        self.sites.suspend_invalidation(suspended);
        self.terms_by_slug.suspend_additions(suspended);
        self.terms_by_slug.suspend_invalidation(suspended);

        // Invalidations dropped while suspended leave stale rows behind.
        if !suspended {
            self.sites.clear();
            self.terms_by_slug.clear();
        }
    }

    fn cache_suspended(&self) -> bool {
        self.sites.is_suspended() || self.terms_by_slug.is_suspended()
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
