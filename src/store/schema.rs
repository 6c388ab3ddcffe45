pub const SCHEMA: &str = r#"
-- Sites of the network
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    domain TEXT NOT NULL,
    path TEXT NOT NULL DEFAULT '/',
    url TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(domain, path)
);

-- Users are shared by every site of the network
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    login TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL DEFAULT '',
    display_name TEXT NOT NULL DEFAULT '',
    created_at TEXT DEFAULT (datetime('now'))
);

-- Site membership: one role per user and site
CREATE TABLE IF NOT EXISTS site_members (
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (site_id, user_id)
);

-- Posts, pages, attachments and custom types. Ids are allocated per site.
CREATE TABLE IF NOT EXISTS posts (
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    id INTEGER NOT NULL,
    post_type TEXT NOT NULL DEFAULT 'post',
    status TEXT NOT NULL DEFAULT 'publish',
    author INTEGER NOT NULL DEFAULT 0,
    parent INTEGER NOT NULL DEFAULT 0,  -- 0 = top-level
    title TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    excerpt TEXT NOT NULL DEFAULT '',
    guid TEXT NOT NULL DEFAULT '',
    menu_order INTEGER NOT NULL DEFAULT 0,
    comment_status TEXT NOT NULL DEFAULT 'open',
    date TEXT NOT NULL,
    modified TEXT NOT NULL,
    PRIMARY KEY (site_id, id)
);

-- Multi-valued post metadata, values in stored (serialized) form
CREATE TABLE IF NOT EXISTS post_meta (
    meta_id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL,
    post_id INTEGER NOT NULL,
    meta_key TEXT NOT NULL,
    meta_value TEXT NOT NULL,
    FOREIGN KEY (site_id, post_id) REFERENCES posts(site_id, id) ON DELETE CASCADE
);

-- Taxonomies registered on a site
CREATE TABLE IF NOT EXISTS taxonomies (
    site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    hierarchical INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (site_id, name)
);

-- Terms. Ids are allocated per site, slugs are unique per taxonomy.
CREATE TABLE IF NOT EXISTS terms (
    site_id INTEGER NOT NULL,
    id INTEGER NOT NULL,
    taxonomy TEXT NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL,
    parent INTEGER NOT NULL DEFAULT 0,  -- 0 = root term
    PRIMARY KEY (site_id, id),
    UNIQUE(site_id, taxonomy, slug),
    FOREIGN KEY (site_id, taxonomy) REFERENCES taxonomies(site_id, name) ON DELETE CASCADE
);

-- Object-term links
CREATE TABLE IF NOT EXISTS term_relationships (
    site_id INTEGER NOT NULL,
    object_id INTEGER NOT NULL,
    term_id INTEGER NOT NULL,
    PRIMARY KEY (site_id, object_id, term_id),
    FOREIGN KEY (site_id, term_id) REFERENCES terms(site_id, id) ON DELETE CASCADE
);

-- Comments. Ids are allocated per site.
CREATE TABLE IF NOT EXISTS comments (
    site_id INTEGER NOT NULL,
    id INTEGER NOT NULL,
    post_id INTEGER NOT NULL,
    parent INTEGER NOT NULL DEFAULT 0,  -- 0 = top-level
    author TEXT NOT NULL DEFAULT '',
    author_email TEXT NOT NULL DEFAULT '',
    author_url TEXT NOT NULL DEFAULT '',
    user_id INTEGER NOT NULL DEFAULT 0,
    content TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'approved',
    comment_type TEXT NOT NULL DEFAULT 'comment',
    date TEXT NOT NULL,
    PRIMARY KEY (site_id, id),
    FOREIGN KEY (site_id, post_id) REFERENCES posts(site_id, id) ON DELETE CASCADE
);

-- Network-wide key/value records (taxonomy and remap handoff)
CREATE TABLE IF NOT EXISTS network_options (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Canonical redirects from consolidated posts to their copies
CREATE TABLE IF NOT EXISTS redirects (
    old_site_id INTEGER NOT NULL,
    old_post_id INTEGER NOT NULL,
    new_site_id INTEGER NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
    new_post_id INTEGER NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (old_site_id, old_post_id)
);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_posts_parent ON posts(site_id, parent);
CREATE INDEX IF NOT EXISTS idx_post_meta_post ON post_meta(site_id, post_id);
CREATE INDEX IF NOT EXISTS idx_terms_taxonomy ON terms(site_id, taxonomy);
CREATE INDEX IF NOT EXISTS idx_term_relationships_term ON term_relationships(site_id, term_id);
CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(site_id, post_id);
CREATE INDEX IF NOT EXISTS idx_site_members_user ON site_members(user_id);
"#;
