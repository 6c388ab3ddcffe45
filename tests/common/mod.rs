#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use consolidator::auth::NonceSigner;
use consolidator::bridge::LocalBridge;
use consolidator::config::Settings;
use consolidator::migrate::{Consolidator, upload_root};
use consolidator::server::{AppState, create_router};
use consolidator::store::{SqliteStore, Store};
use consolidator::types::{NewComment, NewPost, Site, User};
use rusqlite::params;
use tempfile::TempDir;
use tokio::sync::oneshot;

pub const SECRET: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

/// A network database in a temp directory.
pub struct Network {
    pub temp_dir: TempDir,
    pub sqlite: Arc<SqliteStore>,
    pub store: Arc<dyn Store>,
}

impl Network {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let sqlite = Arc::new(
            SqliteStore::new(temp_dir.path().join("consolidator.db")).expect("open store"),
        );
        sqlite.initialize().expect("initialize store");
        let store: Arc<dyn Store> = sqlite.clone();
        Self {
            temp_dir,
            sqlite,
            store,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.temp_dir.path().join("uploads")
    }

    pub fn upload_root(&self, site_id: i64) -> PathBuf {
        upload_root(&self.uploads_dir(), site_id)
    }

    pub fn site(&self, domain: &str) -> Site {
        self.site_at(domain, &format!("http://{domain}"))
    }

    pub fn site_at(&self, domain: &str, url: &str) -> Site {
        self.store.create_site(domain, "/", url).expect("create site")
    }

    pub fn user(&self, login: &str) -> User {
        self.store
            .create_user(login, &format!("{login}@example.com"), login)
            .expect("create user")
    }

    /// Creates a user with a fixed id.
    pub fn user_with_id(&self, id: i64, login: &str) -> User {
        let user = self.user(login);
        self.sqlite
            .connection()
            .execute("UPDATE users SET id = ?1 WHERE id = ?2", params![id, user.id])
            .expect("renumber user");
        self.store.get_user(id).unwrap().expect("renumbered user")
    }

    pub fn post(&self, site_id: i64, post: &NewPost) -> i64 {
        self.store.insert_post(site_id, post).expect("insert post")
    }

    /// Inserts a post under a fixed id. Must run before meta is added.
    pub fn post_with_id(&self, site_id: i64, id: i64, post: &NewPost) -> i64 {
        let allocated = self.post(site_id, post);
        self.sqlite
            .connection()
            .execute(
                "UPDATE posts SET id = ?1 WHERE site_id = ?2 AND id = ?3",
                params![id, site_id, allocated],
            )
            .expect("renumber post");
        id
    }

    /// Inserts a comment under a fixed id.
    pub fn comment_with_id(&self, site_id: i64, id: i64, comment: &NewComment) -> i64 {
        let allocated = self.store.insert_comment(site_id, comment).expect("insert comment");
        self.sqlite
            .connection()
            .execute(
                "UPDATE comments SET id = ?1 WHERE site_id = ?2 AND id = ?3",
                params![id, site_id, allocated],
            )
            .expect("renumber comment");
        id
    }

    /// Engine running taxonomy operations in-process.
    pub fn engine(&self) -> Consolidator {
        Consolidator::new(
            self.store.clone(),
            Arc::new(LocalBridge::new(self.store.clone())),
            self.uploads_dir(),
        )
    }

    pub fn settings(&self) -> Settings {
        Settings {
            uploads_dir: Some(self.uploads_dir()),
            ..Settings::default()
        }
    }

    pub fn state(&self, settings: Settings) -> Arc<AppState> {
        Arc::new(AppState::new(
            self.store.clone(),
            self.data_dir(),
            settings,
            NonceSigner::from_hex(SECRET).expect("nonce secret"),
            None,
        ))
    }
}

/// The HTTP server running on an ephemeral port in its own runtime thread.
pub struct TestServer {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start(state: Arc<AppState>) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        listener.set_nonblocking(true).expect("nonblocking");
        let (tx, rx) = oneshot::channel::<()>();

        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("build runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
                axum::serve(listener, create_router(state))
                    .with_graceful_shutdown(async {
                        rx.await.ok();
                    })
                    .await
                    .expect("serve");
            });
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            shutdown: Some(tx),
            thread: Some(thread),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
