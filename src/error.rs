use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("unknown site: {0}")]
    UnknownSite(i64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid or expired nonce")]
    InvalidNonce,

    #[error("unsupported bridge operation: {0}")]
    UnsupportedOperation(String),

    #[error("bridge call failed: {0}")]
    Bridge(String),

    #[error("malformed stored value: {0}")]
    StoredValue(String),

    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, Error>;
