mod server;
mod settings;

pub use server::{ServerConfig, db_path, nonce_secret_path, settings_path};
pub use settings::{BridgeMode, CommentOrder, Settings};
