use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Public base URL for external access (e.g., "https://network.example.com").
    /// Used as the bridge endpoint base for sites registered without a URL.
    pub public_base_url: Option<String>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        db_path(&self.data_dir)
    }

    #[must_use]
    pub fn nonce_secret_path(&self) -> PathBuf {
        nonce_secret_path(&self.data_dir)
    }

    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        settings_path(&self.data_dir)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            public_base_url: None,
        }
    }
}

#[must_use]
pub fn db_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("consolidator.db")
}

#[must_use]
pub fn nonce_secret_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join(".nonce_secret")
}

#[must_use]
pub fn settings_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("consolidator.toml")
}
