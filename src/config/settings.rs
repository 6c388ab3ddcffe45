use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_BRIDGE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_LARGE_NETWORK_THRESHOLD: usize = 10_000;
const DEFAULT_SITE_CACHE_TTL_SECS: u64 = 60 * 60 * 24 * 7;

/// How taxonomy operations reach the tenant they run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeMode {
    /// Direct call into the taxonomy service of this process.
    #[default]
    Local,
    /// Round-trip through the `/bridge/{site}` endpoint of the tenant.
    Http,
}

/// Insertion order for the comments of one migrated post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentOrder {
    /// Descending original comment id. Replies older than their parent keep
    /// the source parent id.
    #[default]
    Legacy,
    /// Parents are always inserted before their replies.
    ParentFirst,
}

/// Runtime settings read from `consolidator.toml` in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bridge: BridgeMode,
    pub bridge_timeout_secs: u64,
    pub large_network_threshold: usize,
    pub site_cache_ttl_secs: u64,
    pub uploads_dir: Option<PathBuf>,
    pub comment_order: CommentOrder,
    pub fallback_author_role: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bridge: BridgeMode::Local,
            bridge_timeout_secs: DEFAULT_BRIDGE_TIMEOUT_SECS,
            large_network_threshold: DEFAULT_LARGE_NETWORK_THRESHOLD,
            site_cache_ttl_secs: DEFAULT_SITE_CACHE_TTL_SECS,
            uploads_dir: None,
            comment_order: CommentOrder::Legacy,
            fallback_author_role: None,
        }
    }
}

impl Settings {
    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to encode settings: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }

    #[must_use]
    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_timeout_secs)
    }

    #[must_use]
    pub fn site_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.site_cache_ttl_secs)
    }

    /// Root under which every site keeps its `sites/<id>/files` upload tree.
    #[must_use]
    pub fn uploads_dir(&self, data_dir: &Path) -> PathBuf {
        self.uploads_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("uploads"))
    }
}
