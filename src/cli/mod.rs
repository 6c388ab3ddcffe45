mod admin;
mod commands;
mod consolidate;
pub mod pickers;
mod site;

pub use admin::{run_init, run_nonce};
pub use commands::{AdminCommands, SiteCommands};
pub use consolidate::run_consolidate;
pub use site::{run_site_add, run_site_list, run_site_remove};

use std::path::Path;

use crate::config::{Settings, db_path, settings_path};
use crate::store::SqliteStore;

/// Initialize store from data directory, checking it exists
pub fn init_store(data_dir: &str) -> anyhow::Result<SqliteStore> {
    let db_path = db_path(Path::new(data_dir));

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'consolidator admin init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(&db_path).map_err(Into::into)
}

/// Load `consolidator.toml` from the data directory, or the defaults
pub fn init_settings(data_dir: &str) -> anyhow::Result<Settings> {
    Settings::load(&settings_path(Path::new(data_dir))).map_err(Into::into)
}
