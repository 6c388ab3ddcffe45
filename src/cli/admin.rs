use std::fs;
use std::path::PathBuf;

use chrono::Utc;

use crate::auth::{CONSOLIDATE_ACTION, NonceSigner};
use crate::config::{Settings, db_path, nonce_secret_path, settings_path};
use crate::store::{SqliteStore, Store};

#[cfg(unix)]
fn set_restrictive_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        tracing::warn!("Failed to set permissions on {}: {e}", path.display());
    }
}

pub fn run_init(data_dir: String, url: String, domain: String) -> anyhow::Result<()> {
    let data_path: PathBuf = data_dir.into();
    fs::create_dir_all(&data_path)?;

    let secret_file = nonce_secret_path(&data_path);
    if secret_file.exists() {
        anyhow::bail!(
            "Network already initialized. Nonce secret exists at: {}",
            secret_file.display()
        );
    }

    let store = SqliteStore::new(db_path(&data_path))?;
    store.initialize()?;

    fs::write(&secret_file, NonceSigner::generate_secret())?;
    #[cfg(unix)]
    set_restrictive_permissions(&secret_file);

    let settings_file = settings_path(&data_path);
    if !settings_file.exists() {
        Settings::default().save(&settings_file)?;
    }
    let settings = Settings::load(&settings_file)?;
    fs::create_dir_all(settings.uploads_dir(&data_path))?;

    let main_site = match store.list_sites()?.into_iter().next() {
        Some(site) => site,
        None => store.create_site(&domain, "/", &url)?,
    };

    println!();
    println!("Initialized network in {}", data_path.display());
    println!("  Main site:     #{} {} ({})", main_site.id, main_site.domain, main_site.url);
    println!("  Settings:      {}", settings_file.display());
    println!("  Nonce secret:  {}", secret_file.display());
    println!();

    Ok(())
}

pub fn run_nonce(data_dir: String) -> anyhow::Result<()> {
    let data_path: PathBuf = data_dir.into();
    let signer = NonceSigner::load(&nonce_secret_path(&data_path))?;
    println!("{}", signer.create(CONSOLIDATE_ACTION, Utc::now()));
    Ok(())
}
