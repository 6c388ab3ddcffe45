use inquire::Text;

use crate::directory::SiteDirectory;
use crate::error::Error;
use crate::server::validation::{validate_domain, validate_site_path};
use crate::store::Store;

use super::pickers::{SiteDisplay, confirm_action, pick_site};
use super::{init_settings, init_store};

pub fn run_site_add(
    data_dir: String,
    domain: Option<String>,
    path: String,
    url: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let store = init_store(&data_dir)?;
    validate_site_path(&path).map_err(anyhow::Error::msg)?;

    let domain = if let Some(d) = domain {
        validate_domain(&d).map_err(anyhow::Error::msg)?;
        d
    } else if non_interactive {
        anyhow::bail!("--domain is required in non-interactive mode");
    } else {
        Text::new("Domain:")
            .with_validator(|input: &str| {
                Ok(validate_domain(input)
                    .map(|()| inquire::validator::Validation::Valid)
                    .unwrap_or_else(|e| inquire::validator::Validation::Invalid(e.into())))
            })
            .prompt()?
    };

    let url = url.unwrap_or_else(|| format!("http://{domain}{}", path.trim_end_matches('/')));
    let site = match store.create_site(&domain, &path, &url) {
        Ok(site) => site,
        Err(Error::AlreadyExists) => anyhow::bail!("Site '{}{}' already exists", domain, path),
        Err(e) => return Err(e.into()),
    };

    println!();
    println!("Created site #{} \"{}{}\"", site.id, site.domain, site.path);
    println!();

    Ok(())
}

pub fn run_site_list(data_dir: String, json: bool) -> anyhow::Result<()> {
    let store = init_store(&data_dir)?;
    let settings = init_settings(&data_dir)?;
    let directory =
        SiteDirectory::new(settings.site_cache_ttl(), settings.large_network_threshold);

    if json {
        let sites = directory.list(&store)?;
        println!("{}", serde_json::to_string_pretty(&sites)?);
        return Ok(());
    }

    let sites = store.list_sites()?;
    if sites.is_empty() {
        println!("No sites found.");
        return Ok(());
    }
    for site in sites {
        println!("{}", SiteDisplay { site });
    }

    Ok(())
}

pub fn run_site_remove(
    data_dir: String,
    site_id: Option<i64>,
    non_interactive: bool,
    yes: bool,
) -> anyhow::Result<()> {
    let store = init_store(&data_dir)?;

    let site = if let Some(id) = site_id {
        store
            .get_site(id)?
            .ok_or_else(|| anyhow::anyhow!("Site not found: {}", id))?
    } else if non_interactive {
        anyhow::bail!("--site-id is required in non-interactive mode");
    } else {
        match pick_site(&store)? {
            Some(site) => site,
            None => return Ok(()),
        }
    };

    let confirmed = confirm_action(
        &format!("Delete site #{} '{}' and all of its content?", site.id, site.domain),
        yes,
        non_interactive,
    )?;

    if !confirmed {
        println!("Cancelled.");
        return Ok(());
    }

    store.delete_site(site.id)?;

    println!();
    println!("Deleted site #{} '{}'", site.id, site.domain);
    println!();

    Ok(())
}
