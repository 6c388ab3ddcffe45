use std::fmt;

use chrono::{DateTime, Utc};
use inquire::{InquireError, MultiSelect, Select};

use crate::directory::SiteDirectory;
use crate::store::Store;
use crate::types::{Site, SiteSummary};

/// Site with its age for display
pub struct SiteDisplay {
    pub site: Site,
}

impl fmt::Display for SiteDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{}  {}{}  created {}",
            self.site.id,
            self.site.domain,
            self.site.path,
            format_relative_time(&self.site.created_at)
        )
    }
}

/// Directory entry for the consolidation pickers
#[derive(Clone)]
pub struct SummaryDisplay(pub SiteSummary);

impl fmt::Display for SummaryDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}  {}", self.0.id, self.0.domain)
    }
}

pub fn format_relative_time(dt: &DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(*dt);

    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if duration.num_minutes() < 60 {
        let mins = duration.num_minutes();
        if mins == 1 {
            "1 minute ago".to_string()
        } else {
            format!("{mins} minutes ago")
        }
    } else if duration.num_hours() < 24 {
        let hours = duration.num_hours();
        if hours == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{hours} hours ago")
        }
    } else {
        let days = duration.num_days();
        if days == 1 {
            "1 day ago".to_string()
        } else {
            format!("{days} days ago")
        }
    }
}

/// Pick a site from the full list
pub fn pick_site(store: &impl Store) -> anyhow::Result<Option<Site>> {
    let sites: Vec<SiteDisplay> = store
        .list_sites()?
        .into_iter()
        .map(|site| SiteDisplay { site })
        .collect();

    if sites.is_empty() {
        println!("No sites found.");
        return Ok(None);
    }

    let selection = Select::new("Select site:", sites)
        .with_page_size(15)
        .with_help_message("Type to filter, Enter to select")
        .with_vim_mode(true)
        .prompt();

    match selection {
        Ok(display) => Ok(Some(display.site)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Pick the sites to consolidate and the site receiving their content
pub fn pick_consolidation(
    store: &impl Store,
    directory: &SiteDirectory,
) -> anyhow::Result<Option<(Vec<i64>, i64)>> {
    let sites: Vec<SummaryDisplay> = directory
        .list(store)?
        .into_iter()
        .map(SummaryDisplay)
        .collect();

    if sites.is_empty() {
        anyhow::bail!(
            "No sites to pick from (the network may be too large to list). Pass --source and --destination."
        );
    }

    let sources = MultiSelect::new("Sites to consolidate:", sites.clone())
        .with_page_size(15)
        .with_help_message("Space to toggle, Enter to confirm")
        .with_vim_mode(true)
        .prompt();
    let sources: Vec<i64> = match sources {
        Ok(picked) => picked.into_iter().map(|d| d.0.id).collect(),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let destination = Select::new("Move content into:", sites)
        .with_page_size(15)
        .with_help_message("Type to filter, Enter to select")
        .with_vim_mode(true)
        .prompt();
    let destination = match destination {
        Ok(display) => display.0.id,
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    if sources.contains(&destination) {
        println!("Note: site #{destination} is the destination and will not be consolidated into itself.");
    }

    Ok(Some((sources, destination)))
}

pub fn confirm_action(message: &str, yes: bool, non_interactive: bool) -> anyhow::Result<bool> {
    if yes {
        Ok(true)
    } else if non_interactive {
        anyhow::bail!("--yes is required for destructive operations in non-interactive mode");
    } else {
        Ok(inquire::Confirm::new(message)
            .with_default(false)
            .prompt()?)
    }
}
