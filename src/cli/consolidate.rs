use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use crate::directory::SiteDirectory;
use crate::migrate::{ConsolidationReport, ConsolidationRequest, Consolidator, PairStatus};
use crate::store::Store;

use super::pickers::pick_consolidation;
use super::{init_settings, init_store};

pub fn run_consolidate(
    data_dir: String,
    sources: Vec<i64>,
    destination: Option<i64>,
    json: bool,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let store = init_store(&data_dir)?;
    let settings = init_settings(&data_dir)?;

    let (sources, destination) = match destination {
        Some(destination) if !sources.is_empty() => (sources, destination),
        _ if non_interactive || !std::io::stdin().is_terminal() => {
            anyhow::bail!("--source and --destination are required in non-interactive mode");
        }
        _ => {
            let directory =
                SiteDirectory::new(settings.site_cache_ttl(), settings.large_network_threshold);
            match pick_consolidation(&store, &directory)? {
                Some(picked) => picked,
                None => return Ok(()),
            }
        }
    };

    let store: Arc<dyn Store> = Arc::new(store);
    let consolidator = Consolidator::from_settings(store, &settings, &PathBuf::from(&data_dir))?;
    let report = consolidator.run(&ConsolidationRequest::new(sources, destination))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    let failed = report
        .pairs
        .iter()
        .filter(|p| p.status != PairStatus::Success)
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} sources did not migrate cleanly", report.pairs.len());
    }

    Ok(())
}

fn print_report(report: &ConsolidationReport) {
    println!();
    println!("Consolidation {} into site #{}", report.run_id, report.destination);
    for pair in &report.pairs {
        let c = &pair.counters;
        let status = match pair.status {
            PairStatus::Success => "success",
            PairStatus::Partial => "partial",
            PairStatus::Failed => "failed",
        };
        println!(
            "  #{:<6} {:<8} posts {}  meta {}  authors {}  terms {}+{}  links {}  comments {}  files {}",
            pair.source,
            status,
            c.posts,
            c.meta,
            c.authors,
            c.terms_created,
            c.terms_existing,
            c.links,
            c.comments,
            c.files
        );
        if let (Some(stage), Some(error)) = (&pair.stage, &pair.error) {
            println!("          failed during {stage}: {error}");
        }
    }
    println!();
}
