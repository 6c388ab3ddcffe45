use tracing::info;

use super::run::MigrationRun;
use crate::bridge::{TaxonomyBridge, save_handoff};
use crate::error::Result;
use crate::store::Store;

/// Stores the run's snapshot and post remap for the pair, then has the
/// destination tenant apply them through the bridge.
///
/// The handoff records are left in place afterwards as an audit trail.
pub fn migrate_taxonomy(
    run: &mut MigrationRun,
    store: &dyn Store,
    bridge: &dyn TaxonomyBridge,
) -> Result<()> {
    let source = run.source.site_id;
    let destination = run.destination.site_id;

    save_handoff(store, source, destination, &run.taxonomy, &run.posts)?;
    let report = bridge.apply_taxonomy_snapshot(&run.destination, source, destination)?;

    info!(
        source,
        destination,
        created = report.created.len(),
        existing = report.existing.len(),
        linked = report.linked,
        skipped_links = report.skipped_links,
        "Applied taxonomy snapshot"
    );
    run.counters.terms_created = report.created.len();
    run.counters.terms_existing = report.existing.len();
    run.counters.links = report.linked;
    run.counters.skipped_links = report.skipped_links;
    Ok(())
}
