use super::run::MigrationRun;
use crate::error::Result;
use crate::store::Store;
use crate::types::Redirect;

/// Records a redirect from every copied post's old location to its new one.
pub fn record_redirects(run: &mut MigrationRun, store: &dyn Store) -> Result<()> {
    for (old_post_id, new_post_id) in run.posts.iter() {
        store.upsert_redirect(&Redirect {
            old_site_id: run.source.site_id,
            old_post_id,
            new_site_id: run.destination.site_id,
            new_post_id,
        })?;
        run.counters.redirects += 1;
    }
    Ok(())
}
