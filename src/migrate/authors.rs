use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::run::MigrationRun;
use crate::error::Result;
use crate::store::Store;
use crate::types::AuthorGrant;

/// Adds every author of a migrated item to the destination with the role
/// they hold on the source.
///
/// Users already on the destination keep their role. Authors without a
/// source role get `fallback_role`, or are skipped when there is none.
pub fn grant_authors(
    run: &mut MigrationRun,
    store: &dyn Store,
    fallback_role: Option<&str>,
) -> Result<()> {
    let source = run.source.site_id;
    let destination = run.destination.site_id;
    let authors: BTreeSet<i64> = run
        .all_items()
        .map(|item| item.post.author)
        .filter(|author| *author > 0)
        .collect();

    for user_id in authors {
        if store.get_user(user_id)?.is_none() {
            warn!(user_id, "Author has no user account, skipping");
            continue;
        }
        if let Some(role) = store.get_user_role(destination, user_id)? {
            debug!(user_id, role = %role, "Author already a member of the destination");
            continue;
        }

        let role = match (store.get_user_role(source, user_id)?, fallback_role) {
            (Some(role), _) => role,
            (None, Some(fallback)) => fallback.to_string(),
            (None, None) => {
                warn!(user_id, site_id = source, "Author has no role on the source site, skipping");
                continue;
            }
        };

        store.add_user_to_site(destination, user_id, &role)?;
        run.grants.push(AuthorGrant {
            user_id,
            role,
            site_id: destination,
        });
    }

    run.counters.authors = run.grants.len();
    Ok(())
}
