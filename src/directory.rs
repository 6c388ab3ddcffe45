use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::store::Store;
use crate::types::SiteSummary;

/// Cached `(id, domain)` list of the network's sites, used to pick
/// consolidation sources and destination.
pub struct SiteDirectory {
    ttl: Duration,
    large_network_threshold: usize,
    cached: Mutex<Option<(Instant, Vec<SiteSummary>)>>,
}

impl SiteDirectory {
    #[must_use]
    pub fn new(ttl: Duration, large_network_threshold: usize) -> Self {
        Self {
            ttl,
            large_network_threshold,
            cached: Mutex::new(None),
        }
    }

    /// Returns the site list, or an empty list on networks larger than the
    /// threshold.
    pub fn list(&self, store: &dyn Store) -> Result<Vec<SiteSummary>> {
        if store.count_sites()? > self.large_network_threshold {
            return Ok(Vec::new());
        }

        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((at, sites)) = cached.as_ref() {
            if at.elapsed() < self.ttl {
                return Ok(sites.clone());
            }
        }

        let sites: Vec<SiteSummary> = store
            .list_sites()?
            .into_iter()
            .map(|site| SiteSummary {
                id: site.id,
                domain: site.domain,
            })
            .collect();
        *cached = Some((Instant::now(), sites.clone()));
        Ok(sites)
    }

    /// Drops the cached list; called whenever a site is created or deleted.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
