//! The site consolidation engine.
//!
//! For every source site the engine runs a fixed pipeline against the
//! destination: extract, write, authors, taxonomy, comments, attachments and
//! redirects. Sources are processed one after the other, each with a fresh
//! [`MigrationRun`]. Nothing is rolled back when a stage fails: content
//! written before the failure stays on the destination.

mod attachments;
mod authors;
mod comments;
mod extract;
mod redirects;
mod report;
mod run;
mod taxonomy;
mod write;

pub use attachments::{copy_tree, upload_root};
pub use authors::grant_authors;
pub use comments::migrate_comments;
pub use extract::extract;
pub use redirects::record_redirects;
pub use report::{ConsolidationReport, PairCounters, PairReport, PairStatus, Stage};
pub use run::{ContentItem, MigrationRun};
pub use taxonomy::migrate_taxonomy;
pub use write::write;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::bridge::{HttpBridge, LocalBridge, TaxonomyBridge};
use crate::config::{BridgeMode, CommentOrder, Settings};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::Site;

/// Sources to fold into one destination site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationRequest {
    pub sources: Vec<i64>,
    pub destination: i64,
}

impl ConsolidationRequest {
    #[must_use]
    pub fn new(sources: Vec<i64>, destination: i64) -> Self {
        Self {
            sources,
            destination,
        }
    }

    /// Sources in request order, without duplicates or the destination.
    #[must_use]
    pub fn normalized_sources(&self) -> Vec<i64> {
        let mut sources = Vec::with_capacity(self.sources.len());
        for id in &self.sources {
            if *id != self.destination && !sources.contains(id) {
                sources.push(*id);
            }
        }
        sources
    }
}

/// Keeps the store's cache suspended while alive.
pub struct CacheSuspension<'a> {
    store: &'a dyn Store,
}

impl<'a> CacheSuspension<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        store.suspend_cache(true);
        Self { store }
    }
}

impl Drop for CacheSuspension<'_> {
    fn drop(&mut self) {
        self.store.suspend_cache(false);
    }
}

pub struct Consolidator {
    store: Arc<dyn Store>,
    bridge: Arc<dyn TaxonomyBridge>,
    uploads_dir: PathBuf,
    comment_order: CommentOrder,
    fallback_author_role: Option<String>,
}

impl Consolidator {
    pub fn new(store: Arc<dyn Store>, bridge: Arc<dyn TaxonomyBridge>, uploads_dir: PathBuf) -> Self {
        Self {
            store,
            bridge,
            uploads_dir,
            comment_order: CommentOrder::default(),
            fallback_author_role: None,
        }
    }

    /// Builds an engine configured from `settings`, with the bridge the
    /// settings select.
    ///
    /// An HTTP bridge holds a blocking client, so this must not be called
    /// from async code.
    pub fn from_settings(store: Arc<dyn Store>, settings: &Settings, data_dir: &Path) -> Result<Self> {
        let bridge: Arc<dyn TaxonomyBridge> = match settings.bridge {
            BridgeMode::Local => Arc::new(LocalBridge::new(store.clone())),
            BridgeMode::Http => Arc::new(HttpBridge::new(settings.bridge_timeout())?),
        };

        Ok(Self::new(store, bridge, settings.uploads_dir(data_dir))
            .comment_order(settings.comment_order)
            .fallback_author_role(settings.fallback_author_role.clone()))
    }

    #[must_use]
    pub fn comment_order(mut self, order: CommentOrder) -> Self {
        self.comment_order = order;
        self
    }

    #[must_use]
    pub fn fallback_author_role(mut self, role: Option<String>) -> Self {
        self.fallback_author_role = role;
        self
    }

    /// Migrates every requested source into the destination, one at a time.
    ///
    /// Fails only when the request itself is unusable; per-source failures
    /// are reported in the returned report.
    pub fn run(&self, request: &ConsolidationRequest) -> Result<ConsolidationReport> {
        let sources = request.normalized_sources();
        if sources.is_empty() {
            return Err(Error::BadRequest("no source sites to consolidate".to_string()));
        }
        let destination = self
            .store
            .get_site(request.destination)?
            .ok_or(Error::UnknownSite(request.destination))?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, destination = destination.id, ?sources, "Starting consolidation");

        let pairs: Vec<PairReport> = {
            let _suspended = CacheSuspension::new(self.store.as_ref());
            sources
                .into_iter()
                .map(|source| self.migrate_pair(source, &destination))
                .collect()
        };

        let report = ConsolidationReport {
            run_id,
            destination: destination.id,
            started_at,
            finished_at: Utc::now(),
            pairs,
        };
        info!(%run_id, success = report.is_success(), "Consolidation finished");
        Ok(report)
    }

    fn migrate_pair(&self, source_id: i64, destination: &Site) -> PairReport {
        let mut report = PairReport {
            source: source_id,
            destination: destination.id,
            status: PairStatus::Success,
            stage: None,
            error: None,
            counters: PairCounters::default(),
        };

        let source = match self.store.get_site(source_id) {
            Ok(Some(site)) => site,
            Ok(None) => return fail(report, Stage::Extract, Error::UnknownSite(source_id)),
            Err(e) => return fail(report, Stage::Extract, e),
        };

        let mut run = MigrationRun::new(source.context(), destination.context());
        let outcome = self.run_stages(&mut run);
        report.counters = run.counters;

        match outcome {
            Ok(()) => {
                info!(source = source_id, destination = destination.id, counters = ?report.counters, "Source migrated");
                report
            }
            Err((stage, e)) => fail(report, stage, e),
        }
    }

    fn run_stages(&self, run: &mut MigrationRun) -> std::result::Result<(), (Stage, Error)> {
        let store = self.store.as_ref();
        let bridge = self.bridge.as_ref();

        extract(run, store, bridge).map_err(at(Stage::Extract))?;
        write(run, store).map_err(at(Stage::Write))?;
        grant_authors(run, store, self.fallback_author_role.as_deref()).map_err(at(Stage::Authors))?;
        migrate_taxonomy(run, store, bridge).map_err(at(Stage::Taxonomy))?;
        migrate_comments(run, store, self.comment_order).map_err(at(Stage::Comments))?;

        let source_root = upload_root(&self.uploads_dir, run.source.site_id);
        let dest_root = upload_root(&self.uploads_dir, run.destination.site_id);
        run.counters.files = copy_tree(&source_root, &dest_root).map_err(at(Stage::Attachments))?;

        record_redirects(run, store).map_err(at(Stage::Redirects))?;
        Ok(())
    }
}

fn at(stage: Stage) -> impl FnOnce(Error) -> (Stage, Error) {
    move |e| (stage, e)
}

fn fail(mut report: PairReport, stage: Stage, e: Error) -> PairReport {
    report.status = if report.counters.posts == 0 {
        PairStatus::Failed
    } else {
        PairStatus::Partial
    };
    error!(source = report.source, destination = report.destination, %stage, error = %e, "Source migration failed");
    report.stage = Some(stage);
    report.error = Some(e.to_string());
    report
}
