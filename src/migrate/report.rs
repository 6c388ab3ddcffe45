use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline stages, in the order they run for each source tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Write,
    Authors,
    Taxonomy,
    Comments,
    Attachments,
    Redirects,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Write => "write",
            Stage::Authors => "authors",
            Stage::Taxonomy => "taxonomy",
            Stage::Comments => "comments",
            Stage::Attachments => "attachments",
            Stage::Redirects => "redirects",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairStatus {
    /// Every stage completed.
    Success,
    /// A stage failed after content was already written to the destination.
    Partial,
    /// A stage failed before anything was written.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairCounters {
    pub posts: usize,
    pub meta: usize,
    pub authors: usize,
    pub terms_created: usize,
    pub terms_existing: usize,
    pub links: usize,
    pub skipped_links: usize,
    pub comments: usize,
    pub files: usize,
    pub redirects: usize,
}

/// Outcome of migrating one source tenant into the destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    pub source: i64,
    pub destination: i64,
    pub status: PairStatus,
    /// The stage that failed, if any.
    pub stage: Option<Stage>,
    pub error: Option<String>,
    pub counters: PairCounters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub run_id: Uuid,
    pub destination: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pairs: Vec<PairReport>,
}

impl ConsolidationReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.pairs.iter().all(|p| p.status == PairStatus::Success)
    }
}
