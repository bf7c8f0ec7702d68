use chrono::{DateTime, Utc};

use super::reconcile::canonical_indices;
use super::tracked::TrackedPipeline;
use crate::gitlab::types::PipelineStatus;

/// The state published to consumers at the end of a cycle. Replaced as a
/// whole, never mutated mid-cycle, so readers always see a consistent view.
#[derive(Debug, Clone, Default)]
pub struct MonitorSnapshot {
    pub tracked: Vec<TrackedPipeline>,
    pub connected: bool,
    pub configured: bool,
    pub last_error: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
}

impl MonitorSnapshot {
    /// Only the canonical pipeline per project+branch, so a stale failure
    /// never overshadows a newer run of the same branch.
    pub fn canonical(&self) -> Vec<&TrackedPipeline> {
        canonical_indices(&self.tracked)
            .values()
            .map(|&idx| &self.tracked[idx])
            .collect()
    }

    /// The single most attention-worthy effective status across all tracked
    /// branches. Drives the headline of `check` output, as it drove the
    /// menu-bar icon in earlier incarnations of this tool.
    pub fn summary_status(&self) -> Option<PipelineStatus> {
        self.canonical()
            .into_iter()
            .map(TrackedPipeline::effective_status)
            .max_by_key(|status| status.priority())
    }
}
