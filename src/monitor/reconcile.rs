use futures::future::join_all;
use indexmap::IndexMap;
use log::debug;

use super::tracked::TrackedPipeline;
use crate::gitlab::types::{Pipeline, PipelineStatus};
use crate::gitlab::GitLabClient;

/// Pipelines are canonicalized per project and ref.
pub type BranchKey = (u64, String);

/// Selects the canonical pipeline per (project, ref): the one with the highest
/// id, since ids are assigned monotonically and are a reliable recency proxy
/// where timestamps may tie. Non-canonical duplicates stay in the tracked set;
/// they are just not used for branch-level summaries.
pub fn canonical_indices(tracked: &[TrackedPipeline]) -> IndexMap<BranchKey, usize> {
    let mut canonical: IndexMap<BranchKey, usize> = IndexMap::new();

    for (idx, entry) in tracked.iter().enumerate() {
        let key = (entry.project_id, entry.pipeline.ref_.clone());
        match canonical.get_mut(&key) {
            Some(existing) if tracked[*existing].id() >= entry.id() => {}
            Some(existing) => *existing = idx,
            None => {
                canonical.insert(key, idx);
            }
        }
    }

    canonical
}

/// Accepts a candidate returned by the latest-pipeline lookup only when it is
/// strictly newer than the failed canonical record it would supersede.
fn superseding(failed: &TrackedPipeline, latest: Pipeline) -> Option<TrackedPipeline> {
    if latest.id <= failed.id() {
        return None;
    }
    Some(TrackedPipeline::new(
        latest,
        failed.project_name.clone(),
        failed.project_id,
    ))
}

/// For every canonical pipeline that failed, asks the API for the latest
/// pipeline on that ref -- anyone's run counts, not just the watched user's.
/// A strictly newer result is appended to the tracked set; the failed record
/// stays visible, the newer one simply becomes canonical for the ref.
///
/// Lookup failures are swallowed: supersession is a best-effort enrichment,
/// never required for correctness.
pub async fn resolve_superseded(client: &GitLabClient, tracked: &mut Vec<TrackedPipeline>) {
    let canonical = canonical_indices(tracked);

    let stale: Vec<&TrackedPipeline> = canonical
        .values()
        .map(|&idx| &tracked[idx])
        .filter(|entry| entry.pipeline.status == PipelineStatus::Failed)
        .collect();

    if stale.is_empty() {
        return;
    }

    let lookups: Vec<_> = stale
        .iter()
        .map(|&failed| async {
            let latest = client
                .latest_pipeline(failed.project_id, &failed.pipeline.ref_)
                .await
                .ok()
                .flatten()?;
            superseding(failed, latest)
        })
        .collect();

    let fixed: Vec<TrackedPipeline> = join_all(lookups).await.into_iter().flatten().collect();

    if !fixed.is_empty() {
        debug!("{} failed branches superseded by newer pipelines", fixed.len());
    }

    tracked.extend(fixed);
}
