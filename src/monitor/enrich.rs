use futures::future::join_all;
use log::warn;

use super::tracked::TrackedPipeline;
use crate::gitlab::types::{PipelineJob, PipelineStatus};
use crate::gitlab::GitLabClient;

/// Fetches the job list of every tracked pipeline concurrently and derives the
/// current step, the failed step with its retry count, and any pending manual
/// gates. Job fetches are best-effort: a failure yields an empty job list.
pub async fn enrich_with_jobs(client: &GitLabClient, tracked: &mut [TrackedPipeline]) {
    let fetches: Vec<_> = tracked
        .iter()
        .map(|entry| fetch_jobs(client, entry))
        .collect();

    let job_lists = join_all(fetches).await;

    for (entry, jobs) in tracked.iter_mut().zip(job_lists) {
        apply_jobs(entry, &jobs);
    }
}

async fn fetch_jobs(client: &GitLabClient, entry: &TrackedPipeline) -> Vec<PipelineJob> {
    match client.jobs(entry.project_id, entry.id()).await {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!("Failed to fetch jobs for pipeline #{}: {e}", entry.id());
            Vec::new()
        }
    }
}

/// Derives the job-level fields for one pipeline, independent of all others.
pub fn apply_jobs(entry: &mut TrackedPipeline, jobs: &[PipelineJob]) {
    let status = entry.pipeline.status;

    // Ordered preference list for "what's happening now": an actually running
    // job beats a queued one beats a merely created one.
    if status.is_active() {
        entry.current_job = first_with_status(jobs, PipelineStatus::Running)
            .or_else(|| first_with_status(jobs, PipelineStatus::Pending))
            .or_else(|| first_with_status(jobs, PipelineStatus::Created))
            .cloned();
    }

    if status == PipelineStatus::Failed {
        if let Some(failed) = first_with_status(jobs, PipelineStatus::Failed) {
            // Retries show up as additional job rows with the same name;
            // attempts beyond the first are the retry count.
            let attempts = jobs.iter().filter(|job| job.name == failed.name).count();
            entry.failed_job = Some(failed.clone());
            entry.retry_count = attempts.saturating_sub(1);
        }
    }

    // Collected regardless of the raw status: a "successful" pipeline may
    // still be waiting on an unclicked deploy button.
    entry.manual_jobs = jobs
        .iter()
        .filter(|job| job.status == PipelineStatus::Manual)
        .cloned()
        .collect();
}

fn first_with_status(jobs: &[PipelineJob], status: PipelineStatus) -> Option<&PipelineJob> {
    jobs.iter().find(|job| job.status == status)
}
