use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, warn};

use super::tracked::TrackedPipeline;
use crate::gitlab::types::GitLabProject;
use crate::gitlab::GitLabClient;

/// Fans out one request per project for the user's recent pipelines and fans
/// back in. A failing project degrades to zero pipelines for that project and
/// never aborts the cycle.
pub async fn fetch_tracked_pipelines(
    client: &GitLabClient,
    projects: &[GitLabProject],
    username: &str,
    updated_after: DateTime<Utc>,
) -> Vec<TrackedPipeline> {
    let futures: Vec<_> = projects
        .iter()
        .map(|project| fetch_project_pipelines(client, project, username, updated_after))
        .collect();

    let results = join_all(futures).await;

    let tracked: Vec<TrackedPipeline> = results.into_iter().flatten().collect();
    debug!("Tracking {} pipelines across {} projects", tracked.len(), projects.len());
    tracked
}

async fn fetch_project_pipelines(
    client: &GitLabClient,
    project: &GitLabProject,
    username: &str,
    updated_after: DateTime<Utc>,
) -> Vec<TrackedPipeline> {
    let pipelines = match client.pipelines(project.id, username, updated_after).await {
        Ok(pipelines) => pipelines,
        Err(e) => {
            warn!(
                "Failed to fetch pipelines for {} [{}]: {e}",
                project.path_with_namespace, project.id
            );
            return Vec::new();
        }
    };

    if !pipelines.is_empty() {
        debug!(
            "{}: {} pipelines",
            project.path_with_namespace,
            pipelines.len()
        );
    }

    pipelines
        .into_iter()
        .map(|pipeline| TrackedPipeline::new(pipeline, project.name.clone(), project.id))
        .collect()
}
