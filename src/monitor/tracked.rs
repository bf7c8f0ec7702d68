use crate::gitlab::types::{Pipeline, PipelineJob, PipelineStatus};

/// A pipeline joined with its owning project and job-level detail.
///
/// The derived fields are filled in by the job enricher; a freshly fetched
/// record carries only the pipeline and project identity.
#[derive(Debug, Clone)]
pub struct TrackedPipeline {
    pub pipeline: Pipeline,
    pub project_name: String,
    pub project_id: u64,
    pub current_job: Option<PipelineJob>,
    pub failed_job: Option<PipelineJob>,
    pub retry_count: usize,
    pub manual_jobs: Vec<PipelineJob>,
}

impl TrackedPipeline {
    pub fn new(pipeline: Pipeline, project_name: String, project_id: u64) -> Self {
        Self {
            pipeline,
            project_name,
            project_id,
            current_job: None,
            failed_job: None,
            retry_count: 0,
            manual_jobs: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.pipeline.id
    }

    /// True when the pipeline looks "success" but has pending manual actions.
    pub fn is_waiting_for_manual(&self) -> bool {
        !self.manual_jobs.is_empty()
    }

    /// The status consumers should act on. GitLab reports "success" once all
    /// required jobs pass even while optional manual gates remain unclicked;
    /// those pipelines surface as manual instead.
    pub fn effective_status(&self) -> PipelineStatus {
        if self.pipeline.status == PipelineStatus::Success && self.is_waiting_for_manual() {
            return PipelineStatus::Manual;
        }
        self.pipeline.status
    }

    /// Short label for the step currently executing, e.g. "build" or
    /// "test › rspec".
    pub fn current_step_label(&self) -> Option<String> {
        self.current_job.as_ref().map(job_label)
    }

    /// Short label for the failed step, e.g. "test › rspec (2 retries)".
    pub fn failed_step_label(&self) -> Option<String> {
        let job = self.failed_job.as_ref()?;
        let base = job_label(job);
        if self.retry_count > 0 {
            let noun = if self.retry_count == 1 { "retry" } else { "retries" };
            return Some(format!("{base} ({} {noun})", self.retry_count));
        }
        Some(base)
    }

    /// Labels of all pending manual jobs, joined with ", ".
    pub fn manual_step_label(&self) -> Option<String> {
        if self.manual_jobs.is_empty() {
            return None;
        }
        let names: Vec<String> = self.manual_jobs.iter().map(job_label).collect();
        Some(names.join(", "))
    }
}

/// Stage name alone when stage and job name coincide, otherwise both.
fn job_label(job: &PipelineJob) -> String {
    if job.stage.eq_ignore_ascii_case(&job.name) {
        return job.stage.clone();
    }
    format!("{} › {}", job.stage, job.name)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn pipeline(id: u64, ref_: &str, status: PipelineStatus) -> Pipeline {
        Pipeline {
            id,
            iid: Some(id),
            project_id: Some(1),
            status,
            source: Some("push".to_string()),
            ref_: ref_.to_string(),
            sha: format!("{id:040x}"),
            web_url: format!("https://gitlab.example.com/demo/-/pipelines/{id}"),
            created_at: None,
            updated_at: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn tracked(id: u64, ref_: &str, status: PipelineStatus) -> TrackedPipeline {
        TrackedPipeline::new(pipeline(id, ref_, status), "demo".to_string(), 1)
    }

    pub fn job(id: u64, name: &str, stage: &str, status: PipelineStatus) -> PipelineJob {
        PipelineJob {
            id,
            name: name.to_string(),
            stage: stage.to_string(),
            status,
        }
    }
}
