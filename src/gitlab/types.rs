use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status reported by GitLab for both pipelines and jobs.
///
/// The API reports whatever it likes each poll; this type only classifies a
/// reported status for downstream logic. All derived properties are exhaustive
/// matches so a new upstream status forces every one of them to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Scheduled,
}

impl PipelineStatus {
    /// Whether the pipeline is still doing work (or queued to).
    pub fn is_active(self) -> bool {
        match self {
            Self::Created
            | Self::WaitingForResource
            | Self::Preparing
            | Self::Pending
            | Self::Running
            | Self::Scheduled => true,
            Self::Success | Self::Failed | Self::Canceled | Self::Skipped | Self::Manual => false,
        }
    }

    /// Whether the pipeline reached a final fate. Manual is deliberately
    /// non-terminal: a gate can still be clicked.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Canceled | Self::Skipped
        )
    }

    /// Priority for summary aggregation -- higher means more attention needed.
    pub fn priority(self) -> u8 {
        match self {
            Self::Failed => 100,
            Self::Running => 90,
            Self::Pending | Self::Created | Self::WaitingForResource | Self::Preparing => 80,
            Self::Manual => 70,
            Self::Scheduled => 60,
            Self::Success => 50,
            Self::Canceled => 40,
            Self::Skipped => 30,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::WaitingForResource => "Waiting",
            Self::Preparing => "Preparing",
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Success => "Passed",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Skipped => "Skipped",
            Self::Manual => "Manual",
            Self::Scheduled => "Scheduled",
        }
    }
}

/// A GitLab user, as returned by `GET /user`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabUser {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A GitLab project the user is a member of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitLabProject {
    pub id: u64,
    pub name: String,
    pub name_with_namespace: String,
    pub path_with_namespace: String,
    pub web_url: String,
    pub last_activity_at: Option<DateTime<Utc>>,
}

/// A single pipeline run. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub iid: Option<u64>,
    pub project_id: Option<u64>,
    pub status: PipelineStatus,
    pub source: Option<String>,
    #[serde(rename = "ref")]
    pub ref_: String,
    pub sha: String,
    pub web_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Pipeline {
    pub fn short_sha(&self) -> &str {
        let end = self.sha.len().min(8);
        &self.sha[..end]
    }

    /// Wall-clock duration: started to finished, or started to now while the
    /// pipeline is still running.
    pub fn duration(&self) -> Option<chrono::Duration> {
        let start = self.started_at?;
        let end = self.finished_at.unwrap_or_else(Utc::now);
        Some(end - start)
    }

    pub fn duration_text(&self) -> String {
        let Some(duration) = self.duration() else {
            return "--".to_string();
        };
        let total = duration.num_seconds().max(0);
        let minutes = total / 60;
        let seconds = total % 60;
        if minutes > 0 {
            format!("{minutes}m {seconds}s")
        } else {
            format!("{seconds}s")
        }
    }
}

/// A job within a pipeline. Jobs only ever hold a subset of the status space,
/// but share the same sum type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineJob {
    pub id: u64,
    pub name: String,
    pub stage: String,
    pub status: PipelineStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_decodes_snake_case() {
        let status: PipelineStatus = serde_json::from_str("\"waiting_for_resource\"").unwrap();
        assert_eq!(status, PipelineStatus::WaitingForResource);

        let status: PipelineStatus = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(status, PipelineStatus::Success);
    }

    #[test]
    fn test_active_and_terminal_partition() {
        let active = [
            PipelineStatus::Created,
            PipelineStatus::WaitingForResource,
            PipelineStatus::Preparing,
            PipelineStatus::Pending,
            PipelineStatus::Running,
            PipelineStatus::Scheduled,
        ];
        for status in active {
            assert!(status.is_active(), "{status:?} should be active");
            assert!(!status.is_terminal(), "{status:?} should not be terminal");
        }

        let terminal = [
            PipelineStatus::Success,
            PipelineStatus::Failed,
            PipelineStatus::Canceled,
            PipelineStatus::Skipped,
        ];
        for status in terminal {
            assert!(!status.is_active(), "{status:?} should be inactive");
            assert!(status.is_terminal(), "{status:?} should be terminal");
        }

        // Manual is neither active nor terminal.
        assert!(!PipelineStatus::Manual.is_active());
        assert!(!PipelineStatus::Manual.is_terminal());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(PipelineStatus::Failed.priority() > PipelineStatus::Running.priority());
        assert!(PipelineStatus::Running.priority() > PipelineStatus::Pending.priority());
        assert!(PipelineStatus::Pending.priority() > PipelineStatus::Manual.priority());
        assert!(PipelineStatus::Manual.priority() > PipelineStatus::Scheduled.priority());
        assert!(PipelineStatus::Scheduled.priority() > PipelineStatus::Success.priority());
        assert!(PipelineStatus::Success.priority() > PipelineStatus::Canceled.priority());
        assert!(PipelineStatus::Canceled.priority() > PipelineStatus::Skipped.priority());
    }

    #[test]
    fn test_pipeline_decodes_gitlab_payload() {
        let json = r#"{
            "id": 4221,
            "iid": 17,
            "project_id": 88,
            "status": "failed",
            "source": "push",
            "ref": "main",
            "sha": "a91957a858320c0e17f3a0eca7cfacbff50ea29a",
            "web_url": "https://gitlab.example.com/demo/-/pipelines/4221",
            "created_at": "2025-01-15T10:30:00.123Z",
            "updated_at": "2025-01-15T10:42:07Z",
            "started_at": "2025-01-15T10:30:10Z",
            "finished_at": "2025-01-15T10:42:07Z"
        }"#;

        let pipeline: Pipeline = serde_json::from_str(json).unwrap();
        assert_eq!(pipeline.id, 4221);
        assert_eq!(pipeline.status, PipelineStatus::Failed);
        assert_eq!(pipeline.ref_, "main");
        assert_eq!(pipeline.short_sha(), "a91957a8");
        assert_eq!(pipeline.duration_text(), "11m 57s");
    }

    #[test]
    fn test_duration_text_without_start() {
        let json = r#"{
            "id": 1,
            "status": "pending",
            "ref": "main",
            "sha": "abc",
            "web_url": "https://gitlab.example.com/demo/-/pipelines/1"
        }"#;
        let pipeline: Pipeline = serde_json::from_str(json).unwrap();
        assert_eq!(pipeline.duration_text(), "--");
        assert_eq!(pipeline.short_sha(), "abc");
    }
}
