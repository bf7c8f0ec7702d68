use std::collections::{HashMap, HashSet};

use log::debug;

use super::tracked::TrackedPipeline;
use crate::gitlab::types::PipelineStatus;
use crate::notify::{NotificationSettings, NotificationSink};

/// A notification-worthy status change observed between two cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub pipeline_id: u64,
    pub project_name: String,
    pub ref_: String,
    pub web_url: String,
    pub from: PipelineStatus,
    pub to: PipelineStatus,
}

/// Cross-cycle memory: the raw status last observed per pipeline id.
///
/// Owned exclusively by the monitor and mutated only between phase barriers;
/// the fan-out tasks never see it.
#[derive(Debug, Default)]
pub struct TransitionDetector {
    known: HashMap<u64, PipelineStatus>,
}

impl TransitionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs the freshly computed tracked set against the previous cycle.
    ///
    /// First sightings establish a baseline and never produce a transition.
    /// A changed status only counts when the new value is terminal or manual;
    /// intermediate hops like pending -> running are not events. The memory
    /// entry is overwritten either way, and entries for pipelines that fell
    /// out of the fetch window are pruned.
    pub fn observe(&mut self, tracked: &[TrackedPipeline]) -> Vec<Transition> {
        let mut transitions = Vec::new();

        for entry in tracked {
            let id = entry.id();
            let new_status = entry.pipeline.status;

            if let Some(&old_status) = self.known.get(&id) {
                if old_status != new_status && (new_status.is_terminal() || new_status == PipelineStatus::Manual) {
                    transitions.push(Transition {
                        pipeline_id: id,
                        project_name: entry.project_name.clone(),
                        ref_: entry.pipeline.ref_.clone(),
                        web_url: entry.pipeline.web_url.clone(),
                        from: old_status,
                        to: new_status,
                    });
                }
            }

            self.known.insert(id, new_status);
        }

        let active: HashSet<u64> = tracked.iter().map(TrackedPipeline::id).collect();
        self.known.retain(|id, _| active.contains(id));

        if !transitions.is_empty() {
            debug!("{} notification-worthy transitions", transitions.len());
        }

        transitions
    }

    /// Forgets everything. Used on restart so no stale baselines leak across
    /// credential changes.
    pub fn clear(&mut self) {
        self.known.clear();
    }

    #[cfg(test)]
    fn remembered(&self, id: u64) -> Option<PipelineStatus> {
        self.known.get(&id).copied()
    }
}

/// Delivers the transitions the user asked to hear about. Success and failure
/// respect their settings toggles; cancellations and manual gates always
/// notify; skipped never does.
pub fn dispatch(
    sink: &dyn NotificationSink,
    settings: &NotificationSettings,
    transitions: &[Transition],
) {
    for transition in transitions {
        let body = match transition.to {
            PipelineStatus::Success if settings.on_success => format!(
                "Pipeline #{} passed on {}",
                transition.pipeline_id, transition.ref_
            ),
            PipelineStatus::Failed if settings.on_failure => format!(
                "Pipeline #{} failed on {}",
                transition.pipeline_id, transition.ref_
            ),
            PipelineStatus::Canceled => format!(
                "Pipeline #{} was canceled on {}",
                transition.pipeline_id, transition.ref_
            ),
            PipelineStatus::Manual => format!(
                "Pipeline on {} is waiting for a manual action",
                transition.ref_
            ),
            _ => continue,
        };

        sink.send(&transition.project_name, &body, &transition.web_url);
    }
}
