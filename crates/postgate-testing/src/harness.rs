use std::sync::Arc;

use postgate::{CandidatePayload, Collaborators, Orchestrator, SubmissionConfig};
use serde_json::json;

use crate::{FakeResourceService, FlakyGuardStore, MemoryRecordStore, RecordingScheduler};

/// All fakes wired into one orchestrator.
pub struct TestHarness {
    pub guard: Arc<FlakyGuardStore>,
    pub resources: Arc<FakeResourceService>,
    pub records: Arc<MemoryRecordStore>,
    pub scheduler: Arc<RecordingScheduler>,
    pub config: SubmissionConfig,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(SubmissionConfig::default().with_destination("pixelary"))
    }

    pub fn with_config(config: SubmissionConfig) -> Self {
        Self {
            guard: Arc::new(FlakyGuardStore::new()),
            resources: Arc::new(FakeResourceService::new()),
            records: Arc::new(MemoryRecordStore::new()),
            scheduler: Arc::new(RecordingScheduler::new()),
            config,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            guard_store: self.guard.clone(),
            resources: self.resources.clone(),
            records: self.records.clone(),
            scheduler: self.scheduler.clone(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.collaborators(), self.config.clone())
    }

    /// Calls made to any collaborator.
    pub fn external_calls(&self) -> usize {
        self.guard.calls()
            + (self.resources.create_calls() + self.resources.attach_calls()) as usize
            + self.records.operations().len()
            + self.scheduler.calls()
    }

    /// Calls made past the admission guard.
    pub fn side_effects(&self) -> usize {
        self.external_calls() - self.guard.calls()
    }
}

/// A candidate with a small drawing as content.
pub fn candidate(label: &str, category: &str) -> CandidatePayload {
    CandidatePayload::new(label, category, json!([0, 0, 1, 1, 0, 1, 1, 0]))
}
