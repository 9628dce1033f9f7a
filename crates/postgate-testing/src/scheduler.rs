use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use postgate::{JobHandle, JobName, JobScheduler, ScheduledJob};
use uuid::Uuid;

/// Scheduler that keeps accepted jobs in memory instead of running them.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    jobs: Mutex<Vec<(JobHandle, ScheduledJob)>>,
    failing: Mutex<HashSet<JobName>>,
    delays: Mutex<HashMap<JobName, Duration>>,
    calls: AtomicUsize,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future job with this name.
    pub fn fail_job(&self, name: JobName) {
        self.failing.lock().unwrap().insert(name);
    }

    /// Hold every future job with this name for `delay` before accepting it.
    pub fn delay_job(&self, name: JobName, delay: Duration) {
        self.delays.lock().unwrap().insert(name, delay);
    }

    pub fn jobs(&self) -> Vec<ScheduledJob> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|(_, job)| job.clone())
            .collect()
    }

    pub fn jobs_named(&self, name: JobName) -> Vec<ScheduledJob> {
        self.jobs()
            .into_iter()
            .filter(|job| job.name == name)
            .collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobScheduler for RecordingScheduler {
    async fn schedule(&self, job: ScheduledJob) -> Result<JobHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays.lock().unwrap().get(&job.name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&job.name) {
            bail!("scheduler rejected {}", job.name);
        }
        let handle = JobHandle(Uuid::new_v4());
        self.jobs.lock().unwrap().push((handle, job));
        Ok(handle)
    }
}
