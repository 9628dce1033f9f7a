//! Deferred job interface.
//!
//! The scheduler is durable and external: jobs must survive this process, so
//! nothing here uses in-process timers. A job is a name, an opaque payload
//! and an absolute `run_at`; a `run_at` at or before now means "as soon as
//! possible".

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::model::ResourceId;

/// Kinds of job the submission workflow schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobName {
    /// Pin the announcement comment on a freshly created resource.
    PinAnnouncement,
    /// Retire a submission once its lifespan is over.
    ExpireSubmission,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::PinAnnouncement => "pin-announcement",
            JobName::ExpireSubmission => "expire-submission",
        }
    }
}

impl std::fmt::Display for JobName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job to hand to the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    pub name: JobName,
    pub payload: serde_json::Value,
    pub run_at: DateTime<Utc>,
}

impl ScheduledJob {
    /// Run as soon as possible.
    pub fn immediate(name: JobName, payload: serde_json::Value) -> Self {
        Self::at(name, payload, Utc::now())
    }

    pub fn at(name: JobName, payload: serde_json::Value, run_at: DateTime<Utc>) -> Self {
        Self {
            name,
            payload,
            run_at,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.run_at <= now
    }
}

/// Scheduler-assigned identifier of an accepted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub Uuid);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Durable "run job J with payload P at time T" service.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    async fn schedule(&self, job: ScheduledJob) -> Result<JobHandle>;
}

/// Pin-announcement job for a new resource, due now.
pub fn pin_announcement(resource_id: &ResourceId) -> ScheduledJob {
    ScheduledJob::immediate(
        JobName::PinAnnouncement,
        json!({ "resourceId": resource_id }),
    )
}

/// Expiration job for a submission, due at `run_at`.
pub fn expire_submission(
    resource_id: &ResourceId,
    answer: &str,
    run_at: DateTime<Utc>,
) -> ScheduledJob {
    ScheduledJob::at(
        JobName::ExpireSubmission,
        json!({ "resourceId": resource_id, "answer": answer }),
        run_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn job_names_use_wire_form() {
        assert_eq!(JobName::PinAnnouncement.to_string(), "pin-announcement");
        assert_eq!(
            serde_json::to_value(JobName::ExpireSubmission).unwrap(),
            "expire-submission"
        );
    }

    #[test]
    fn pin_announcement_is_due_immediately() {
        let job = pin_announcement(&ResourceId::new("t3_a"));
        assert_eq!(job.name, JobName::PinAnnouncement);
        assert_eq!(job.payload["resourceId"], "t3_a");
        assert!(job.is_due(Utc::now()));
    }

    #[test]
    fn expire_submission_carries_answer_and_future_run_at() {
        let run_at = Utc::now() + Duration::days(6);
        let job = expire_submission(&ResourceId::new("t3_a"), "cat", run_at);
        assert_eq!(job.name, JobName::ExpireSubmission);
        assert_eq!(job.payload["answer"], "cat");
        assert_eq!(job.run_at, run_at);
        assert!(!job.is_due(Utc::now()));
    }
}
