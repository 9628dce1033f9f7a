//! Submission orchestrator. The public entry point of the workflow.
//!
//! ```text
//! submit(request)
//!     │
//!     ├─► actor present?            no ─► Unauthenticated
//!     ├─► AdmissionGuard            held ─► AdmissionDenied / err ─► GuardUnavailable
//!     ├─► ResourceService.create    err ─► ResourceCreationFailed (lock kept)
//!     │
//!     └─► spawned completion task (outlives the caller)
//!             ├─► schedule pin-announcement   err ─► warn, continue
//!             └─► TaskGroup ─┬─ attach attribute
//!                            ├─ put canonical record
//!                            ├─ schedule expire-submission
//!                            └─ append daily index
//!                                  any err ─► FanOutFailed (resource kept)
//! ```

use std::sync::Arc;

use chrono::Utc;
use smallvec::SmallVec;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::config::SubmissionConfig;
use crate::error::{FanOutStep, StepFailure, StepFailures, SubmitError};
use crate::fanout::TaskGroup;
use crate::guard::{AdmissionGuard, GuardStore};
use crate::job::{self, JobScheduler};
use crate::model::{ResourceId, SubmissionRecord, SubmissionRequest};
use crate::resource::{CreateResource, ResourceService};
use crate::state::{Attempt, AttemptState};
use crate::store::RecordStore;

/// External systems the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub guard_store: Arc<dyn GuardStore>,
    pub resources: Arc<dyn ResourceService>,
    pub records: Arc<dyn RecordStore>,
    pub scheduler: Arc<dyn JobScheduler>,
}

/// A completed submission.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub record: SubmissionRecord,
    /// Where the caller should navigate to show the new resource.
    pub navigate_to: ResourceId,
    /// `false` if the pin-announcement job could not be scheduled.
    pub announcement_scheduled: bool,
}

/// Turns publish actions into one resource, its records and its jobs.
#[derive(Clone)]
pub struct Orchestrator {
    guard: AdmissionGuard,
    resources: Arc<dyn ResourceService>,
    records: Arc<dyn RecordStore>,
    scheduler: Arc<dyn JobScheduler>,
    config: Arc<SubmissionConfig>,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, config: SubmissionConfig) -> Self {
        Self {
            guard: AdmissionGuard::new(collaborators.guard_store, config.lockout_window),
            resources: collaborators.resources,
            records: collaborators.records,
            scheduler: collaborators.scheduler,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SubmissionConfig {
        &self.config
    }

    pub fn guard(&self) -> &AdmissionGuard {
        &self.guard
    }

    /// Run one submission attempt.
    ///
    /// Failures before resource creation leave nothing behind but the lock.
    /// Once the resource exists the attempt is not rolled back: the
    /// announcement and fan-out writes run on a spawned task that finishes
    /// even if this future is dropped, and any failed step is reported in
    /// [`SubmitError::FanOutFailed`].
    #[instrument(
        name = "submission.submit",
        skip_all,
        fields(actor = tracing::field::Empty, resource_id = tracing::field::Empty)
    )]
    pub async fn submit(&self, request: SubmissionRequest) -> Result<Submitted, SubmitError> {
        let mut attempt = Attempt::new();

        let Some(actor) = request.actor else {
            attempt.advance(AttemptState::Unauthenticated);
            debug!("submission rejected: no actor");
            return Err(SubmitError::Unauthenticated);
        };
        tracing::Span::current().record("actor", actor.as_str());

        match self.guard.try_acquire(&actor).await {
            Ok(true) => {}
            Ok(false) => {
                attempt.advance(AttemptState::AdmissionDenied);
                debug!("submission denied: lock held");
                return Err(SubmitError::AdmissionDenied { actor });
            }
            Err(source) => {
                attempt.advance(AttemptState::GuardUnavailable);
                warn!(error = %format!("{source:#}"), "admission guard unavailable");
                return Err(SubmitError::GuardUnavailable { actor, source });
            }
        }

        let create = CreateResource {
            title: self.config.title.clone(),
            destination: self.config.destination.clone(),
            preview: self.config.preview.clone(),
        };
        let resource_id = match self.resources.create(create).await {
            Ok(resource_id) => resource_id,
            Err(source) => {
                attempt.advance(AttemptState::CreationFailed);
                error!(error = %format!("{source:#}"), "resource creation failed");
                return Err(SubmitError::ResourceCreationFailed { actor, source });
            }
        };
        attempt.advance(AttemptState::ResourceCreated);
        tracing::Span::current().record("resource_id", resource_id.as_str());

        let record = SubmissionRecord::new(
            request.candidate,
            actor,
            resource_id.clone(),
            Utc::now(),
            self.config.record_kind.clone(),
        );

        // Everything past creation runs detached so a dropped caller cannot
        // strand the resource without its record and jobs.
        attempt.advance(AttemptState::FanOutInFlight);
        let this = self.clone();
        let detached = record.clone();
        let attribute_id = request.attribute_id;
        let completion = tokio::spawn(
            async move {
                let announcement_scheduled =
                    this.schedule_announcement(&detached.resource_id).await;
                let failures = this.fan_out(&detached, attribute_id).await;
                (announcement_scheduled, failures)
            }
            .in_current_span(),
        );

        let (announcement_scheduled, failures) = match completion.await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Unknown which writes landed, so none are claimed.
                let message = e.to_string();
                let failures: StepFailures = FanOutStep::ALL
                    .into_iter()
                    .map(|step| StepFailure {
                        step,
                        error: anyhow::anyhow!("fan-out task aborted: {message}"),
                    })
                    .collect();
                (false, failures)
            }
        };

        if failures.is_empty() {
            attempt.advance(AttemptState::Completed);
            info!(state = %attempt.state(), announcement_scheduled, "submission completed");
            return Ok(Submitted {
                record,
                navigate_to: resource_id,
                announcement_scheduled,
            });
        }

        attempt.advance(AttemptState::FanOutFailed);
        for failure in &failures {
            error!(step = %failure.step, error = %format!("{:#}", failure.error), "fan-out step failed");
        }
        Err(SubmitError::FanOutFailed {
            resource_id,
            record: Box::new(record),
            failures,
        })
    }

    /// Schedule the pin-announcement job. Failure is logged, never surfaced.
    async fn schedule_announcement(&self, resource_id: &ResourceId) -> bool {
        match self.scheduler.schedule(job::pin_announcement(resource_id)).await {
            Ok(handle) => {
                debug!(%handle, "announcement job scheduled");
                true
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "announcement job failed, continuing without it");
                false
            }
        }
    }

    /// Run the four independent writes and collect every failure.
    async fn fan_out(
        &self,
        record: &SubmissionRecord,
        attribute_id: Option<String>,
    ) -> StepFailures {
        let mut failures: StepFailures = SmallVec::new();
        let mut group = TaskGroup::new();

        // No attribute requested means nothing to attach.
        if let Some(attribute_id) = attribute_id {
            let resources = Arc::clone(&self.resources);
            let resource_id = record.resource_id.clone();
            let destination = self.config.destination.clone();
            group.spawn(
                FanOutStep::AttachAttribute,
                async move {
                    resources
                        .attach_attribute(&resource_id, &attribute_id, &destination)
                        .await
                }
                .in_current_span(),
            );
        }

        let expiration = job::expire_submission(
            &record.resource_id,
            &record.payload.label,
            record.created_at + self.config.post_lifespan,
        );
        let scheduler = Arc::clone(&self.scheduler);
        group.spawn(
            FanOutStep::ScheduleExpiration,
            async move {
                let handle = scheduler.schedule(expiration).await?;
                debug!(%handle, "expiration job scheduled");
                anyhow::Ok(())
            }
            .in_current_span(),
        );

        // One serialized value feeds both stores so they hold identical content.
        match serde_json::to_value(record) {
            Ok(value) => {
                let records = Arc::clone(&self.records);
                let key = record.canonical_key();
                let canonical = value.clone();
                group.spawn(
                    FanOutStep::PersistRecord,
                    async move { records.put(&key, canonical).await }.in_current_span(),
                );

                let records = Arc::clone(&self.records);
                let index_key = record.daily_index_key();
                group.spawn(
                    FanOutStep::AppendDailyIndex,
                    async move { records.append_index(&index_key, value).await }
                        .in_current_span(),
                );
            }
            Err(e) => {
                let message = e.to_string();
                for step in [FanOutStep::PersistRecord, FanOutStep::AppendDailyIndex] {
                    failures.push(StepFailure {
                        step,
                        error: anyhow::anyhow!("record serialization failed: {message}"),
                    });
                }
            }
        }

        failures.extend(
            group
                .join_all()
                .await
                .into_iter()
                .map(|(step, error)| StepFailure { step, error }),
        );
        failures
    }
}
