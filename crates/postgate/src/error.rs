//! Error types for postgate.

use smallvec::SmallVec;
use thiserror::Error;

use crate::model::{ActorId, ResourceId, SubmissionRecord};
use crate::state::AttemptState;

/// One of the concurrent writes made after the resource exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanOutStep {
    AttachAttribute,
    PersistRecord,
    ScheduleExpiration,
    AppendDailyIndex,
}

impl FanOutStep {
    pub const ALL: [FanOutStep; 4] = [
        FanOutStep::AttachAttribute,
        FanOutStep::PersistRecord,
        FanOutStep::ScheduleExpiration,
        FanOutStep::AppendDailyIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FanOutStep::AttachAttribute => "attach_attribute",
            FanOutStep::PersistRecord => "persist_record",
            FanOutStep::ScheduleExpiration => "schedule_expiration",
            FanOutStep::AppendDailyIndex => "append_daily_index",
        }
    }
}

impl std::fmt::Display for FanOutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fan-out step and why it failed.
#[derive(Debug)]
pub struct StepFailure {
    pub step: FanOutStep,
    pub error: anyhow::Error,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:#}", self.step, self.error)
    }
}

pub type StepFailures = SmallVec<[StepFailure; 4]>;

/// How a failed submission should be shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Lightweight hint; retrying is expected to work.
    Retry(&'static str),
    Error(&'static str),
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::Retry(message) | Notice::Error(message) => message,
        }
    }
}

/// Why a submission attempt did not complete.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("submission has no actor identity")]
    Unauthenticated,

    #[error("actor {actor} submitted within the lockout window")]
    AdmissionDenied { actor: ActorId },

    #[error("admission guard unavailable for {actor}")]
    GuardUnavailable {
        actor: ActorId,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to create resource for {actor}")]
    ResourceCreationFailed {
        actor: ActorId,
        #[source]
        source: anyhow::Error,
    },

    #[error("resource {resource_id} created but fan-out failed: {}", render_failures(.failures))]
    FanOutFailed {
        resource_id: ResourceId,
        record: Box<SubmissionRecord>,
        failures: StepFailures,
    },
}

fn render_failures(failures: &StepFailures) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SubmitError {
    /// Terminal state the attempt stopped in.
    pub fn state(&self) -> AttemptState {
        match self {
            SubmitError::Unauthenticated => AttemptState::Unauthenticated,
            SubmitError::AdmissionDenied { .. } => AttemptState::AdmissionDenied,
            SubmitError::GuardUnavailable { .. } => AttemptState::GuardUnavailable,
            SubmitError::ResourceCreationFailed { .. } => AttemptState::CreationFailed,
            SubmitError::FanOutFailed { .. } => AttemptState::FanOutFailed,
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            SubmitError::Unauthenticated => Notice::Retry("Please log in to post"),
            SubmitError::AdmissionDenied { .. } => {
                Notice::Retry("You just posted, try again in a moment")
            }
            SubmitError::GuardUnavailable { .. } => {
                Notice::Retry("Posting is temporarily unavailable, try again")
            }
            SubmitError::ResourceCreationFailed { .. } => {
                Notice::Error("Could not create your post")
            }
            SubmitError::FanOutFailed { .. } => {
                Notice::Error("Your post was created but some details failed to save")
            }
        }
    }

    /// The created resource, if the attempt got that far.
    pub fn resource_id(&self) -> Option<&ResourceId> {
        match self {
            SubmitError::FanOutFailed { resource_id, .. } => Some(resource_id),
            _ => None,
        }
    }

    pub fn failed_steps(&self) -> Vec<FanOutStep> {
        match self {
            SubmitError::FanOutFailed { failures, .. } => {
                failures.iter().map(|failure| failure.step).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a whole number of seconds, got {value:?}")]
    InvalidSeconds { name: &'static str, value: String },

    #[error("{name} must be greater than zero")]
    NotPositive { name: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CandidatePayload;
    use anyhow::anyhow;
    use chrono::Utc;
    use smallvec::smallvec;

    fn fan_out_failed() -> SubmitError {
        let record = SubmissionRecord::new(
            CandidatePayload::new("cat", "animals", serde_json::Value::Null),
            ActorId::new("u1"),
            ResourceId::new("t3_a"),
            Utc::now(),
            "drawing",
        );
        SubmitError::FanOutFailed {
            resource_id: ResourceId::new("t3_a"),
            record: Box::new(record),
            failures: smallvec![
                StepFailure {
                    step: FanOutStep::PersistRecord,
                    error: anyhow!("store down"),
                },
                StepFailure {
                    step: FanOutStep::AttachAttribute,
                    error: anyhow!("forbidden"),
                },
            ],
        }
    }

    #[test]
    fn every_step_has_a_distinct_name() {
        let names: std::collections::HashSet<_> =
            FanOutStep::ALL.iter().map(|step| step.as_str()).collect();
        assert_eq!(names.len(), FanOutStep::ALL.len());
        for step in FanOutStep::ALL {
            assert_eq!(step.to_string(), step.as_str());
        }
    }

    #[test]
    fn fan_out_failure_names_each_step() {
        let err = fan_out_failed();
        assert_eq!(
            err.to_string(),
            "resource t3_a created but fan-out failed: persist_record: store down; attach_attribute: forbidden"
        );
        assert_eq!(
            err.failed_steps(),
            vec![FanOutStep::PersistRecord, FanOutStep::AttachAttribute]
        );
        assert_eq!(err.resource_id(), Some(&ResourceId::new("t3_a")));
        assert_eq!(err.state(), AttemptState::FanOutFailed);
        assert!(matches!(err.notice(), Notice::Error(_)));
    }

    #[test]
    fn pre_creation_failures_are_retry_notices() {
        let actor = ActorId::new("u1");
        let errors = [
            SubmitError::Unauthenticated,
            SubmitError::AdmissionDenied {
                actor: actor.clone(),
            },
            SubmitError::GuardUnavailable {
                actor,
                source: anyhow!("connection refused"),
            },
        ];
        for err in errors {
            assert!(matches!(err.notice(), Notice::Retry(_)), "{err}");
            assert!(!err.state().has_resource());
            assert!(err.resource_id().is_none());
        }
    }

    #[test]
    fn guard_failure_keeps_its_source() {
        let err = SubmitError::GuardUnavailable {
            actor: ActorId::new("u1"),
            source: anyhow!("connection refused"),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "connection refused");
    }

    #[test]
    fn creation_failure_is_an_error_notice() {
        let err = SubmitError::ResourceCreationFailed {
            actor: ActorId::new("u1"),
            source: anyhow!("503"),
        };
        assert_eq!(err.notice().message(), "Could not create your post");
        assert_eq!(err.state(), AttemptState::CreationFailed);
        assert!(err.resource_id().is_none());
    }
}
