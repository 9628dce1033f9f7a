//! # Postgate
//!
//! Guarded, idempotent admission of user "publish" actions, with a concurrent
//! fan-out of the secondary writes that make a submission complete.
//!
//! ## Core Concepts
//!
//! One submission attempt produces, at most once per lockout window:
//! - exactly one primary resource ([`ResourceService`])
//! - a [`SubmissionRecord`] persisted canonically and in a daily index ([`RecordStore`])
//! - two deferred jobs, pin-announcement and expire-submission ([`JobScheduler`])
//!
//! ## Architecture
//!
//! ```text
//! Caller (UI / API)
//!     │
//!     ▼ submit()
//! Orchestrator
//!     │
//!     ├─► AdmissionGuard ──► GuardStore.set_if_absent("locked:{actor}", ttl)
//!     │
//!     ├─► ResourceService.create ──► ResourceId
//!     │
//!     ├─► JobScheduler.schedule(pin-announcement, now)      (best effort)
//!     │
//!     └─► TaskGroup (spawned, joined, never cancelled)
//!             ├─► ResourceService.attach_attribute
//!             ├─► RecordStore.put("submission:{id}")
//!             ├─► JobScheduler.schedule(expire-submission, created_at + lifespan)
//!             └─► RecordStore.append_index("daily:{actor}:{date}")
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Lock is one atomic write** - set-if-absent with expiry, never read-then-write
//! 2. **No explicit unlock** - the lock lapses after the lockout window, even on failure
//! 3. **Resource first** - everything downstream needs its id; no back-filling
//! 4. **No rollback** - once the resource exists, failures are reported, not undone
//! 5. **Full-replace writes** - records are freshly built, counters start at zero
//!
//! ## Example
//!
//! ```ignore
//! use postgate::{CandidatePayload, Collaborators, Orchestrator, SubmissionConfig, SubmissionRequest};
//!
//! let orchestrator = Orchestrator::new(
//!     Collaborators { guard_store, resources, records, scheduler },
//!     SubmissionConfig::from_env()?,
//! );
//!
//! let request = SubmissionRequest::new("u1", CandidatePayload::new("cat", "animals", drawing))
//!     .with_attribute(flair_id);
//!
//! match orchestrator.submit(request).await {
//!     Ok(submitted) => navigate(&submitted.navigate_to),
//!     Err(e) => show(e.notice()),
//! }
//! ```
//!
//! ## What This Is Not
//!
//! Postgate does not render anything, build bundles, look up sessions, or
//! execute jobs. Those are collaborators behind the traits above.

mod config;
mod error;
mod fanout;
mod guard;
mod job;
mod model;
mod orchestrator;
mod resource;
mod state;
mod store;

// Re-export configuration
pub use crate::config::{
    SubmissionConfig, DEFAULT_LOCKOUT_WINDOW, DEFAULT_POST_LIFESPAN_SECS, DEFAULT_PREVIEW,
    DEFAULT_RECORD_KIND, DEFAULT_TITLE,
};

// Re-export error types
pub use crate::error::{ConfigError, FanOutStep, Notice, StepFailure, StepFailures, SubmitError};

// Re-export data model
pub use crate::model::{
    ActorId, ActorState, CandidatePayload, Counters, InteractionEvent, LifecycleFlags,
    ResourceId, SubmissionRecord, SubmissionRequest,
};

// Re-export collaborator interfaces
pub use crate::guard::{lock_key, AdmissionGuard, GuardStore, MemoryGuardStore, LOCK_KEY_PREFIX};
pub use crate::job::{expire_submission, pin_announcement, JobHandle, JobName, JobScheduler, ScheduledJob};
pub use crate::resource::{CreateResource, ResourceService};
pub use crate::store::{canonical_key, daily_index_key, load_daily_index, load_record, RecordStore};

// Re-export workflow types
pub use crate::fanout::TaskGroup;
pub use crate::orchestrator::{Collaborators, Orchestrator, Submitted};
pub use crate::state::AttemptState;

// Re-export commonly used external types
pub use async_trait::async_trait;
