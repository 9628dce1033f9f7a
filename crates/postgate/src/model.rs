//! Submission data model.
//!
//! A submission starts life as a [`SubmissionRequest`] and, once the primary
//! resource exists, becomes a [`SubmissionRecord`]: the durable artifact that
//! is written to the canonical store and the per-actor daily index.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Identity of the actor submitting content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of the primary resource, assigned by the resource service.
///
/// An empty id is representable because the resource service owns the
/// format; a record built from one is not marked published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// The content being published.
///
/// `content` is opaque to the workflow; `label` and `category` are the two
/// scalars used for indexing and for the expiration job's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePayload {
    /// Short label (the answer for a guessing-style post).
    pub label: String,
    /// Category or dictionary the label was drawn from.
    pub category: String,
    /// Arbitrary content blob.
    pub content: serde_json::Value,
}

impl CandidatePayload {
    pub fn new(
        label: impl Into<String>,
        category: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            label: label.into(),
            category: category.into(),
            content,
        }
    }
}

/// A user-initiated publish action.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    /// `None` when the user is not logged in.
    pub actor: Option<ActorId>,
    pub candidate: CandidatePayload,
    /// Destination-specific classification (flair) to attach after creation.
    pub attribute_id: Option<String>,
}

impl SubmissionRequest {
    pub fn new(actor: impl Into<ActorId>, candidate: CandidatePayload) -> Self {
        Self {
            actor: Some(actor.into()),
            candidate,
            attribute_id: None,
        }
    }

    /// A request with no actor identity.
    pub fn anonymous(candidate: CandidatePayload) -> Self {
        Self {
            actor: None,
            candidate,
            attribute_id: None,
        }
    }

    pub fn with_attribute(mut self, attribute_id: impl Into<String>) -> Self {
        self.attribute_id = Some(attribute_id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleFlags {
    pub expired: bool,
    pub resolved: bool,
    pub published: bool,
}

/// Aggregate counters, mutated only by downstream processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub interactions: u64,
    pub participants: u64,
    pub resolutions: u64,
    pub items: u64,
    pub skips: u64,
}

impl Counters {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-creating-actor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorState {
    pub interactions: u64,
    pub score: u64,
    pub resolved: bool,
    pub skipped: bool,
}

/// One entry in a record's interaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub actor: ActorId,
    pub value: String,
    pub at: DateTime<Utc>,
}

/// Durable description of one successful submission.
///
/// Built once, after resource creation, with every counter zeroed. The
/// workflow never rewrites it; later mutation belongs to downstream jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub payload: CandidatePayload,
    pub author_id: ActorId,
    pub created_at: DateTime<Utc>,
    pub resource_id: ResourceId,
    pub lifecycle: LifecycleFlags,
    pub counters: Counters,
    pub actor_state: ActorState,
    pub interaction_log: Vec<InteractionEvent>,
    pub kind: String,
}

impl SubmissionRecord {
    pub fn new(
        payload: CandidatePayload,
        author_id: ActorId,
        resource_id: ResourceId,
        created_at: DateTime<Utc>,
        kind: impl Into<String>,
    ) -> Self {
        let published = !resource_id.is_empty();
        Self {
            payload,
            author_id,
            created_at,
            resource_id,
            lifecycle: LifecycleFlags {
                expired: false,
                resolved: false,
                published,
            },
            counters: Counters::default(),
            actor_state: ActorState::default(),
            interaction_log: Vec::new(),
            kind: kind.into(),
        }
    }

    /// UTC calendar day the record belongs to in the daily index.
    pub fn created_on(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn canonical_key(&self) -> String {
        crate::store::canonical_key(&self.resource_id)
    }

    pub fn daily_index_key(&self) -> String {
        crate::store::daily_index_key(&self.author_id, self.created_on())
    }
}
