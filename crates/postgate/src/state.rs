//! Lifecycle of a single submission attempt.

use serde::{Deserialize, Serialize};

/// Where a submission attempt is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Started,
    /// No actor identity. Terminal, no side effects.
    Unauthenticated,
    /// Lock held by a recent submission. Terminal, no side effects.
    AdmissionDenied,
    /// Lock backend failed. Terminal, no side effects.
    GuardUnavailable,
    /// Primary resource exists; the attempt can no longer be cancelled.
    ResourceCreated,
    /// Resource creation failed. Terminal; the lock stays held.
    CreationFailed,
    FanOutInFlight,
    /// Resource exists but some secondary write is missing. Terminal.
    FanOutFailed,
    Completed,
}

impl AttemptState {
    pub fn can_transition_to(self, to: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, to),
            (Started, Unauthenticated)
                | (Started, AdmissionDenied)
                | (Started, GuardUnavailable)
                | (Started, ResourceCreated)
                | (Started, CreationFailed)
                | (ResourceCreated, FanOutInFlight)
                | (FanOutInFlight, FanOutFailed)
                | (FanOutInFlight, Completed)
        )
    }

    pub fn is_terminal(self) -> bool {
        use AttemptState::*;
        matches!(
            self,
            Unauthenticated
                | AdmissionDenied
                | GuardUnavailable
                | CreationFailed
                | FanOutFailed
                | Completed
        )
    }

    /// Whether the primary resource exists in this state.
    pub fn has_resource(self) -> bool {
        use AttemptState::*;
        matches!(self, ResourceCreated | FanOutInFlight | FanOutFailed | Completed)
    }
}

impl std::fmt::Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AttemptState::Started => "started",
            AttemptState::Unauthenticated => "unauthenticated",
            AttemptState::AdmissionDenied => "admission_denied",
            AttemptState::GuardUnavailable => "guard_unavailable",
            AttemptState::ResourceCreated => "resource_created",
            AttemptState::CreationFailed => "creation_failed",
            AttemptState::FanOutInFlight => "fan_out_in_flight",
            AttemptState::FanOutFailed => "fan_out_failed",
            AttemptState::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

/// Tracks one attempt's state and logs each transition.
#[derive(Debug)]
pub(crate) struct Attempt {
    state: AttemptState,
}

impl Attempt {
    pub(crate) fn new() -> Self {
        Self {
            state: AttemptState::Started,
        }
    }

    pub(crate) fn advance(&mut self, to: AttemptState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "invalid submission transition {} -> {}",
            self.state,
            to
        );
        tracing::debug!(from = %self.state, to = %to, "state_transition");
        self.state = to;
    }

    pub(crate) fn state(&self) -> AttemptState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttemptState::*;

    const ALL: [AttemptState; 9] = [
        Started,
        Unauthenticated,
        AdmissionDenied,
        GuardUnavailable,
        ResourceCreated,
        CreationFailed,
        FanOutInFlight,
        FanOutFailed,
        Completed,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for from in ALL.into_iter().filter(|s| s.is_terminal()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn no_way_back_once_resource_exists() {
        for from in ALL.into_iter().filter(|s| s.has_resource()) {
            for to in ALL.into_iter().filter(|s| !s.has_resource()) {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn happy_path_is_valid() {
        let mut attempt = Attempt::new();
        for to in [ResourceCreated, FanOutInFlight, Completed] {
            attempt.advance(to);
        }
        assert_eq!(attempt.state(), Completed);
    }
}
