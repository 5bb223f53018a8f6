//! Session identity and lifecycle.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque agent-allocated session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap a raw identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Lifecycle state of an agent session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Process or connection exists but no capabilities were exchanged.
    Uninitialized,
    /// `initialize` completed; waiting for a session to be created.
    Negotiating,
    /// Session established; prompts flow.
    Active,
    /// Closed, failed, or the agent exited. Final.
    Terminated,
}

impl SessionState {
    /// Determine whether a lifecycle transition is permitted.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Uninitialized, Self::Negotiating)
                | (Self::Negotiating, Self::Active)
                | (
                    Self::Uninitialized | Self::Negotiating | Self::Active,
                    Self::Terminated
                )
        )
    }
}

/// Lifecycle bookkeeping for one agent conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Agent-allocated identifier; set once when the session becomes active.
    pub id: Option<SessionId>,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set when the session reaches [`SessionState::Terminated`].
    pub terminated_at: Option<DateTime<Utc>>,
    /// Why the session terminated.
    pub termination_reason: Option<String>,
}

impl SessionRecord {
    /// Construct a fresh, uninitialized record.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            state: SessionState::Uninitialized,
            created_at: Utc::now(),
            terminated_at: None,
            termination_reason: None,
        }
    }

    /// Move to `next`, returning `false` (and leaving the record untouched)
    /// when the transition is not permitted.
    pub fn transition(&mut self, next: SessionState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        true
    }

    /// Attach the agent-allocated id and enter [`SessionState::Active`].
    ///
    /// The id is immutable afterwards; a second activation is refused.
    pub fn activate(&mut self, id: SessionId) -> bool {
        if self.id.is_some() || !self.transition(SessionState::Active) {
            return false;
        }
        self.id = Some(id);
        true
    }

    /// Enter [`SessionState::Terminated`]. Idempotent.
    pub fn terminate(&mut self, reason: impl Into<String>) {
        if self.transition(SessionState::Terminated) {
            self.terminated_at = Some(Utc::now());
            self.termination_reason = Some(reason.into());
        }
    }
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::new()
    }
}
