//! Agent sessions: lifecycle, request dispatch, and spawning.
//!
//! - `agent`: [`AgentSession`], the host side of one conversation.
//! - `dispatch`: routes agent-originated traffic (file requests, updates).
//! - `coordinator`: [`SessionCoordinator`], resolves configuration and
//!   spawns agents with the login-shell environment.

pub mod agent;
pub mod coordinator;
mod dispatch;

pub use agent::{AgentSession, SessionOptions};
pub use coordinator::SessionCoordinator;

use crate::models::protocol::SessionNotification;

/// UI-facing traffic produced by a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A decoded `session/update` notification.
    Update(SessionNotification),
    /// The agent connection ended; the session is terminated.
    Closed {
        /// Process exit code, when known.
        exit_code: Option<i32>,
        /// Human-readable reason.
        reason: String,
    },
}
