//! State machines for teams domain entities
//!
//! Each state machine defines:
//! - Valid states
//! - Events that trigger transitions
//! - Guard conditions for transitions
//! - Terminal states

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during state transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Invalid transition: cannot transition from {from} to {to} via {event}")]
    InvalidTransition {
        from: String,
        to: String,
        event: String,
    },

    #[error("Guard condition failed: {0}")]
    GuardFailed(String),

    #[error("Terminal state: {0} is a terminal state and cannot transition")]
    TerminalState(String),
}

// ============================================================================
// Invitation State Machine
// ============================================================================

/// Invitation states.
/// Note: This is a derived/computed state, not stored directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationState {
    Pending,
    Accepted,
    Expired,
    Revoked,
}

impl InvitationState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Expired | Self::Revoked)
    }

    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [InvitationState] {
        match self {
            Self::Pending => &[Self::Accepted, Self::Expired, Self::Revoked],
            Self::Accepted => &[],
            Self::Expired => &[],
            Self::Revoked => &[],
        }
    }
}

impl std::fmt::Display for InvitationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Expired => write!(f, "expired"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}

/// Events that trigger invitation state transitions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvitationEvent {
    /// User accepts the invitation
    Accept,
    /// Invitation expires (automatic when expires_at is reached)
    Expire,
    /// Admin revokes the invitation
    Revoke,
}

impl std::fmt::Display for InvitationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Expire => write!(f, "expire"),
            Self::Revoke => write!(f, "revoke"),
        }
    }
}

/// Guard context for invitation transitions
#[derive(Debug, Clone)]
pub struct InvitationGuardContext {
    /// Whether the invitation has expired (expires_at < now)
    pub is_expired: bool,
}

/// Invitation state machine
pub struct InvitationStateMachine;

impl InvitationStateMachine {
    /// Attempt a state transition with guard conditions
    pub fn transition(
        current: InvitationState,
        event: InvitationEvent,
        context: Option<&InvitationGuardContext>,
    ) -> Result<InvitationState, StateError> {
        // Check for terminal state
        if current.is_terminal() {
            return Err(StateError::TerminalState(current.to_string()));
        }

        let next = match (&current, &event) {
            // From Pending
            (InvitationState::Pending, InvitationEvent::Accept) => {
                // Guard: invitation must not be expired
                if let Some(ctx) = context {
                    if ctx.is_expired {
                        return Err(StateError::GuardFailed(
                            "Cannot accept expired invitation".to_string(),
                        ));
                    }
                }
                InvitationState::Accepted
            }
            (InvitationState::Pending, InvitationEvent::Expire) => InvitationState::Expired,
            (InvitationState::Pending, InvitationEvent::Revoke) => InvitationState::Revoked,

            // Invalid transitions
            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    to: "unknown".to_string(),
                    event: event.to_string(),
                });
            }
        };

        Ok(next)
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition(
        current: InvitationState,
        event: &InvitationEvent,
        context: Option<&InvitationGuardContext>,
    ) -> bool {
        Self::transition(current, *event, context).is_ok()
    }
}

// ============================================================================
// Invitee Classification
// ============================================================================

/// The invitee's membership situation at the moment an invitation is
/// accepted.
///
/// The five situations are mutually exclusive; classification evaluates
/// their predicates strictly in declaration order, because each later
/// predicate assumes the earlier ones were false. Adding a situation means
/// extending this enum, and the exhaustive dispatch in the migration
/// engine will refuse to compile until the new case is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "situation")]
pub enum InviteeSituation {
    /// Owns no team and belongs to none
    NoTeam,
    /// Owns a team with zero other members and no active paid subscription
    EmptyTeamNoSubscription { team_id: Uuid },
    /// Owns a team with zero other members but an active paid subscription
    EmptyTeamWithSubscription { team_id: Uuid },
    /// Owns a team containing other members
    OwnsTeamWithMembers { team_id: Uuid },
    /// A non-owner member of some other team
    MemberElsewhere { membership_id: Uuid },
}

impl std::fmt::Display for InviteeSituation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTeam => write!(f, "no_team"),
            Self::EmptyTeamNoSubscription { .. } => write!(f, "empty_team_no_subscription"),
            Self::EmptyTeamWithSubscription { .. } => write!(f, "empty_team_with_subscription"),
            Self::OwnsTeamWithMembers { .. } => write!(f, "owns_team_with_members"),
            Self::MemberElsewhere { .. } => write!(f, "member_elsewhere"),
        }
    }
}

/// The structural change the migration engine applied for an accepted
/// invitation. One variant per invitee situation, so callers can match
/// exhaustively on what actually happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum MigrationOutcome {
    /// Invitee had no team; a membership was created
    JoinedTeam { member_id: Uuid },
    /// Invitee's empty team was dissolved; a membership was created
    TeamDissolved {
        dissolved_team_id: Uuid,
        member_id: Uuid,
    },
    /// Invitee joined while keeping their own payment arrangement
    JoinedKeepingSubscription { member_id: Uuid },
    /// Invitee's whole team became a child of the inviting team
    TeamAbsorbed { child_team_id: Uuid },
    /// Invitee was moved out of another team into the inviting one
    TransferredFromTeam {
        previous_team_id: Uuid,
        member_id: Uuid,
    },
}

impl MigrationOutcome {
    /// The situation this outcome resolved
    pub fn situation(&self) -> &'static str {
        match self {
            Self::JoinedTeam { .. } => "no_team",
            Self::TeamDissolved { .. } => "empty_team_no_subscription",
            Self::JoinedKeepingSubscription { .. } => "empty_team_with_subscription",
            Self::TeamAbsorbed { .. } => "owns_team_with_members",
            Self::TransferredFromTeam { .. } => "member_elsewhere",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
