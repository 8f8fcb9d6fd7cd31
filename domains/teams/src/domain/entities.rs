//! Domain entities for the Crewbase teams domain
//!
//! Each entity carries its validation and business rules; persistence is
//! handled by the store layer and never leaks in here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use validator::ValidateEmail;

use crate::error::{Result, TeamsError};

pub use crate::domain::state::InvitationState;
use crate::domain::state::{
    InvitationEvent, InvitationGuardContext, InvitationStateMachine, StateError,
};

/// Normalize an email address for storage and comparison.
///
/// Invitations are matched against the accepter's verified email, so both
/// sides must go through the same normalization.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Minimal identity projection of a user.
///
/// Authentication lives with the identity collaborator; this record only
/// exists so invitations and ownership can be resolved against a verified
/// email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with a normalized, validated email
    pub fn new(email: &str, name: Option<String>) -> Result<Self> {
        let email = normalize_email(email);
        if !email.validate_email() {
            return Err(TeamsError::Validation("Invalid email format".to_string()));
        }

        if let Some(ref name) = name {
            if name.is_empty() || name.len() > 100 {
                return Err(TeamsError::Validation(
                    "Name must be 1-100 characters".to_string(),
                ));
            }
        }

        Ok(User {
            id: Uuid::new_v4(),
            email,
            name,
            created_at: Utc::now(),
        })
    }
}

/// Membership roles within a team.
///
/// Team ownership is a separate concept derived from `Team.owner_id`; it is
/// deliberately not a role value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Admin,
    #[default]
    Member,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberRole::Admin => write!(f, "admin"),
            MemberRole::Member => write!(f, "member"),
        }
    }
}

impl MemberRole {
    /// Check if this role can perform admin actions
    pub fn can_admin(&self) -> bool {
        matches!(self, MemberRole::Admin)
    }
}

/// Which party is financially responsible for a member's paid plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingProvider {
    /// The member keeps their own payment arrangement
    SelfPaid,
    /// The owning team's owner pays
    #[default]
    TeamOwner,
}

impl std::fmt::Display for BillingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingProvider::SelfPaid => write!(f, "self"),
            BillingProvider::TeamOwner => write!(f, "team_owner"),
        }
    }
}

/// Team entity
///
/// A team may have a parent; following `parent_team_id` edges from any team
/// must terminate at a root within a bounded number of hops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub parent_team_id: Option<Uuid>,
    pub shared_balance_cents: i64,
    pub is_unlimited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// Create a new root team with validation
    pub fn new(name: String, owner_id: Uuid) -> Result<Self> {
        if name.is_empty() || name.len() > 100 {
            return Err(TeamsError::Validation(
                "Team name must be 1-100 characters".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Team {
            id: Uuid::new_v4(),
            name,
            owner_id,
            parent_team_id: None,
            shared_balance_cents: 0,
            is_unlimited: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// A team with no parent is a hierarchy root
    pub fn is_root(&self) -> bool {
        self.parent_team_id.is_none()
    }

    /// Validate invariants
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > 100 {
            return Err(TeamsError::Validation(
                "Team name must be 1-100 characters".to_string(),
            ));
        }

        // A team can never be its own parent
        if self.parent_team_id == Some(self.id) {
            return Err(TeamsError::Validation(
                "Team cannot be its own parent".to_string(),
            ));
        }

        Ok(())
    }
}

/// Membership entity - a user's record within one team, carrying
/// billing and limit overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: Uuid,
    pub team_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    /// Member-level monthly budget override; None = inherit
    pub monthly_limit_cents: Option<i64>,
    /// Member-level rate limit override; None = inherit
    pub rate_limit_rpm: Option<i64>,
    pub current_month_spend_cents: i64,
    /// Next scheduled budget reset; set on first recorded usage
    pub budget_reset_at: Option<DateTime<Utc>>,
    pub billing_provider: BillingProvider,
    pub is_unlimited: bool,
    pub external_subscription_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TeamMember {
    /// Create a new membership with default billing and no overrides
    pub fn new(team_id: Uuid, user_id: Uuid, role: MemberRole) -> Self {
        TeamMember {
            id: Uuid::new_v4(),
            team_id,
            user_id,
            role,
            monthly_limit_cents: None,
            rate_limit_rpm: None,
            current_month_spend_cents: 0,
            budget_reset_at: None,
            billing_provider: BillingProvider::default(),
            is_unlimited: false,
            external_subscription_ref: None,
            created_at: Utc::now(),
        }
    }

    /// Validate invariants
    pub fn validate(&self) -> Result<()> {
        if self.current_month_spend_cents < 0 {
            return Err(TeamsError::Validation(
                "Spend cannot be negative".to_string(),
            ));
        }

        if let Some(limit) = self.monthly_limit_cents {
            if limit < 0 {
                return Err(TeamsError::Validation(
                    "Monthly limit cannot be negative".to_string(),
                ));
            }
        }

        if let Some(rpm) = self.rate_limit_rpm {
            if rpm < 0 {
                return Err(TeamsError::Validation(
                    "Rate limit cannot be negative".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Invitation entity - pending invitation to join a team
///
/// Rows are an append-only audit trail: a single terminal timestamp is the
/// only mutation an invitation ever sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamInvitation {
    pub id: Uuid,
    pub team_id: Uuid,
    pub invited_by: Uuid,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TeamInvitation {
    /// Create a new invitation with validation
    pub fn new(team_id: Uuid, invited_by: Uuid, email: &str, ttl_days: i64) -> Result<Self> {
        let email = normalize_email(email);
        if !email.validate_email() {
            return Err(TeamsError::Validation("Invalid email format".to_string()));
        }

        // Generate secure token: 32 random bytes, URL-safe base64 encoded (43 chars)
        let mut token_bytes = [0u8; 32];
        getrandom::getrandom(&mut token_bytes)
            .map_err(|e| TeamsError::Internal(format!("Failed to generate random bytes: {}", e)))?;
        let token = URL_SAFE_NO_PAD.encode(token_bytes);

        let now = Utc::now();
        Ok(TeamInvitation {
            id: Uuid::new_v4(),
            team_id,
            invited_by,
            email,
            token,
            expires_at: now + chrono::Duration::days(ttl_days),
            accepted_at: None,
            revoked_at: None,
            created_at: now,
        })
    }

    /// Get current invitation state.
    ///
    /// Terminal timestamps are checked before the expiry clock so terminal
    /// states are sticky.
    pub fn state(&self) -> InvitationState {
        if self.accepted_at.is_some() {
            InvitationState::Accepted
        } else if self.revoked_at.is_some() {
            InvitationState::Revoked
        } else if self.expires_at < Utc::now() {
            InvitationState::Expired
        } else {
            InvitationState::Pending
        }
    }

    /// Check if invitation can be acted upon
    pub fn is_actionable(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Check if invitation is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Accept the invitation
    pub fn accept(&mut self) -> Result<()> {
        self.apply_transition(InvitationEvent::Accept)?;
        self.accepted_at = Some(Utc::now());
        Ok(())
    }

    /// Revoke the invitation (admin-initiated)
    pub fn revoke(&mut self) -> Result<()> {
        self.apply_transition(InvitationEvent::Revoke)?;
        self.revoked_at = Some(Utc::now());
        Ok(())
    }

    /// Apply a state transition using the state machine
    fn apply_transition(&self, event: InvitationEvent) -> Result<InvitationState> {
        let current_state = self.state();
        let context = InvitationGuardContext {
            is_expired: self.is_expired(),
        };
        InvitationStateMachine::transition(current_state, event, Some(&context)).map_err(
            |e| match e {
                StateError::InvalidTransition { from, event, .. } => TeamsError::Validation(
                    format!(
                        "Invalid invitation transition: cannot apply '{}' event from '{}' state",
                        event, from
                    ),
                ),
                StateError::TerminalState(_) if current_state == InvitationState::Expired => {
                    TeamsError::InvitationExpired
                }
                StateError::TerminalState(_) => TeamsError::InvitationAlreadyProcessed,
                StateError::GuardFailed(_) => TeamsError::InvitationExpired,
            },
        )
    }

    /// Check if a transition is valid without applying it
    pub fn can_transition(&self, event: &InvitationEvent) -> bool {
        let context = InvitationGuardContext {
            is_expired: self.is_expired(),
        };
        InvitationStateMachine::can_transition(self.state(), event, Some(&context))
    }

    /// Validate invariants
    pub fn validate(&self) -> Result<()> {
        if !self.email.validate_email() {
            return Err(TeamsError::Validation("Invalid email format".to_string()));
        }

        if self.email != normalize_email(&self.email) {
            return Err(TeamsError::Validation(
                "Invitation email must be normalized".to_string(),
            ));
        }

        // At most one terminal timestamp can be set
        if self.accepted_at.is_some() && self.revoked_at.is_some() {
            return Err(TeamsError::Validation(
                "Invitation cannot have multiple terminal states".to_string(),
            ));
        }

        if self.created_at >= self.expires_at {
            return Err(TeamsError::Validation(
                "Expiration must be after creation".to_string(),
            ));
        }

        Ok(())
    }
}
