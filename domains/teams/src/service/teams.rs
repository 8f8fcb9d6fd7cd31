//! Team and membership lifecycle operations
//!
//! Direct owner/admin actions: registering the identity projection,
//! creating root teams, and managing membership rows outside the
//! invitation flow.

use uuid::Uuid;

use crate::domain::entities::{MemberRole, Team, TeamMember, User};
use crate::error::{Result, TeamsError};
use crate::repository::StoreTx;
use crate::service::TeamsCore;

impl TeamsCore {
    /// Register the identity projection of a user.
    ///
    /// Authentication happens elsewhere; this records the verified email
    /// the invitation flow matches against.
    pub async fn register_user(&self, email: &str, name: Option<String>) -> Result<User> {
        let user = User::new(email, name)?;

        let mut tx = self.store().begin().await;
        if tx.user_by_email(&user.email).is_some() {
            return Err(TeamsError::Validation(
                "A user with this email already exists".to_string(),
            ));
        }
        tx.put_user(user.clone());
        tx.commit();

        Ok(user)
    }

    /// Create a new root team owned by `owner_id`.
    ///
    /// The owner does not get a membership row; ownership is derived from
    /// the team record, and owner-level usage is tracked against the
    /// shared balance instead.
    pub async fn create_team(&self, owner_id: Uuid, name: &str) -> Result<Team> {
        let team = Team::new(name.to_string(), owner_id)?;

        let mut tx = self.store().begin().await;
        tx.user(owner_id).ok_or(TeamsError::NotFound("user"))?;
        tx.put_team(team.clone());
        tx.commit();

        tracing::info!(team_id = %team.id, owner_id = %owner_id, "team created");
        Ok(team)
    }

    /// Add a member to a team by direct owner/admin action
    pub async fn add_member(
        &self,
        team_id: Uuid,
        caller_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<TeamMember> {
        let mut tx = self.store().begin().await;
        let team = tx.team(team_id).ok_or(TeamsError::NotFound("team"))?;
        tx.user(user_id).ok_or(TeamsError::NotFound("user"))?;

        require_admin(&tx, &team, caller_id)?;

        if tx.member_by_team_and_user(team_id, user_id).is_some() {
            return Err(TeamsError::AlreadyMember);
        }

        let member = TeamMember::new(team_id, user_id, role);
        tx.put_member(member.clone());
        tx.commit();

        Ok(member)
    }

    /// Remove a member from a team.
    ///
    /// Allowed for the team owner, an admin member, or the member
    /// themselves leaving. Ownership itself is not removable this way.
    pub async fn remove_member(&self, team_id: Uuid, caller_id: Uuid, user_id: Uuid) -> Result<()> {
        let mut tx = self.store().begin().await;
        let team = tx.team(team_id).ok_or(TeamsError::NotFound("team"))?;

        if caller_id != user_id {
            require_admin(&tx, &team, caller_id)?;
        }

        let member = tx
            .member_by_team_and_user(team_id, user_id)
            .ok_or(TeamsError::NotFound("member"))?;
        tx.remove_member(member.id);
        tx.commit();

        Ok(())
    }

    /// Update a member's budget/rate overrides (owner/admin action).
    ///
    /// `None` clears an override back to inherited resolution.
    pub async fn set_member_overrides(
        &self,
        member_id: Uuid,
        caller_id: Uuid,
        monthly_limit_cents: Option<i64>,
        rate_limit_rpm: Option<i64>,
    ) -> Result<TeamMember> {
        let mut tx = self.store().begin().await;
        let mut member = tx.member(member_id).ok_or(TeamsError::NotFound("member"))?;
        let team = tx
            .team(member.team_id)
            .ok_or(TeamsError::NotFound("team"))?;

        require_admin(&tx, &team, caller_id)?;

        member.monthly_limit_cents = monthly_limit_cents;
        member.rate_limit_rpm = rate_limit_rpm;
        member.validate()?;
        tx.put_member(member.clone());
        tx.commit();

        Ok(member)
    }
}

/// Owner or admin gate shared by the direct team actions
pub(crate) fn require_admin(tx: &StoreTx<'_>, team: &Team, caller_id: Uuid) -> Result<()> {
    if team.owner_id == caller_id {
        return Ok(());
    }
    match tx.member_by_team_and_user(team.id, caller_id) {
        Some(member) if member.role.can_admin() => Ok(()),
        _ => Err(TeamsError::NotPermitted(
            "only the team owner or an admin can do this",
        )),
    }
}
