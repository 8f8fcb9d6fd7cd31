//! Invitation lifecycle: creation (with the anti-hijacking guard),
//! revocation, and listing with lazy expiry.

use uuid::Uuid;

use crate::domain::entities::{normalize_email, TeamInvitation};
use crate::domain::state::InvitationState;
use crate::error::{Result, TeamsError};
use crate::service::{hierarchy, teams::require_admin, TeamsCore};

impl TeamsCore {
    /// Create an invitation for `email` to join `team_id`.
    ///
    /// Checks run in one unit of work, in order: the inviting team and
    /// inviter exist, the inviter may invite, the invitee is not already
    /// aboard, the invitation cannot hijack an ancestor, and no pending
    /// invitation for the pair exists. The notification email goes out
    /// after commit and its failure never rolls the invitation back.
    pub async fn create_invitation(
        &self,
        team_id: Uuid,
        inviter_id: Uuid,
        email: &str,
    ) -> Result<TeamInvitation> {
        let email = normalize_email(email);

        let mut tx = self.store().begin().await;
        let team = tx.team(team_id).ok_or(TeamsError::NotFound("team"))?;
        let inviter = tx.user(inviter_id).ok_or(TeamsError::NotFound("user"))?;

        if email == inviter.email {
            return Err(TeamsError::Validation(
                "Cannot invite yourself to a team".to_string(),
            ));
        }

        require_admin(&tx, &team, inviter_id)?;

        // The invitee may not exist yet; every structural check below only
        // applies once the email resolves to a known user.
        if let Some(invitee) = tx.user_by_email(&email) {
            if invitee.id == team.owner_id {
                return Err(TeamsError::Validation(
                    "User already owns this team".to_string(),
                ));
            }
            if tx.member_by_team_and_user(team_id, invitee.id).is_some() {
                return Err(TeamsError::AlreadyMember);
            }

            // Anti-hijacking: inviting the owner of an ancestor would let a
            // descendant team re-parent that ancestor on acceptance.
            for owned in tx.teams_owned_by(invitee.id) {
                if hierarchy::is_ancestor_of(
                    &tx,
                    owned.id,
                    team_id,
                    self.config().max_hierarchy_depth,
                )? {
                    return Err(TeamsError::AntiHijackViolation);
                }
            }
        }

        if tx.pending_invitation_for(team_id, &email).is_some() {
            return Err(TeamsError::DuplicatePending);
        }

        let invitation = TeamInvitation::new(
            team_id,
            inviter_id,
            &email,
            self.config().invitation_ttl_days,
        )?;
        tx.put_invitation(invitation.clone());
        tx.commit();

        tracing::info!(
            invitation_id = %invitation.id,
            team_id = %team_id,
            "invitation created"
        );

        // Fire-and-forget notification
        if let Err(e) = self
            .mailer()
            .send_invitation(&invitation.email, &team.name, &invitation.token)
            .await
        {
            tracing::warn!(
                error = %e,
                invitation_id = %invitation.id,
                "failed to send invitation email"
            );
        }

        Ok(invitation)
    }

    /// Revoke a pending invitation.
    ///
    /// The token must belong to `caller_team_id`; an unknown token or a
    /// team mismatch both come back as `NotFound` so callers cannot probe
    /// for other teams' tokens.
    pub async fn revoke_invitation(&self, token: &str, caller_team_id: Uuid) -> Result<()> {
        let mut tx = self.store().begin().await;
        let invitation = tx
            .invitation_by_token(token)
            .ok_or(TeamsError::NotFound("invitation"))?;
        if invitation.team_id != caller_team_id {
            return Err(TeamsError::NotFound("invitation"));
        }

        tx.mark_invitation_revoked(invitation.id)?;
        tx.commit();

        tracing::info!(invitation_id = %invitation.id, "invitation revoked");
        Ok(())
    }

    /// All invitations of a team with their current state.
    ///
    /// State is derived at read time, so overdue pending rows surface as
    /// expired here without any background sweep.
    pub async fn list_invitations(
        &self,
        team_id: Uuid,
    ) -> Result<Vec<(TeamInvitation, InvitationState)>> {
        let tx = self.store().begin().await;
        tx.team(team_id).ok_or(TeamsError::NotFound("team"))?;

        Ok(tx
            .invitations_for_team(team_id)
            .into_iter()
            .map(|invitation| {
                let state = invitation.state();
                (invitation, state)
            })
            .collect())
    }
}
