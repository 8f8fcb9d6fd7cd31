//! Invitation-acceptance migration engine
//!
//! Accepting an invitation puts the invitee in exactly one of five
//! mutually exclusive situations, each with its own structural change.
//! Classification and execution happen inside a single unit of work
//! together with the invitation's PENDING→ACCEPTED transition, so racing
//! acceptances of the same token produce exactly one winner and no
//! partial migration ever becomes visible.

use uuid::Uuid;

use crate::domain::entities::{BillingProvider, MemberRole, TeamMember};
use crate::domain::state::{InvitationState, InviteeSituation, MigrationOutcome};
use crate::error::{Result, TeamsError};
use crate::repository::StoreTx;
use crate::service::{hierarchy, TeamsCore};

impl TeamsCore {
    /// Accept an invitation by token and apply the matching migration.
    ///
    /// The token is re-validated first: it must resolve, be pending, be
    /// unexpired, and carry the accepting user's verified email. Each of
    /// those failures is terminal for this token.
    pub async fn accept_invitation(
        &self,
        token: &str,
        accepting_user_id: Uuid,
    ) -> Result<MigrationOutcome> {
        // The payment processor is consulted up front; all structural state
        // it gates is re-read inside the unit of work below.
        let subscription_ref = self
            .billing()
            .active_subscription(accepting_user_id)
            .await
            .map_err(TeamsError::Adapter)?;

        let mut tx = self.store().begin().await;

        let invitation = tx
            .invitation_by_token(token)
            .ok_or(TeamsError::NotFound("invitation"))?;
        match invitation.state() {
            InvitationState::Pending => {}
            InvitationState::Expired => return Err(TeamsError::InvitationExpired),
            InvitationState::Accepted | InvitationState::Revoked => {
                return Err(TeamsError::InvitationAlreadyProcessed)
            }
        }

        let user = tx
            .user(accepting_user_id)
            .ok_or(TeamsError::NotFound("user"))?;
        if user.email != invitation.email {
            return Err(TeamsError::EmailMismatch);
        }

        let inviting_team = tx
            .team(invitation.team_id)
            .ok_or(TeamsError::NotFound("team"))?;
        if inviting_team.owner_id == user.id
            || tx
                .member_by_team_and_user(inviting_team.id, user.id)
                .is_some()
        {
            return Err(TeamsError::AlreadyMember);
        }

        let situation = classify_invitee(&tx, user.id, subscription_ref.is_some());
        let outcome = match situation {
            InviteeSituation::NoTeam => {
                let member = TeamMember::new(inviting_team.id, user.id, MemberRole::Member);
                let member_id = member.id;
                tx.put_member(member);
                MigrationOutcome::JoinedTeam { member_id }
            }

            InviteeSituation::EmptyTeamNoSubscription { team_id } => {
                // The empty team does not survive; drop any rows it still
                // holds (the owner's own membership) so it stops resolving.
                tx.remove_members_of_team(team_id);
                tx.remove_team(team_id);
                let member = TeamMember::new(inviting_team.id, user.id, MemberRole::Member);
                let member_id = member.id;
                tx.put_member(member);
                MigrationOutcome::TeamDissolved {
                    dissolved_team_id: team_id,
                    member_id,
                }
            }

            InviteeSituation::EmptyTeamWithSubscription { .. } => {
                // The invitee keeps their own payment arrangement (and the
                // team anchoring it) instead of having it cancelled.
                let mut member = TeamMember::new(inviting_team.id, user.id, MemberRole::Member);
                member.billing_provider = BillingProvider::SelfPaid;
                member.external_subscription_ref = subscription_ref.clone();
                let member_id = member.id;
                tx.put_member(member);
                MigrationOutcome::JoinedKeepingSubscription { member_id }
            }

            InviteeSituation::OwnsTeamWithMembers { team_id } => {
                // The guard at invite-creation time may be stale; re-check
                // acyclicity against transactional state before attaching.
                if hierarchy::is_ancestor_of(
                    &tx,
                    team_id,
                    inviting_team.id,
                    self.config().max_hierarchy_depth,
                )? {
                    return Err(TeamsError::AntiHijackViolation);
                }
                tx.set_team_parent(team_id, inviting_team.id)?;
                MigrationOutcome::TeamAbsorbed {
                    child_team_id: team_id,
                }
            }

            InviteeSituation::MemberElsewhere { membership_id } => {
                let previous = tx
                    .member(membership_id)
                    .ok_or(TeamsError::NotFound("member"))?;
                tx.remove_member(membership_id);
                let member = TeamMember::new(inviting_team.id, user.id, MemberRole::Member);
                let member_id = member.id;
                tx.put_member(member);
                MigrationOutcome::TransferredFromTeam {
                    previous_team_id: previous.team_id,
                    member_id,
                }
            }
        };

        // The status transition is part of the same unit of work and acts
        // as the concurrency guard for racing acceptances.
        tx.mark_invitation_accepted(invitation.id)?;
        tx.commit();

        tracing::info!(
            invitation_id = %invitation.id,
            team_id = %invitation.team_id,
            user_id = %accepting_user_id,
            situation = %situation,
            "invitation accepted"
        );

        Ok(outcome)
    }
}

/// Determine the invitee's situation, evaluating the predicates strictly
/// in order: each later predicate assumes the earlier ones were false.
///
/// A membership in the inviting team was already rejected before this
/// runs, so any membership seen here is "elsewhere". An invitee owning
/// several teams is classified by the earliest-created one. An owned team
/// with no members but with sub-teams is treated as a team with members:
/// dissolving it would orphan the subtree, absorbing it preserves it.
fn classify_invitee(tx: &StoreTx<'_>, user_id: Uuid, has_subscription: bool) -> InviteeSituation {
    let owned = tx.teams_owned_by(user_id);
    let memberships = tx.memberships_for_user(user_id);

    if owned.is_empty() && memberships.is_empty() {
        return InviteeSituation::NoTeam;
    }

    if let Some(team) = owned.first() {
        let has_other_members = tx
            .members_of_team(team.id)
            .iter()
            .any(|m| m.user_id != user_id);
        let has_sub_teams = !tx.child_teams(team.id).is_empty();

        if !has_other_members && !has_sub_teams {
            return if has_subscription {
                InviteeSituation::EmptyTeamWithSubscription { team_id: team.id }
            } else {
                InviteeSituation::EmptyTeamNoSubscription { team_id: team.id }
            };
        }
        return InviteeSituation::OwnsTeamWithMembers { team_id: team.id };
    }

    InviteeSituation::MemberElsewhere {
        membership_id: memberships[0].id,
    }
}
