//! Transactional in-memory store for the teams domain
//!
//! `TeamStore::begin` hands out a `StoreTx` unit of work that sees a
//! snapshot of the current state and buffers every write. `commit`
//! publishes the buffered state; dropping the transaction without
//! committing rolls it back. The store lock is held for the span of the
//! unit of work, so units of work are serializable and invitation status
//! transitions are linearizable per token.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::entities::{normalize_email, Team, TeamInvitation, TeamMember, User};
use crate::domain::state::InvitationState;
use crate::error::{Result, TeamsError};

/// Outcome of an applied usage event, kept keyed by event id so replays
/// return exactly what the first delivery produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedUsage {
    pub subject_id: Uuid,
    pub spend_after_cents: i64,
    pub limit_exceeded: bool,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    users: HashMap<Uuid, User>,
    teams: HashMap<Uuid, Team>,
    members: HashMap<Uuid, TeamMember>,
    invitations: HashMap<Uuid, TeamInvitation>,
    usage_events: HashMap<String, RecordedUsage>,
}

/// Cheaply clonable handle to the shared store
#[derive(Clone, Default)]
pub struct TeamStore {
    inner: Arc<Mutex<StoreState>>,
}

impl TeamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a unit of work.
    ///
    /// Holds the store lock until the transaction is committed or dropped;
    /// concurrent units of work queue behind it.
    pub async fn begin(&self) -> StoreTx<'_> {
        let guard = self.inner.lock().await;
        let work = guard.clone();
        StoreTx { guard, work }
    }
}

/// A unit of work over the store.
///
/// Reads and writes go against a private working copy; nothing becomes
/// visible to other callers until `commit`. Drop without commit = rollback.
pub struct StoreTx<'a> {
    guard: MutexGuard<'a, StoreState>,
    work: StoreState,
}

impl StoreTx<'_> {
    /// Publish the working copy. Consumes the transaction.
    pub fn commit(mut self) {
        *self.guard = self.work;
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn user(&self, user_id: Uuid) -> Option<User> {
        self.work.users.get(&user_id).cloned()
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        let email = normalize_email(email);
        self.work.users.values().find(|u| u.email == email).cloned()
    }

    pub fn put_user(&mut self, user: User) {
        self.work.users.insert(user.id, user);
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    pub fn team(&self, team_id: Uuid) -> Option<Team> {
        self.work.teams.get(&team_id).cloned()
    }

    pub fn put_team(&mut self, team: Team) {
        self.work.teams.insert(team.id, team);
    }

    /// Remove a team. Returns false if it did not exist.
    pub fn remove_team(&mut self, team_id: Uuid) -> bool {
        self.work.teams.remove(&team_id).is_some()
    }

    /// Teams owned by a user, earliest-created first (ties broken by id so
    /// classification stays deterministic).
    pub fn teams_owned_by(&self, user_id: Uuid) -> Vec<Team> {
        let mut teams: Vec<Team> = self
            .work
            .teams
            .values()
            .filter(|t| t.owner_id == user_id)
            .cloned()
            .collect();
        teams.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        teams
    }

    /// Direct children of a team
    pub fn child_teams(&self, parent_id: Uuid) -> Vec<Team> {
        let mut teams: Vec<Team> = self
            .work
            .teams
            .values()
            .filter(|t| t.parent_team_id == Some(parent_id))
            .cloned()
            .collect();
        teams.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        teams
    }

    /// Attach a team under a new parent, bumping its update timestamp
    pub fn set_team_parent(&mut self, team_id: Uuid, parent_id: Uuid) -> Result<()> {
        let team = self
            .work
            .teams
            .get_mut(&team_id)
            .ok_or(TeamsError::NotFound("team"))?;
        team.parent_team_id = Some(parent_id);
        team.updated_at = Utc::now();
        Ok(())
    }

    /// Atomic balance adjustment; returns the new balance
    pub fn add_team_balance(&mut self, team_id: Uuid, delta_cents: i64) -> Result<i64> {
        let team = self
            .work
            .teams
            .get_mut(&team_id)
            .ok_or(TeamsError::NotFound("team"))?;
        team.shared_balance_cents += delta_cents;
        team.updated_at = Utc::now();
        Ok(team.shared_balance_cents)
    }

    // ------------------------------------------------------------------
    // Members
    // ------------------------------------------------------------------

    pub fn member(&self, member_id: Uuid) -> Option<TeamMember> {
        self.work.members.get(&member_id).cloned()
    }

    pub fn member_by_team_and_user(&self, team_id: Uuid, user_id: Uuid) -> Option<TeamMember> {
        self.work
            .members
            .values()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
            .cloned()
    }

    /// All memberships a user holds, earliest-created first
    pub fn memberships_for_user(&self, user_id: Uuid) -> Vec<TeamMember> {
        let mut members: Vec<TeamMember> = self
            .work
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        members
    }

    pub fn members_of_team(&self, team_id: Uuid) -> Vec<TeamMember> {
        let mut members: Vec<TeamMember> = self
            .work
            .members
            .values()
            .filter(|m| m.team_id == team_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        members
    }

    pub fn put_member(&mut self, member: TeamMember) {
        self.work.members.insert(member.id, member);
    }

    /// Remove a membership row. Returns false if it did not exist.
    pub fn remove_member(&mut self, member_id: Uuid) -> bool {
        self.work.members.remove(&member_id).is_some()
    }

    /// Remove every membership row of a team (used when a team is
    /// dissolved). Returns how many rows were removed.
    pub fn remove_members_of_team(&mut self, team_id: Uuid) -> usize {
        let ids: Vec<Uuid> = self
            .work
            .members
            .values()
            .filter(|m| m.team_id == team_id)
            .map(|m| m.id)
            .collect();
        for id in &ids {
            self.work.members.remove(id);
        }
        ids.len()
    }

    /// Atomic spend increment; returns the new running total
    pub fn add_member_spend(&mut self, member_id: Uuid, delta_cents: i64) -> Result<i64> {
        let member = self
            .work
            .members
            .get_mut(&member_id)
            .ok_or(TeamsError::NotFound("member"))?;
        member.current_month_spend_cents += delta_cents;
        Ok(member.current_month_spend_cents)
    }

    // ------------------------------------------------------------------
    // Invitations
    // ------------------------------------------------------------------

    pub fn invitation(&self, invitation_id: Uuid) -> Option<TeamInvitation> {
        self.work.invitations.get(&invitation_id).cloned()
    }

    pub fn invitation_by_token(&self, token: &str) -> Option<TeamInvitation> {
        self.work
            .invitations
            .values()
            .find(|i| i.token == token)
            .cloned()
    }

    /// The pending invitation for a (team, email) pair, if any. State is
    /// derived at read time, so an overdue row no longer counts as pending.
    pub fn pending_invitation_for(&self, team_id: Uuid, email: &str) -> Option<TeamInvitation> {
        let email = normalize_email(email);
        self.work
            .invitations
            .values()
            .find(|i| {
                i.team_id == team_id && i.email == email && i.state() == InvitationState::Pending
            })
            .cloned()
    }

    pub fn invitations_for_team(&self, team_id: Uuid) -> Vec<TeamInvitation> {
        let mut invitations: Vec<TeamInvitation> = self
            .work
            .invitations
            .values()
            .filter(|i| i.team_id == team_id)
            .cloned()
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        invitations
    }

    pub fn put_invitation(&mut self, invitation: TeamInvitation) {
        self.work.invitations.insert(invitation.id, invitation);
    }

    /// Flip an invitation to accepted through its state machine,
    /// conditional on it still being pending. This conditional write is
    /// the concurrency guard for racing acceptances: the loser observes a
    /// terminal row here and fails.
    pub fn mark_invitation_accepted(&mut self, invitation_id: Uuid) -> Result<()> {
        self.work
            .invitations
            .get_mut(&invitation_id)
            .ok_or(TeamsError::NotFound("invitation"))?
            .accept()
    }

    /// Flip an invitation to revoked through its state machine,
    /// conditional on it still being pending
    pub fn mark_invitation_revoked(&mut self, invitation_id: Uuid) -> Result<()> {
        self.work
            .invitations
            .get_mut(&invitation_id)
            .ok_or(TeamsError::NotFound("invitation"))?
            .revoke()
    }

    // ------------------------------------------------------------------
    // Usage events
    // ------------------------------------------------------------------

    /// Previously applied outcome for a usage event id, if any
    pub fn usage_outcome(&self, event_id: &str) -> Option<RecordedUsage> {
        self.work.usage_events.get(event_id).cloned()
    }

    /// Mark a usage event as applied, in the same unit of work as its
    /// effect
    pub fn record_usage_event(&mut self, event_id: &str, usage: RecordedUsage) {
        self.work.usage_events.insert(event_id.to_string(), usage);
    }
}
