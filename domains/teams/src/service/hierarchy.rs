//! Team hierarchy queries
//!
//! All queries read the structure visible to the caller's unit of work and
//! never mutate it. A caller that reads the hierarchy and later writes it
//! must run these queries inside the same `StoreTx` that performs the
//! write; a cached answer from an earlier transaction is advisory only.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::entities::Team;
use crate::error::{Result, TeamsError};
use crate::repository::StoreTx;

/// Ordered ancestor chain for a team: root first, the team itself last.
///
/// The walk is bounded by `max_depth` hops; exceeding the bound without
/// reaching a root means the persisted structure is corrupt and the
/// operation aborts with `CycleDetected`. This is a corruption guard, not
/// a normal-path outcome.
pub fn ancestor_chain(tx: &StoreTx<'_>, team_id: Uuid, max_depth: u32) -> Result<Vec<Team>> {
    let mut current = tx.team(team_id).ok_or(TeamsError::NotFound("team"))?;
    let mut chain = vec![current.clone()];
    let mut hops = 0u32;

    while let Some(parent_id) = current.parent_team_id {
        hops += 1;
        if hops > max_depth {
            tracing::error!(
                team_id = %team_id,
                max_depth,
                "ancestor walk exceeded depth bound without reaching a root"
            );
            return Err(TeamsError::CycleDetected(max_depth));
        }
        current = tx
            .team(parent_id)
            .ok_or(TeamsError::NotFound("parent team"))?;
        chain.push(current.clone());
    }

    chain.reverse();
    Ok(chain)
}

/// Every team id reachable from `team_id` via child edges, computed by
/// breadth-first expansion with the same depth guard as [`ancestor_chain`].
/// The team itself is not part of the set.
pub fn descendant_set(tx: &StoreTx<'_>, team_id: Uuid, max_depth: u32) -> Result<HashSet<Uuid>> {
    tx.team(team_id).ok_or(TeamsError::NotFound("team"))?;

    let mut seen = HashSet::new();
    let mut frontier = vec![team_id];
    let mut depth = 0u32;

    while !frontier.is_empty() {
        depth += 1;
        if depth > max_depth {
            tracing::error!(
                team_id = %team_id,
                max_depth,
                "descendant expansion exceeded depth bound"
            );
            return Err(TeamsError::CycleDetected(max_depth));
        }
        let mut next = Vec::new();
        for id in frontier {
            for child in tx.child_teams(id) {
                if child.id != team_id && seen.insert(child.id) {
                    next.push(child.id);
                }
            }
        }
        frontier = next;
    }

    Ok(seen)
}

/// True iff `candidate` appears in the ancestor chain of `team_id`,
/// excluding `team_id` itself.
pub fn is_ancestor_of(
    tx: &StoreTx<'_>,
    candidate: Uuid,
    team_id: Uuid,
    max_depth: u32,
) -> Result<bool> {
    if candidate == team_id {
        return Ok(false);
    }
    let chain = ancestor_chain(tx, team_id, max_depth)?;
    Ok(chain.iter().any(|t| t.id == candidate))
}
