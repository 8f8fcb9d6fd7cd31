//! Cascading policy-value resolution for members
//!
//! A member-level override wins; otherwise the ancestor chain is walked
//! root-first and the first team-level value found wins; otherwise the
//! system default applies. Resolution is a pure read: two calls with
//! unchanged inputs return identical output.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TeamsError};
use crate::service::{hierarchy, TeamsCore};

/// Cascading properties the resolver knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TeamProperty {
    RateLimitRpm,
    MonthlyLimitCents,
}

impl std::fmt::Display for TeamProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimitRpm => write!(f, "rateLimitRpm"),
            Self::MonthlyLimitCents => write!(f, "monthlyLimitCents"),
        }
    }
}

/// A resolved property value, typed per property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyValue {
    /// Requests per minute; 0 means unlimited
    RateLimitRpm(i64),
    /// Monthly budget in cents; None means uncapped
    MonthlyLimitCents(Option<i64>),
}

impl PropertyValue {
    /// System default for a property
    pub fn system_default(property: TeamProperty) -> Self {
        match property {
            TeamProperty::RateLimitRpm => PropertyValue::RateLimitRpm(0),
            TeamProperty::MonthlyLimitCents => PropertyValue::MonthlyLimitCents(None),
        }
    }
}

impl TeamsCore {
    /// Resolve a cascading property for a member.
    ///
    /// Team-level values are read from each ancestor team owner's own
    /// membership row; there is no separate team-settings entity yet.
    pub async fn resolve_property(
        &self,
        member_id: Uuid,
        property: TeamProperty,
    ) -> Result<PropertyValue> {
        // Read-only unit of work, dropped without commit
        let tx = self.store().begin().await;
        let member = tx.member(member_id).ok_or(TeamsError::NotFound("member"))?;

        // 1. The member's own override, if explicitly set
        match property {
            TeamProperty::RateLimitRpm => {
                if let Some(rpm) = member.rate_limit_rpm {
                    return Ok(PropertyValue::RateLimitRpm(rpm));
                }
            }
            TeamProperty::MonthlyLimitCents => {
                if let Some(limit) = member.monthly_limit_cents {
                    return Ok(PropertyValue::MonthlyLimitCents(Some(limit)));
                }
            }
        }

        // 2. Root-first walk over the ancestor chain; the first configured
        //    owner-level value wins
        let chain = hierarchy::ancestor_chain(
            &tx,
            member.team_id,
            self.config().max_hierarchy_depth,
        )?;
        for team in &chain {
            let Some(owner_row) = tx.member_by_team_and_user(team.id, team.owner_id) else {
                continue;
            };
            match property {
                TeamProperty::RateLimitRpm => {
                    if let Some(rpm) = owner_row.rate_limit_rpm {
                        return Ok(PropertyValue::RateLimitRpm(rpm));
                    }
                }
                TeamProperty::MonthlyLimitCents => {
                    if let Some(limit) = owner_row.monthly_limit_cents {
                        return Ok(PropertyValue::MonthlyLimitCents(Some(limit)));
                    }
                }
            }
        }

        // 3. System default
        Ok(PropertyValue::system_default(property))
    }
}
