//! Per-member spend tracking against a monthly budget
//!
//! Usage events arrive at least once and possibly out of order; the event
//! id is the dedup key and is checked-and-marked inside the same unit of
//! work as the spend mutation. Enforcement is tracking-only: an overage
//! raises an observability signal and never rejects the usage record.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TeamsError};
use crate::repository::RecordedUsage;
use crate::service::TeamsCore;

/// Result of recording a usage event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageOutcome {
    pub current_spend_cents: i64,
    pub limit_exceeded: bool,
}

/// Start of the calendar month following `now`, in UTC.
///
/// Pure year/month arithmetic: December rolls into January of the next
/// year, and no part of this depends on how many days the current or next
/// month has.
pub fn start_of_next_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("first day of a month is a valid UTC timestamp")
}

impl TeamsCore {
    /// Record a usage event against a member's monthly budget.
    ///
    /// `subject_id` is the billed identity: a membership id, or a bare
    /// owner's user id when no membership row exists. Owner usage only
    /// draws down the owned team's shared balance.
    pub async fn record_usage(
        &self,
        subject_id: Uuid,
        cost_cents: i64,
        event_id: &str,
    ) -> Result<UsageOutcome> {
        if cost_cents < 0 {
            return Err(TeamsError::Validation(
                "Usage cost cannot be negative".to_string(),
            ));
        }
        if event_id.is_empty() {
            return Err(TeamsError::Validation(
                "Usage event id must not be empty".to_string(),
            ));
        }

        let mut tx = self.store().begin().await;

        // Replay of an already-applied event: return the stored outcome,
        // touch nothing
        if let Some(prior) = tx.usage_outcome(event_id) {
            return Ok(UsageOutcome {
                current_spend_cents: prior.spend_after_cents,
                limit_exceeded: prior.limit_exceeded,
            });
        }

        let now = Utc::now();

        let Some(mut member) = tx.member(subject_id) else {
            return self.record_owner_usage(tx, subject_id, cost_cents, event_id, now);
        };

        match member.budget_reset_at {
            // First usage: schedule the reset, keep the spend
            None => member.budget_reset_at = Some(start_of_next_month(now)),
            // Overdue reset: zero the counter before applying this event
            Some(reset_at) if reset_at < now => {
                member.current_month_spend_cents = 0;
                member.budget_reset_at = Some(start_of_next_month(now));
            }
            Some(_) => {}
        }
        tx.put_member(member.clone());

        let spend = tx.add_member_spend(member.id, cost_cents)?;

        let mut limit_exceeded = false;
        if let Some(limit) = member.monthly_limit_cents {
            if !member.is_unlimited && spend > limit {
                limit_exceeded = true;
                // Overage signal: observability only, the record stands
                tracing::warn!(
                    member_id = %member.id,
                    team_id = %member.team_id,
                    spend_cents = spend,
                    limit_cents = limit,
                    "monthly budget exceeded"
                );
            }
        }

        tx.record_usage_event(
            event_id,
            RecordedUsage {
                subject_id,
                spend_after_cents: spend,
                limit_exceeded,
                recorded_at: now,
            },
        );
        tx.commit();

        Ok(UsageOutcome {
            current_spend_cents: spend,
            limit_exceeded,
        })
    }

    /// Owner-level usage: no membership row exists for the billed
    /// identity, so only the owned team's shared balance moves.
    fn record_owner_usage(
        &self,
        mut tx: crate::repository::StoreTx<'_>,
        subject_id: Uuid,
        cost_cents: i64,
        event_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UsageOutcome> {
        let owned = tx.teams_owned_by(subject_id);
        let team = owned.first().ok_or(TeamsError::NotFound("member"))?;

        // Unlimited-plan teams do not draw down the shared pool, but the
        // event is still marked as applied
        if !team.is_unlimited {
            tx.add_team_balance(team.id, -cost_cents)?;
        }
        tx.record_usage_event(
            event_id,
            RecordedUsage {
                subject_id,
                spend_after_cents: 0,
                limit_exceeded: false,
                recorded_at: now,
            },
        );
        tx.commit();

        Ok(UsageOutcome {
            current_spend_cents: 0,
            limit_exceeded: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapters::mock::{MockMailer, StaticBillingProbe};
    use crate::domain::entities::{MemberRole, TeamMember};
    use crate::repository::TeamStore;
    use chrono::Timelike;
    use crewbase_common::CoreConfig;

    fn core() -> TeamsCore {
        TeamsCore::new(
            TeamStore::new(),
            Arc::new(MockMailer::new()),
            Arc::new(StaticBillingProbe::new()),
            CoreConfig::default(),
        )
    }

    async fn seed_member(core: &TeamsCore) -> TeamMember {
        let owner = core.register_user("owner@example.com", None).await.unwrap();
        let user = core.register_user("member@example.com", None).await.unwrap();
        let team = core.create_team(owner.id, "Crew").await.unwrap();
        core.add_member(team.id, owner.id, user.id, MemberRole::Member)
            .await
            .unwrap()
    }

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_next_month_november_rolls_to_december_first() {
        let next = start_of_next_month(utc(2025, 11, 14));
        assert_eq!((next.year(), next.month(), next.day()), (2025, 12, 1));
        assert_eq!((next.hour(), next.minute(), next.second()), (0, 0, 0));

        let next = start_of_next_month(utc(2025, 11, 30));
        assert_eq!((next.year(), next.month(), next.day()), (2025, 12, 1));
    }

    #[test]
    fn test_next_month_december_rolls_to_january_next_year() {
        let next = start_of_next_month(utc(2025, 12, 31));
        assert_eq!((next.year(), next.month(), next.day()), (2026, 1, 1));
    }

    #[test]
    fn test_next_month_leap_february_rolls_to_march_first() {
        // 2024 is a leap year
        let next = start_of_next_month(utc(2024, 2, 29));
        assert_eq!((next.year(), next.month(), next.day()), (2024, 3, 1));

        let next = start_of_next_month(utc(2024, 2, 1));
        assert_eq!((next.year(), next.month(), next.day()), (2024, 3, 1));
    }

    #[test]
    fn test_next_month_thirty_day_month() {
        let next = start_of_next_month(utc(2025, 4, 30));
        assert_eq!((next.year(), next.month(), next.day()), (2025, 5, 1));
    }

    #[tokio::test]
    async fn test_first_usage_sets_reset_without_resetting_spend() {
        let core = core();
        let member = seed_member(&core).await;

        let outcome = core.record_usage(member.id, 250, "ev-1").await.unwrap();
        assert_eq!(outcome.current_spend_cents, 250);
        assert!(!outcome.limit_exceeded);

        let tx = core.store().begin().await;
        let stored = tx.member(member.id).unwrap();
        let reset_at = stored.budget_reset_at.unwrap();
        assert!(reset_at > Utc::now());
        assert_eq!((reset_at.day(), reset_at.hour(), reset_at.minute()), (1, 0, 0));
        assert_eq!(stored.current_month_spend_cents, 250);
    }

    #[tokio::test]
    async fn test_overdue_reset_zeroes_before_increment() {
        let core = core();
        let member = seed_member(&core).await;

        // last month's spend with a reset date already in the past
        {
            let mut tx = core.store().begin().await;
            let mut row = tx.member(member.id).unwrap();
            row.current_month_spend_cents = 9_000;
            row.budget_reset_at = Some(Utc::now() - chrono::Duration::days(3));
            tx.put_member(row);
            tx.commit();
        }

        let outcome = core.record_usage(member.id, 100, "ev-1").await.unwrap();
        assert_eq!(outcome.current_spend_cents, 100);

        let tx = core.store().begin().await;
        let stored = tx.member(member.id).unwrap();
        assert_eq!(stored.current_month_spend_cents, 100);
        assert!(stored.budget_reset_at.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_overage_signal_does_not_block() {
        let core = core();
        let member = seed_member(&core).await;
        {
            let mut tx = core.store().begin().await;
            let mut row = tx.member(member.id).unwrap();
            row.monthly_limit_cents = Some(500);
            row.current_month_spend_cents = 450;
            row.budget_reset_at = Some(Utc::now() + chrono::Duration::days(10));
            tx.put_member(row);
            tx.commit();
        }

        let outcome = core.record_usage(member.id, 100, "ev-1").await.unwrap();
        assert_eq!(outcome.current_spend_cents, 550);
        assert!(outcome.limit_exceeded);

        // the usage was still recorded
        let tx = core.store().begin().await;
        assert_eq!(
            tx.member(member.id).unwrap().current_month_spend_cents,
            550
        );
    }

    #[tokio::test]
    async fn test_spend_exactly_at_limit_is_not_overage() {
        let core = core();
        let member = seed_member(&core).await;
        {
            let mut tx = core.store().begin().await;
            let mut row = tx.member(member.id).unwrap();
            row.monthly_limit_cents = Some(500);
            row.current_month_spend_cents = 400;
            row.budget_reset_at = Some(Utc::now() + chrono::Duration::days(10));
            tx.put_member(row);
            tx.commit();
        }

        let outcome = core.record_usage(member.id, 100, "ev-1").await.unwrap();
        assert_eq!(outcome.current_spend_cents, 500);
        assert!(!outcome.limit_exceeded);
    }

    #[tokio::test]
    async fn test_unlimited_member_never_signals() {
        let core = core();
        let member = seed_member(&core).await;
        {
            let mut tx = core.store().begin().await;
            let mut row = tx.member(member.id).unwrap();
            row.monthly_limit_cents = Some(100);
            row.is_unlimited = true;
            tx.put_member(row);
            tx.commit();
        }

        let outcome = core.record_usage(member.id, 5_000, "ev-1").await.unwrap();
        assert_eq!(outcome.current_spend_cents, 5_000);
        assert!(!outcome.limit_exceeded);
    }

    #[tokio::test]
    async fn test_replayed_event_is_not_double_counted() {
        let core = core();
        let member = seed_member(&core).await;

        let first = core.record_usage(member.id, 300, "ev-dup").await.unwrap();
        let replay = core.record_usage(member.id, 300, "ev-dup").await.unwrap();

        assert_eq!(first, replay);
        let tx = core.store().begin().await;
        assert_eq!(
            tx.member(member.id).unwrap().current_month_spend_cents,
            300
        );
    }

    #[tokio::test]
    async fn test_replay_after_later_events_returns_original_outcome() {
        let core = core();
        let member = seed_member(&core).await;

        let first = core.record_usage(member.id, 300, "ev-1").await.unwrap();
        core.record_usage(member.id, 200, "ev-2").await.unwrap();

        // out-of-order redelivery of ev-1
        let replay = core.record_usage(member.id, 300, "ev-1").await.unwrap();
        assert_eq!(replay, first);

        let tx = core.store().begin().await;
        assert_eq!(
            tx.member(member.id).unwrap().current_month_spend_cents,
            500
        );
    }

    #[tokio::test]
    async fn test_owner_usage_draws_down_shared_balance() {
        let core = core();
        let owner = core.register_user("owner@example.com", None).await.unwrap();
        let team = core.create_team(owner.id, "Crew").await.unwrap();
        {
            let mut tx = core.store().begin().await;
            tx.add_team_balance(team.id, 10_000).unwrap();
            tx.commit();
        }

        let outcome = core.record_usage(owner.id, 1_500, "ev-owner").await.unwrap();
        assert_eq!(outcome.current_spend_cents, 0);
        assert!(!outcome.limit_exceeded);

        let tx = core.store().begin().await;
        assert_eq!(tx.team(team.id).unwrap().shared_balance_cents, 8_500);
    }

    #[tokio::test]
    async fn test_owner_usage_replay_is_deduplicated() {
        let core = core();
        let owner = core.register_user("owner@example.com", None).await.unwrap();
        let team = core.create_team(owner.id, "Crew").await.unwrap();

        core.record_usage(owner.id, 1_000, "ev-owner").await.unwrap();
        core.record_usage(owner.id, 1_000, "ev-owner").await.unwrap();

        let tx = core.store().begin().await;
        assert_eq!(tx.team(team.id).unwrap().shared_balance_cents, -1_000);
    }

    #[tokio::test]
    async fn test_unlimited_team_keeps_its_balance() {
        let core = core();
        let owner = core.register_user("owner@example.com", None).await.unwrap();
        let team = core.create_team(owner.id, "Crew").await.unwrap();
        {
            let mut tx = core.store().begin().await;
            let mut row = tx.team(team.id).unwrap();
            row.is_unlimited = true;
            tx.put_team(row);
            tx.commit();
        }

        core.record_usage(owner.id, 1_500, "ev-owner").await.unwrap();

        let tx = core.store().begin().await;
        assert_eq!(tx.team(team.id).unwrap().shared_balance_cents, 0);
        // the event is still deduplicated
        assert!(tx.usage_outcome("ev-owner").is_some());
    }

    #[tokio::test]
    async fn test_unknown_subject_is_not_found() {
        let core = core();
        let result = core.record_usage(Uuid::new_v4(), 100, "ev-1").await;
        assert!(matches!(result, Err(TeamsError::NotFound("member"))));
    }

    #[tokio::test]
    async fn test_negative_cost_rejected() {
        let core = core();
        let member = seed_member(&core).await;
        let result = core.record_usage(member.id, -5, "ev-1").await;
        assert!(matches!(result, Err(TeamsError::Validation(_))));
    }

    #[tokio::test]
    async fn test_empty_event_id_rejected() {
        let core = core();
        let member = seed_member(&core).await;
        let result = core.record_usage(member.id, 5, "").await;
        assert!(matches!(result, Err(TeamsError::Validation(_))));
    }
}
