//! Collaborator seams consumed by the teams core
//!
//! The payment processor and the outbound mailer are external systems; the
//! core only ever talks to them through these traits. Mock implementations
//! for tests and local development live in [`mock`].

use async_trait::async_trait;
use uuid::Uuid;

/// Read-only view of the payment processor.
///
/// Subscription lifecycle (create/cancel) is driven by collaborators
/// outside this core; the migration engine only asks whether an
/// arrangement currently exists and keeps the processor's reference when
/// one does.
#[async_trait]
pub trait BillingProbe: Send + Sync {
    /// The provider's reference for the user's active recurring
    /// subscription, if any
    async fn active_subscription(&self, user_id: Uuid) -> anyhow::Result<Option<String>>;
}

/// Fire-and-forget invitation email delivery.
///
/// A delivery failure is logged by the caller and never rolls back the
/// invitation that triggered it.
#[async_trait]
pub trait InvitationMailer: Send + Sync {
    async fn send_invitation(
        &self,
        recipient: &str,
        team_name: &str,
        token: &str,
    ) -> anyhow::Result<()>;
}

pub mod mock {
    //! Mock collaborators for tests and local development

    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::{BillingProbe, InvitationMailer};

    /// Billing probe answering from a fixed table of subscribed users
    #[derive(Default)]
    pub struct StaticBillingProbe {
        subscriptions: HashMap<Uuid, String>,
    }

    impl StaticBillingProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_subscription(mut self, user_id: Uuid, reference: &str) -> Self {
            self.subscriptions.insert(user_id, reference.to_string());
            self
        }
    }

    #[async_trait]
    impl BillingProbe for StaticBillingProbe {
        async fn active_subscription(&self, user_id: Uuid) -> anyhow::Result<Option<String>> {
            Ok(self.subscriptions.get(&user_id).cloned())
        }
    }

    /// A sent invitation captured by [`MockMailer`]
    #[derive(Debug, Clone, PartialEq)]
    pub struct SentInvitation {
        pub recipient: String,
        pub team_name: String,
        pub token: String,
    }

    /// Mailer that records every send instead of delivering
    #[derive(Default)]
    pub struct MockMailer {
        sent: Mutex<Vec<SentInvitation>>,
    }

    impl MockMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<SentInvitation> {
            self.sent.lock().expect("mailer mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl InvitationMailer for MockMailer {
        async fn send_invitation(
            &self,
            recipient: &str,
            team_name: &str,
            token: &str,
        ) -> anyhow::Result<()> {
            self.sent
                .lock()
                .expect("mailer mutex poisoned")
                .push(SentInvitation {
                    recipient: recipient.to_string(),
                    team_name: team_name.to_string(),
                    token: token.to_string(),
                });
            Ok(())
        }
    }

    /// Mailer that always fails, for exercising the fire-and-forget path
    #[derive(Default)]
    pub struct FailingMailer;

    #[async_trait]
    impl InvitationMailer for FailingMailer {
        async fn send_invitation(&self, _: &str, _: &str, _: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("smtp relay unreachable"))
        }
    }
}
