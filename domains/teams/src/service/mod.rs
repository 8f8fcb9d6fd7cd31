//! Services of the teams domain
//!
//! `TeamsCore` is the facade request handlers talk to. It owns the store
//! handle, the collaborator adapters, and the configuration; each service
//! module contributes one slice of its behavior.

use std::sync::Arc;

use crewbase_common::CoreConfig;

use crate::adapters::{BillingProbe, InvitationMailer};
use crate::repository::TeamStore;

pub mod budget;
pub mod hierarchy;
pub mod invitations;
pub mod migration;
pub mod properties;
pub mod teams;

pub use budget::UsageOutcome;
pub use properties::{PropertyValue, TeamProperty};

/// Facade over the teams domain services
#[derive(Clone)]
pub struct TeamsCore {
    store: TeamStore,
    mailer: Arc<dyn InvitationMailer>,
    billing: Arc<dyn BillingProbe>,
    config: CoreConfig,
}

impl TeamsCore {
    pub fn new(
        store: TeamStore,
        mailer: Arc<dyn InvitationMailer>,
        billing: Arc<dyn BillingProbe>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            billing,
            config,
        }
    }

    pub fn store(&self) -> &TeamStore {
        &self.store
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub(crate) fn mailer(&self) -> &dyn InvitationMailer {
        self.mailer.as_ref()
    }

    pub(crate) fn billing(&self) -> &dyn BillingProbe {
        self.billing.as_ref()
    }
}
