//! Teams domain: team hierarchy, memberships, invitations, budget tracking
//!
//! The core behind organization management: an acyclic team hierarchy,
//! cascading per-member policy values, a five-outcome migration engine
//! driven by invitation acceptance, and an idempotent monthly budget
//! ledger. HTTP, authentication, email delivery, and the payment
//! processor are external collaborators reached through the seams in
//! [`adapters`].

pub mod adapters;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

// Re-export domain types at the crate root for convenience
pub use domain::entities::*;
pub use domain::state::{
    InvitationEvent, InvitationGuardContext, InvitationState, InvitationStateMachine,
    InviteeSituation, MigrationOutcome, StateError,
};
// Re-export the error taxonomy
pub use error::{Result, TeamsError};
// Re-export storage types
pub use repository::{RecordedUsage, StoreTx, TeamStore};
// Re-export the service facade and its value types
pub use service::{
    budget::start_of_next_month, hierarchy, PropertyValue, TeamProperty, TeamsCore, UsageOutcome,
};
// Re-export the collaborator seams
pub use adapters::{BillingProbe, InvitationMailer};
