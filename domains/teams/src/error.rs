//! Error taxonomy for the teams domain
//!
//! Every user-visible failure carries its own variant so callers can tell
//! "this invite expired" apart from "you're already on a team" apart from
//! "that would create a circular team structure".

use thiserror::Error;

/// Result type for teams domain operations
pub type Result<T> = std::result::Result<T, TeamsError>;

#[derive(Debug, Error)]
pub enum TeamsError {
    /// Structural corruption or depth-guard trip. Fatal for the operation,
    /// logged at error level, never auto-repaired.
    #[error("team hierarchy walk exceeded {0} levels without reaching a root")]
    CycleDetected(u32),

    /// The invitee owns an ancestor of the inviting team; accepting would
    /// let a descendant re-parent an ancestor.
    #[error("invitee owns an ancestor of the inviting team")]
    AntiHijackViolation,

    /// At most one pending invitation per (team, email) pair
    #[error("a pending invitation for this email already exists")]
    DuplicatePending,

    #[error("invitation has expired")]
    InvitationExpired,

    #[error("invitation has already been accepted or revoked")]
    InvitationAlreadyProcessed,

    #[error("invitation was issued to a different email address")]
    EmailMismatch,

    #[error("user is already a member of this team")]
    AlreadyMember,

    #[error("operation not permitted: {0}")]
    NotPermitted(&'static str),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Failure inside a collaborator adapter
    #[error("adapter failure: {0}")]
    Adapter(#[source] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TeamsError {
    /// Expected rejections are normal control flow for callers and are not
    /// logged as errors; everything else is.
    pub fn is_expected(&self) -> bool {
        !matches!(
            self,
            TeamsError::CycleDetected(_) | TeamsError::Adapter(_) | TeamsError::Internal(_)
        )
    }
}

impl From<TeamsError> for crewbase_common::Error {
    fn from(err: TeamsError) -> Self {
        match err {
            TeamsError::CycleDetected(_) => {
                crewbase_common::Error::Internal(err.to_string())
            }
            TeamsError::AntiHijackViolation
            | TeamsError::DuplicatePending
            | TeamsError::InvitationExpired
            | TeamsError::InvitationAlreadyProcessed
            | TeamsError::AlreadyMember => crewbase_common::Error::Conflict(err.to_string()),
            TeamsError::EmailMismatch | TeamsError::NotPermitted(_) => {
                crewbase_common::Error::Validation(err.to_string())
            }
            TeamsError::NotFound(what) => crewbase_common::Error::NotFound(what.to_string()),
            TeamsError::Validation(msg) => crewbase_common::Error::Validation(msg),
            TeamsError::Adapter(e) => crewbase_common::Error::Unexpected(e),
            TeamsError::Internal(msg) => crewbase_common::Error::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_rejections_are_classified() {
        assert!(TeamsError::AntiHijackViolation.is_expected());
        assert!(TeamsError::DuplicatePending.is_expected());
        assert!(TeamsError::InvitationExpired.is_expected());
        assert!(TeamsError::InvitationAlreadyProcessed.is_expected());
        assert!(TeamsError::EmailMismatch.is_expected());
        assert!(!TeamsError::CycleDetected(32).is_expected());
        assert!(!TeamsError::Internal("boom".to_string()).is_expected());
    }

    #[test]
    fn test_conversion_to_common_error() {
        let err: crewbase_common::Error = TeamsError::DuplicatePending.into();
        assert_eq!(err.error_code(), "CONFLICT");

        let err: crewbase_common::Error = TeamsError::NotFound("invitation").into();
        assert_eq!(err.error_code(), "NOT_FOUND");

        let err: crewbase_common::Error = TeamsError::CycleDetected(32).into();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");

        let err: crewbase_common::Error = TeamsError::EmailMismatch.into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_messages_are_user_distinguishable() {
        let expired = TeamsError::InvitationExpired.to_string();
        let processed = TeamsError::InvitationAlreadyProcessed.to_string();
        let hijack = TeamsError::AntiHijackViolation.to_string();
        assert_ne!(expired, processed);
        assert_ne!(expired, hijack);
        assert_ne!(processed, hijack);
    }
}
