//! Tenant lifecycle state machine.
//!
//! ```text
//! active     -> {suspended, migrating}
//! suspended  -> {active, archived}
//! migrating  -> {active, suspended}
//! archived   -> {deleted}
//! deleted    -> {}               (terminal)
//! ```
//!
//! The table is pure; serialization of transitions per tenant is the
//! lifecycle manager's job (`tessera-control`).

use crate::error::{TesseraError, TesseraResult};
use crate::models::tenant::TenantStatus;

/// The statuses reachable from `from` in one transition.
pub fn valid_transitions(from: TenantStatus) -> &'static [TenantStatus] {
    match from {
        TenantStatus::Active => &[TenantStatus::Suspended, TenantStatus::Migrating],
        TenantStatus::Suspended => &[TenantStatus::Active, TenantStatus::Archived],
        TenantStatus::Migrating => &[TenantStatus::Active, TenantStatus::Suspended],
        TenantStatus::Archived => &[TenantStatus::Deleted],
        TenantStatus::Deleted => &[],
    }
}

pub fn can_transition(from: TenantStatus, to: TenantStatus) -> bool {
    valid_transitions(from).contains(&to)
}

/// Fail with `InvalidTransition` unless `from -> to` is legal.
pub fn check_transition(from: TenantStatus, to: TenantStatus) -> TesseraResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TesseraError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TenantStatus::*;

    #[test]
    fn legal_transitions() {
        assert!(can_transition(Active, Suspended));
        assert!(can_transition(Active, Migrating));
        assert!(can_transition(Suspended, Active));
        assert!(can_transition(Suspended, Archived));
        assert!(can_transition(Migrating, Active));
        assert!(can_transition(Migrating, Suspended));
        assert!(can_transition(Archived, Deleted));
    }

    #[test]
    fn illegal_transitions() {
        assert!(!can_transition(Active, Deleted));
        assert!(!can_transition(Active, Archived));
        assert!(!can_transition(Suspended, Deleted));
        assert!(!can_transition(Suspended, Migrating));
        assert!(!can_transition(Archived, Active));
        assert!(!can_transition(Migrating, Archived));
    }

    #[test]
    fn deleted_is_terminal() {
        assert!(valid_transitions(Deleted).is_empty());
        for to in [Active, Suspended, Migrating, Archived, Deleted] {
            assert!(!can_transition(Deleted, to));
        }
    }

    #[test]
    fn self_transitions_rejected() {
        for s in [Active, Suspended, Migrating, Archived, Deleted] {
            assert!(!can_transition(s, s));
        }
    }

    #[test]
    fn check_transition_error_carries_endpoints() {
        let err = check_transition(Suspended, Deleted).unwrap_err();
        match err {
            TesseraError::InvalidTransition { from, to } => {
                assert_eq!(from, Suspended);
                assert_eq!(to, Deleted);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }
}
