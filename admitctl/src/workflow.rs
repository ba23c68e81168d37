//! Student approval state machine.
//!
//! Two variants are supported, selected by `workflow.approval_mode`:
//!
//! ```text
//! two_tier:    pending ──approve──▶ approved
//!                 └─────reject────▶ rejected
//!
//! three_tier:  pending ──coordinator approve──▶ coordinator_approved ──admin approve──▶ approved
//!                 │                                   │
//!                 └──────────reject──────────▶ rejected ◀──admin reject──┘
//! ```
//!
//! `approved` and `rejected` are terminal. [`transition`] only decides whether a
//! move is legal; callers apply it with a compare-and-set on the current status
//! so concurrent reviewers cannot both succeed.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::api::models::students::StudentStatus;
use crate::api::models::users::Role;
use crate::errors::Error;
use crate::types::{Operation, Resource};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// A single review by a coordinator or admin decides the application
    TwoTier,
    /// Coordinator review followed by a final admin decision
    #[default]
    ThreeTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Approve => write!(f, "approve"),
            ReviewAction::Reject => write!(f, "reject"),
        }
    }
}

/// Which set of reviewer columns a transition stamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    Coordinator,
    Admin,
}

/// A legal status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: StudentStatus,
    pub to: StudentStatus,
    pub stage: ReviewStage,
}

impl Transition {
    /// Reaching `approved` records the agent's incentive
    pub fn creates_incentive(&self) -> bool {
        self.to == StudentStatus::Approved
    }

    /// Coordinator approvals carry the reviewer's signature
    pub fn is_coordinator_approval(&self) -> bool {
        self.stage == ReviewStage::Coordinator && self.to != StudentStatus::Rejected
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Student application has already been {0}")]
    AlreadyDecided(StudentStatus),

    #[error("Student must be approved by a coordinator before final approval")]
    AwaitingCoordinator,

    #[error("Student has already been approved by a coordinator and awaits admin review")]
    AwaitingAdmin,

    #[error("Only coordinators and admins can review students")]
    NotAReviewer,
}

impl From<TransitionError> for Error {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::AlreadyDecided(_) => Error::Conflict { message: err.to_string() },
            TransitionError::AwaitingCoordinator | TransitionError::AwaitingAdmin => Error::BadRequest { message: err.to_string() },
            TransitionError::NotAReviewer => Error::InsufficientPermissions {
                action: Operation::Review,
                resource: Resource::Students,
                reason: Some(err.to_string()),
            },
        }
    }
}

/// Decide the outcome of `role` applying `action` to a student in state `current`.
pub fn transition(mode: ApprovalMode, current: StudentStatus, role: Role, action: ReviewAction) -> Result<Transition, TransitionError> {
    use ReviewAction::*;
    use StudentStatus::*;

    let stage = match role {
        Role::Coordinator => ReviewStage::Coordinator,
        Role::Admin => ReviewStage::Admin,
        Role::Agent => return Err(TransitionError::NotAReviewer),
    };

    if matches!(current, Approved | Rejected) {
        return Err(TransitionError::AlreadyDecided(current));
    }

    let to = match (mode, current, stage, action) {
        (_, _, _, Reject) => Rejected,

        (ApprovalMode::TwoTier, _, _, Approve) => Approved,

        (ApprovalMode::ThreeTier, Pending, ReviewStage::Coordinator, Approve) => CoordinatorApproved,
        (ApprovalMode::ThreeTier, Pending, ReviewStage::Admin, Approve) => return Err(TransitionError::AwaitingCoordinator),
        (ApprovalMode::ThreeTier, CoordinatorApproved, ReviewStage::Admin, Approve) => Approved,
        (ApprovalMode::ThreeTier, CoordinatorApproved, ReviewStage::Coordinator, Approve) => {
            return Err(TransitionError::AwaitingAdmin);
        }
        (ApprovalMode::ThreeTier, Approved | Rejected, _, Approve) => return Err(TransitionError::AlreadyDecided(current)),
    };

    // Once a coordinator has signed off, only the admin decides
    if current == CoordinatorApproved && stage == ReviewStage::Coordinator {
        return Err(TransitionError::AwaitingAdmin);
    }

    Ok(Transition { from: current, to, stage })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApprovalMode::*;
    use ReviewAction::*;
    use StudentStatus::*;

    #[test]
    fn test_three_tier_happy_path() {
        let first = transition(ThreeTier, Pending, Role::Coordinator, Approve).unwrap();
        assert_eq!(first.to, CoordinatorApproved);
        assert_eq!(first.stage, ReviewStage::Coordinator);
        assert!(first.is_coordinator_approval());
        assert!(!first.creates_incentive());

        let second = transition(ThreeTier, CoordinatorApproved, Role::Admin, Approve).unwrap();
        assert_eq!(second.from, CoordinatorApproved);
        assert_eq!(second.to, Approved);
        assert_eq!(second.stage, ReviewStage::Admin);
        assert!(second.creates_incentive());
        assert!(!second.is_coordinator_approval());
    }

    #[test]
    fn test_three_tier_admin_cannot_skip_coordinator() {
        assert_eq!(
            transition(ThreeTier, Pending, Role::Admin, Approve),
            Err(TransitionError::AwaitingCoordinator)
        );
    }

    #[test]
    fn test_three_tier_coordinator_cannot_finalize() {
        assert_eq!(
            transition(ThreeTier, CoordinatorApproved, Role::Coordinator, Approve),
            Err(TransitionError::AwaitingAdmin)
        );
        assert_eq!(
            transition(ThreeTier, CoordinatorApproved, Role::Coordinator, Reject),
            Err(TransitionError::AwaitingAdmin)
        );
    }

    #[test]
    fn test_rejections() {
        for role in [Role::Coordinator, Role::Admin] {
            let t = transition(ThreeTier, Pending, role, Reject).unwrap();
            assert_eq!(t.to, Rejected);
            assert!(!t.creates_incentive());
            assert!(!t.is_coordinator_approval());
        }
        assert_eq!(transition(ThreeTier, CoordinatorApproved, Role::Admin, Reject).unwrap().to, Rejected);
    }

    #[test]
    fn test_two_tier_single_step() {
        for role in [Role::Coordinator, Role::Admin] {
            let t = transition(TwoTier, Pending, role, Approve).unwrap();
            assert_eq!(t.to, Approved);
            assert!(t.creates_incentive());
            assert_eq!(transition(TwoTier, Pending, role, Reject).unwrap().to, Rejected);
        }
        assert!(transition(TwoTier, Pending, Role::Coordinator, Approve).unwrap().is_coordinator_approval());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for mode in [TwoTier, ThreeTier] {
            for state in [Approved, Rejected] {
                for role in [Role::Coordinator, Role::Admin] {
                    for action in [Approve, Reject] {
                        assert_eq!(transition(mode, state, role, action), Err(TransitionError::AlreadyDecided(state)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_agents_cannot_review() {
        assert_eq!(transition(ThreeTier, Pending, Role::Agent, Approve), Err(TransitionError::NotAReviewer));
    }

    #[test]
    fn test_error_status_codes() {
        use axum::http::StatusCode;
        let conflict: Error = TransitionError::AlreadyDecided(Approved).into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.user_message(), "Student application has already been approved");

        let bad: Error = TransitionError::AwaitingCoordinator.into();
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);

        let forbidden: Error = TransitionError::NotAReviewer.into();
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
    }
}
