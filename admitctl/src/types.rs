//! Common type definitions and access-control vocabulary.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: User account identifier (agents, coordinators and admins)
//! - [`StudentId`]: Student application identifier
//! - [`CourseRuleId`]: Course incentive rule identifier
//! - [`IncentiveId`]: Incentive record identifier
//!
//! # Access Control
//!
//! Permission failures are reported in terms of an [`Operation`] applied to a
//! [`Resource`], e.g. "Insufficient permissions to Update students".
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type StudentId = Uuid;
pub type CourseRuleId = Uuid;
pub type IncentiveId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

// Operations that can be performed on resources
// *-All means unrestricted access, *-Own means restricted to own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateAll,
    CreateOwn,
    ReadAll,
    ReadOwn,
    UpdateAll,
    UpdateOwn,
    DeleteAll,
    // Approval workflow actions
    Review,
    FinalReview,
}

// Resources that can be operated on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Students,
    Documents,
    Courses,
    Incentives,
    Signatures,
    Backups,
    Exports,
    Receipts,
    Dashboard,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::CreateAll | Operation::CreateOwn => write!(f, "Create"),
            Operation::ReadAll | Operation::ReadOwn => write!(f, "Read"),
            Operation::UpdateAll | Operation::UpdateOwn => write!(f, "Update"),
            Operation::DeleteAll => write!(f, "Delete"),
            Operation::Review => write!(f, "Review"),
            Operation::FinalReview => write!(f, "Finalize"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Users => "users",
            Resource::Students => "students",
            Resource::Documents => "documents",
            Resource::Courses => "courses",
            Resource::Incentives => "incentives",
            Resource::Signatures => "signatures",
            Resource::Backups => "backups",
            Resource::Exports => "exports",
            Resource::Receipts => "receipts",
            Resource::Dashboard => "dashboard",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }

    #[test]
    fn test_operation_display_collapses_scope() {
        assert_eq!(Operation::ReadAll.to_string(), "Read");
        assert_eq!(Operation::ReadOwn.to_string(), "Read");
        assert_eq!(Operation::FinalReview.to_string(), "Finalize");
        assert_eq!(Resource::Students.to_string(), "students");
    }
}
