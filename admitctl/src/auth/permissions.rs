//! Role checks shared by the handlers.
//!
//! | Role        | Students          | Reviews            | Admin console |
//! |-------------|-------------------|--------------------|---------------|
//! | agent       | create, own only  | -                  | -             |
//! | coordinator | read all          | first tier         | signature     |
//! | admin       | read all          | first and final    | everything    |

use crate::api::models::users::CurrentUser;
use crate::db::models::students::StudentDBResponse;
use crate::errors::{Error, Result};
use crate::types::{Operation, Resource};

fn denied(action: Operation, resource: Resource, reason: &str) -> Error {
    Error::InsufficientPermissions {
        action,
        resource,
        reason: Some(reason.to_string()),
    }
}

pub fn require_admin(user: &CurrentUser, resource: Resource) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(denied(Operation::UpdateAll, resource, "Admin access required"))
    }
}

/// Coordinators and admins
pub fn require_reviewer(user: &CurrentUser, resource: Resource) -> Result<()> {
    if user.is_reviewer() {
        Ok(())
    } else {
        Err(denied(Operation::Review, resource, "Coordinator or admin access required"))
    }
}

pub fn require_agent(user: &CurrentUser, resource: Resource) -> Result<()> {
    if user.is_agent() {
        Ok(())
    } else {
        Err(denied(Operation::CreateOwn, resource, "Only agents can submit students"))
    }
}

/// Agents only see their own submissions; reviewers see everything
pub fn ensure_student_access(user: &CurrentUser, student: &StudentDBResponse) -> Result<()> {
    if user.is_agent() && student.agent_id != user.id {
        return Err(denied(Operation::ReadOwn, Resource::Students, "Access denied"));
    }
    Ok(())
}
