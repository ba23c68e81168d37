//! API request and response data models.
//!
//! These define the public JSON contract and are annotated with `utoipa` for the
//! generated OpenAPI document. Database records live separately in
//! [`crate::db::models`] and convert into these with `From`.
//!
//! - [`auth`]: Registration and login payloads
//! - [`users`]: Roles, account status and the authenticated user
//! - [`students`]: Applications, statuses and review forms
//! - [`documents`]: Uploaded document metadata
//! - [`courses`]: Course incentive rules
//! - [`incentives`]: Agent incentives and totals
//! - [`leaderboard`]: Rankings
//! - [`dashboard`]: Admin statistics
//! - [`signatures`]: Reviewer signatures
//! - [`backups`]: Backup listings and export filters
//! - [`pagination`]: Shared `skip`/`limit` parameters

pub mod auth;
pub mod backups;
pub mod courses;
pub mod dashboard;
pub mod documents;
pub mod incentives;
pub mod leaderboard;
pub mod pagination;
pub mod signatures;
pub mod students;
pub mod users;
