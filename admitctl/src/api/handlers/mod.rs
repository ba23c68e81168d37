//! Axum route handlers, one module per resource.
//!
//! Handlers authenticate through the [`crate::api::models::users::CurrentUser`]
//! extractor, check roles with [`crate::auth::permissions`], and return
//! [`crate::errors::Error`], which renders as `{"detail": ...}` with the matching
//! status code.
//!
//! - [`auth`]: Registration, login, logout and the current user
//! - [`users`]: Registration review and user listing
//! - [`students`]: Student submission and listing
//! - [`documents`]: Document upload and download
//! - [`reviews`]: Coordinator and admin decisions
//! - [`courses`]: Course incentive rules
//! - [`incentives`]: Incentive listing and payment status
//! - [`leaderboard`]: Agent rankings
//! - [`dashboard`]: Admin statistics
//! - [`signatures`]: Saved reviewer signatures
//! - [`receipts`]: PDF receipts
//! - [`exports`]: Excel export
//! - [`backups`]: Zip backups

pub mod auth;
pub mod backups;
pub mod courses;
pub mod dashboard;
pub mod documents;
pub mod exports;
pub mod incentives;
pub mod leaderboard;
pub mod receipts;
pub mod reviews;
pub mod signatures;
pub mod students;
pub mod users;
