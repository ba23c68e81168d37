//! Database record models matching table schemas.
//!
//! Repositories accept the `*DBRequest` structs and return `*DBResponse`
//! structs. These stay separate from the API models in [`crate::api::models`],
//! which convert from them with `From`.
//!
//! - [`users`]: Accounts and registration state
//! - [`students`]: Applications and review columns
//! - [`documents`]: Uploaded document metadata
//! - [`file_storage`]: Requests to the document storage backend
//! - [`courses`]: Course incentive rules
//! - [`incentives`]: Agent incentives
//! - [`signatures`]: Saved reviewer signatures

pub mod courses;
pub mod documents;
pub mod file_storage;
pub mod incentives;
pub mod signatures;
pub mod students;
pub mod users;
