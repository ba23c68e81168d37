//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` and implements the
//! [`Repository`] trait for its table, plus whatever queries the handlers need
//! beyond CRUD.
//!
//! # Available Repositories
//!
//! - [`Users`]: Accounts, registration review and bootstrap admin
//! - [`Students`]: Applications, filters and the approval compare-and-set
//! - [`Documents`]: Uploaded document metadata
//! - [`CourseRules`]: Per-course incentive amounts
//! - [`Incentives`]: Agent payouts for approved students
//! - [`Signatures`]: Saved reviewer signatures (not a [`Repository`])
//! - [`analytics`]: Dashboard and leaderboard aggregates
//! - [`file_storage`]: Document bytes on disk
//!
//! # Common Pattern
//!
//! ```ignore
//! use admitctl::db::handlers::{Repository, Students};
//!
//! let mut conn = pool.acquire().await?;
//! let student = Students::new(&mut conn).get_by_id(id).await?;
//! ```

pub mod analytics;
pub mod courses;
pub mod documents;
pub mod file_storage;
pub mod incentives;
pub mod repository;
pub mod signatures;
pub mod students;
pub mod users;

pub use courses::CourseRules;
pub use documents::Documents;
pub use incentives::Incentives;
pub use repository::Repository;
pub use signatures::Signatures;
pub use students::Students;
pub use users::Users;
