//! Authentication and authorization.
//!
//! Clients sign in through `/api/login` and receive a bearer JWT. Every
//! authenticated request carries it in `Authorization: Bearer <token>`; the
//! [`CurrentUser`](crate::api::models::users::CurrentUser) extractor verifies
//! the token and reloads the account so deactivated users lose access at once.
//!
//! # Modules
//!
//! - [`current_user`]: Extractor resolving the caller from the bearer token
//! - [`password`]: Password hashing and verification using Argon2
//! - [`permissions`]: Role checks used by handlers
//! - [`session`]: JWT creation and verification
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use admitctl::api::models::users::CurrentUser;
//! use admitctl::auth::permissions;
//!
//! async fn admin_only(current_user: CurrentUser) -> Result<String, Error> {
//!     permissions::require_admin(&current_user, Resource::Dashboard)?;
//!     Ok(format!("Hello, {}!", current_user.username))
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod session;
