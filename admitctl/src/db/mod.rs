//! Database layer for data persistence and access.
//!
//! Built on SQLx with PostgreSQL, following the repository pattern:
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries and mutations)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations, analytics queries and document storage
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Repositories borrow a connection, so they work the same on a pooled
//! connection or inside a transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let student = Students::new(&mut tx).update(id, &request).await?;
//! Incentives::new(&mut tx).create(&incentive).await?;
//! tx.commit().await?;
//! ```
//!
//! Read-only paths acquire a plain connection instead.
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and run on startup via [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
