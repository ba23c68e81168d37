//! HTTP API: route handlers, request/response models and the form extractor.
//!
//! Everything is mounted under `/api`:
//!
//! - **Authentication** (`/register`, `/login`, `/logout`, `/me`)
//! - **Students** (`/students/*`): submission, listing, documents, receipts, review
//! - **Incentives and leaderboards** (`/incentives`, `/incentive-rules`, `/leaderboard/*`)
//! - **Administration** (`/admin/*`): registrations, final approval, courses,
//!   incentive payment, dashboard, signatures, backups and exports
//!
//! OpenAPI documentation is served at `/api/docs`.

pub mod form;
pub mod handlers;
pub mod models;
