//! Murmur Serve - sentiment dashboard and JSON API.
//!
//! A background task re-aggregates the trailing window of the record store
//! on a fixed interval and publishes a [`DashboardSnapshot`](murmur_core::DashboardSnapshot).
//! Dashboard handlers only read the latest snapshot, so page loads never
//! touch the database. `/api/v1/status` is the one route that queries it.
//!
//! # Authentication
//!
//! `/api/v1/*` requires a Bearer token when `MURMUR_API_TOKENS` is set.
//! The HTML dashboard and `/health` are always public.
//!
//! # Architecture
//!
//! - **AppState**: Shared state (store handle, configuration, latest snapshot)
//! - **Refresh**: Interval task that queries the store and swaps the snapshot
//! - **Auth**: Optional Bearer token middleware
//! - **Routes**: JSON endpoints and the rendered dashboard page

mod auth;
mod error;
pub mod refresh;
mod routes;
mod state;

pub use self::auth::require_auth;
pub use self::error::ApiError;
pub use self::refresh::{refresh_once, spawn_refresh_task};
pub use self::routes::router;
pub use self::state::{AppState, Config};
