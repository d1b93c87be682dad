//! HTTP trigger surface.
//!
//! Lets a cron job or an operator kick the engine over HTTP and read back
//! threads.
//!
//! # Endpoints
//!
//! - `GET  /health`             — Liveness probe
//! - `POST /api/simulate/post`  — Force a post cycle
//! - `POST /api/simulate/vote`  — Force a vote cycle
//! - `GET  /api/simulate/pulse` — Cron tick (requires `CRON_SECRET`)
//! - `GET  /api/posts/:id`      — Post with comment tree

pub mod routes;

pub use routes::{app_router, status_for, AppState};
