//! Tethys Server - trigger endpoint and periodic scheduler
//!
//! This crate exposes the sync engine over HTTP:
//!
//! - **Ingest**: `POST /ingest` runs one sync cycle
//! - **Health**: `GET /health` reports status and version
//!
//! The binary also recovers tasks interrupted by a crash and, when
//! `INGEST_INTERVAL` is positive, triggers sync cycles periodically.

pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::create_router;
pub use state::{AppScheduler, AppState};
