//! HTTP API: SSE streaming, notification dispatch, job trigger, listings

pub mod server;

pub use server::{ApiServer, AppState};
