//! HTTP surface subsystem.
//!
//! # Data Flow
//! ```text
//! Presentation layer
//!     → GET /status, /status/ws       → handlers.rs / websocket.rs → BusyState
//!     → GET|PUT|DELETE /keys/{key}    → auth.rs → handlers.rs → BusyState::set_for
//!     → DELETE /keys                  → auth.rs → handlers.rs → BusyState::clear_all
//!     → ANY /api/*                    → server.rs forward → GatedClient → upstream
//! ```
//!
//! # Design Decisions
//! - Only `/api/*` traffic is counted; polling the status routes never
//!   makes the dashboard look busy
//! - Control writes are token-protected when an API key is configured

pub mod auth;
pub mod handlers;
pub mod server;
pub mod websocket;

pub use server::{AppState, HttpServer};
