//! Request-tracking busy-state coordinator.
//!
//! A [`RequestGate`] counts in-flight operations and drives a shared
//! [`BusyState`], which also tracks named long-running operations and
//! fans every change out to subscribers (spinners, websocket clients).

pub mod busy;
pub mod config;
pub mod coordinator;
pub mod gate;
pub mod http;
pub mod observability;

pub use busy::{BusyState, KeyGuard, Subscription};
pub use config::AppConfig;
pub use coordinator::{BusyCoordinator, BusySnapshot};
pub use gate::{BusyGuard, BusyLayer, OperationMeta, RequestGate, SkipPolicy};
pub use http::HttpServer;
