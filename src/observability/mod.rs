//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gate + busy state produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (in-flight gauge, busy gauge, operation counters)
//!
//! Consumers:
//!     → stdout log stream
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields over formatted strings
//! - Metric updates are cheap and safe to call without an installed recorder

pub mod logging;
pub mod metrics;
