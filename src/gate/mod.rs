//! Request gating subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound operation (future, tower request, upstream HTTP call)
//!     → operation.rs (target path + headers + flags)
//!     → policy.rs (skip? marker / quiet path / background refresh)
//!         skipped → run untouched
//!         counted → tracker.rs
//!             enter: count += 1, BusyState::set_global(true)
//!             run operation
//!             guard drop: count -= 1, at zero BusyState::set_global(false)
//!
//! layer.rs wraps any tower Service<Request<B>> in the same flow, holding
//! the count in the response body until its last frame;
//! client.rs applies it to the upstream HTTP client.
//! ```
//!
//! # Design Decisions
//! - The count lives in an explicitly constructed gate, never a global
//! - Release is tied to guard drop, not to a success callback
//! - No retries or timeouts here; callers own those

pub mod client;
pub mod layer;
pub mod operation;
pub mod policy;
pub mod tracker;

pub use client::{gated_client, GatedClient};
pub use layer::{BusyLayer, BusyService, GuardedBody};
pub use operation::{OperationId, OperationMeta};
pub use policy::SkipPolicy;
pub use tracker::{BusyGuard, RequestGate};
