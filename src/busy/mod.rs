//! Busy-state broadcasting subsystem.
//!
//! # Data Flow
//! ```text
//! RequestGate (count 0 → 1, 1 → 0)
//!     → state.rs set_global(bool)
//!
//! Keyed callers ("rebalance", "createPortfolio")
//!     → state.rs set_for(key, bool) / clear_all()
//!     → guard.rs KeyGuard (scoped set_for)
//!
//! state.rs publish
//!     → subscriber callbacks (every change, in order)
//!     → watch channel (latest value, async consumers)
//! ```
//!
//! # Design Decisions
//! - One lock guards the flag, the key set and the subscriber list
//! - Publishing is deduplicated: subscribers only see real transitions
//! - The keyed path recomputes the flag from the key set alone and never
//!   consults the gate's in-flight count
//! - `clear_all` wins over pending counted operations

pub mod guard;
pub mod state;

pub use guard::KeyGuard;
pub use state::{BusyState, Subscription};
