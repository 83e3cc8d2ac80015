//! Complaint lifecycle and escalation engine.
//!
//! Every mutation follows the same order: the complaint write and its timeline
//! entry commit in one transaction, then notifications go out best-effort.

pub mod clock;
pub mod error;
pub mod files;
pub mod lifecycle;
pub mod notify;
pub mod report;
pub mod sweeper;
pub mod timeline;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, Result};
pub use lifecycle::Engine;
pub use notify::{LogOutbound, Notifier, Outbound};
pub use sweeper::{EscalationPolicy, Escalator};
