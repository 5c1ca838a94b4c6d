//! Event capacity and waitlist registration engine.
//!
//! Join and leave run as single transactions against the shared store;
//! notifications go out through [`notify::PostCommitHooks`] once the
//! transaction has committed.

pub mod capacity;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod notify;
pub mod reminders;
pub mod store;

pub use engine::{Actor, EventUpdate, JoinOutcome, JoinRejection, LeaveOutcome, LeaveRejection, RegistrationEngine};
pub use error::RegistrationError;
pub use notify::{Notifier, PostCommitHooks};
