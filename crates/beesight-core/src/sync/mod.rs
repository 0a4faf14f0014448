//! Sync run orchestration.
//!
//! The driver reads the goal checkpoint, fetches the session feed, hands
//! both to the reconciler and posts whatever comes back.

pub mod driver;


pub use driver::{fetch_remote_state, PostFailure, SyncDriver, SyncOptions, SyncReport};
