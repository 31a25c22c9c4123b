//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod attempt_store;
mod clock;

pub use attempt_store::{AttemptStore, StoreError};
pub use clock::Clock;
