//! The dual-window sliding-log limiter.
//!
//! - [`window`] judges a log against the inner (burst) and outer (aggregate) windows.
//! - [`log_update`] folds a new attempt into a log.
//! - [`Limiter`] ties both to a store and a clock.

mod facade;
pub mod log_update;
pub mod window;

pub use facade::{Admission, Forgotten, KeyStatus, Limiter, LimiterOptions, UnavailablePolicy};
pub use window::WindowStatus;
