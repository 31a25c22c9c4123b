//! # Turnstile Core
//!
//! Dual-window sliding-log admission control.
//! This crate contains the limiting algorithm and the ports it depends on;
//! storage backends and clocks live in `turnstile-infra`.

pub mod domain;
pub mod error;
pub mod limiter;
pub mod ports;

pub use domain::{AttemptLog, AttemptRecord, LogEntry, WindowLimits};
pub use error::LimiterError;
pub use limiter::{
    Admission, Forgotten, KeyStatus, Limiter, LimiterOptions, UnavailablePolicy, WindowStatus,
};
