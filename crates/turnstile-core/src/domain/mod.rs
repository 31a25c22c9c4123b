//! Domain types - the attempt log and the limits it is judged against.

mod attempt_log;
mod limits;

pub use attempt_log::{AttemptLog, AttemptRecord, LogEntry};
pub use limits::WindowLimits;
