/// Time source for window arithmetic.
///
/// Must be non-decreasing across calls.
pub trait Clock: Send + Sync {
    /// Current time in whole seconds since the Unix epoch.
    fn now(&self) -> i64;
}
