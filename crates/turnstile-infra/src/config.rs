//! Limiter options loaded from environment variables.

use turnstile_core::{LimiterOptions, UnavailablePolicy};

/// Build [`LimiterOptions`] from the process environment.
///
/// Unset or unparsable variables keep their defaults:
/// - `TURNSTILE_UNAVAILABLE_POLICY` - `open` (default) or `closed`
/// - `TURNSTILE_CHECK_CREATES_RECORD` - `false`
/// - `TURNSTILE_PRUNE_EXPIRED` - `true`
/// - `TURNSTILE_MAX_WRITE_CONFLICTS` - `3`
pub fn limiter_options_from_env() -> LimiterOptions {
    limiter_options_from(|name| std::env::var(name).ok())
}

fn limiter_options_from(lookup: impl Fn(&str) -> Option<String>) -> LimiterOptions {
    let defaults = LimiterOptions::default();

    let unavailable_policy = match lookup("TURNSTILE_UNAVAILABLE_POLICY")
        .map(|v| v.to_lowercase())
        .as_deref()
    {
        Some("closed") | Some("fail-closed") => UnavailablePolicy::FailClosed,
        Some("open") | Some("fail-open") => UnavailablePolicy::FailOpen,
        Some(other) => {
            tracing::warn!(value = %other, "Unknown TURNSTILE_UNAVAILABLE_POLICY, failing open");
            UnavailablePolicy::FailOpen
        }
        None => defaults.unavailable_policy,
    };

    LimiterOptions {
        unavailable_policy,
        check_creates_record: lookup("TURNSTILE_CHECK_CREATES_RECORD")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.check_creates_record),
        prune_expired: lookup("TURNSTILE_PRUNE_EXPIRED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(defaults.prune_expired),
        max_write_conflicts: lookup("TURNSTILE_MAX_WRITE_CONFLICTS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_write_conflicts),
    }
}
