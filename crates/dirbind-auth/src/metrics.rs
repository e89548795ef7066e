//! Authentication metrics
//!
//! Recorded through the `metrics` facade. The host process installs the
//! recorder and exporter; without one these calls do nothing.

use ::metrics::{counter, histogram};
use std::time::Duration;

use crate::ldap::AuthError;

/// Metric names
pub mod names {
    pub const AUTH_ATTEMPTS_TOTAL: &str = "dirbind_auth_attempts_total";
    pub const AUTH_DURATION_SECONDS: &str = "dirbind_auth_duration_seconds";
}

/// Outcome label for a finished authentication call
pub fn outcome_label<T>(result: &Result<T, AuthError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.code(),
    }
}

pub(crate) fn record_attempt<T>(result: &Result<T, AuthError>, elapsed: Duration) {
    let outcome = outcome_label(result);

    counter!(names::AUTH_ATTEMPTS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::AUTH_DURATION_SECONDS, "outcome" => outcome).record(elapsed.as_secs_f64());
}
