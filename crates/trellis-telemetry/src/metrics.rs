//! Metric recording helpers.
//!
//! Every helper goes through the `metrics` facade, so the host process
//! chooses the exporter. Without an installed recorder they do nothing.

use metrics::{counter, describe_counter};

/// Responses produced, by status code.
pub const REQUESTS_TOTAL: &str = "trellis_requests_total";

/// Errors that escaped every handler, by pipeline phase.
pub const UNHANDLED_ERRORS_TOTAL: &str = "trellis_unhandled_errors_total";

/// Finished background jobs, by kind and outcome.
pub const BACKGROUND_JOBS_TOTAL: &str = "trellis_background_jobs_total";

/// Registers descriptions for the standard metrics with the installed
/// recorder.
pub fn describe_metrics() {
    describe_counter!(REQUESTS_TOTAL, "Total number of responses produced");
    describe_counter!(
        UNHANDLED_ERRORS_TOTAL,
        "Errors not accepted by any error handler"
    );
    describe_counter!(BACKGROUND_JOBS_TOTAL, "Background jobs that finished running");
}

/// Records one response.
pub fn record_request(status: u16) {
    counter!(REQUESTS_TOTAL, "status" => status.to_string()).increment(1);
}

/// Records an unhandled error raised in `phase`.
pub fn record_unhandled_error(phase: &'static str) {
    counter!(UNHANDLED_ERRORS_TOTAL, "phase" => phase).increment(1);
}

/// Records a finished background job.
pub fn record_background_job(kind: &'static str, outcome: &'static str) {
    counter!(BACKGROUND_JOBS_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
}
