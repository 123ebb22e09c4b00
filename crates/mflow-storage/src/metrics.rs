//! Storage metrics.

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Uploads by mode (single/multipart).
    pub const UPLOADS_TOTAL: &str = "mflow_storage_uploads_total";

    /// Uploaded object size in bytes.
    pub const UPLOAD_BYTES: &str = "mflow_storage_upload_bytes";

    /// Local transfer retries by operation.
    pub const TRANSFER_RETRIES_TOTAL: &str = "mflow_storage_transfer_retries_total";

    /// Availability polls by outcome.
    pub const AVAILABILITY_POLLS_TOTAL: &str = "mflow_storage_availability_polls_total";
}

pub fn record_upload(mode: &'static str, bytes: u64) {
    counter!(names::UPLOADS_TOTAL, "mode" => mode).increment(1);
    histogram!(names::UPLOAD_BYTES, "mode" => mode).record(bytes as f64);
}

pub fn record_transfer_retry(operation: &'static str) {
    counter!(names::TRANSFER_RETRIES_TOTAL, "operation" => operation).increment(1);
}

pub fn record_availability(available: bool) {
    let outcome = if available { "available" } else { "timed_out" };
    counter!(names::AVAILABILITY_POLLS_TOTAL, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::UPLOADS_TOTAL.starts_with("mflow_storage_"));
        assert!(names::TRANSFER_RETRIES_TOTAL.contains("retries"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_upload("single", 10);
        record_transfer_retry("download");
        record_availability(false);
    }
}
