//! Queue metrics.

use metrics::{counter, histogram};

pub mod names {
    pub const MESSAGES_SENT_TOTAL: &str = "mflow_queue_messages_sent_total";
    pub const MESSAGES_RECEIVED_TOTAL: &str = "mflow_queue_messages_received_total";
    /// Delivery count observed on receive.
    pub const DELIVERY_COUNT: &str = "mflow_queue_delivery_count";
    /// Submissions by outcome (enqueued, in_flight, send_failed).
    pub const SUBMISSIONS_TOTAL: &str = "mflow_queue_submissions_total";
}

pub fn record_sent(task_type: Option<&str>) {
    counter!(names::MESSAGES_SENT_TOTAL, "task_type" => task_type.unwrap_or("unknown").to_string())
        .increment(1);
}

pub fn record_received(delivery_count: u32) {
    counter!(names::MESSAGES_RECEIVED_TOTAL).increment(1);
    histogram!(names::DELIVERY_COUNT).record(delivery_count as f64);
}

pub fn record_submission(outcome: &'static str) {
    counter!(names::SUBMISSIONS_TOTAL, "outcome" => outcome).increment(1);
}
