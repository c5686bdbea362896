//! Request counters.
//!
//! Recorded through the `metrics` facade; the embedding server decides which
//! exporter (if any) receives them.

use metrics::{counter, histogram};

use ows_common::ServiceKind;

use crate::pipeline::ResponseStatus;

/// Record the outcome of one request.
pub fn record_request(service: ServiceKind, layer: &str, status: ResponseStatus) {
    let service = service.as_str();
    counter!("ows_requests_total", "service" => service).increment(1);
    match status {
        ResponseStatus::Admitted => {}
        ResponseStatus::Degraded => {
            counter!("ows_requests_degraded_total", "service" => service, "layer" => layer.to_string())
                .increment(1);
        }
        ResponseStatus::Rejected => {
            counter!("ows_requests_rejected_total", "service" => service, "layer" => layer.to_string())
                .increment(1);
        }
    }
}

/// Record how long style evaluation took.
pub fn record_evaluation_time(style: &str, elapsed_ms: f64) {
    histogram!("ows_evaluation_duration_ms", "style" => style.to_string()).record(elapsed_ms);
}
