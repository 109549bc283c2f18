use metrics::{counter, Counter};
use once_cell::sync::Lazy;

use crate::middleware::{Direction, Severity};

pub struct TrafficMetrics {
    pub inbound_ignored_total: Counter,
    pub outbound_ignored_total: Counter,
}

pub static TRAFFIC_METRICS: Lazy<TrafficMetrics> = Lazy::new(|| TrafficMetrics {
    inbound_ignored_total: counter!("http_log_ignored_total", "direction" => "inbound"),
    outbound_ignored_total: counter!("http_log_ignored_total", "direction" => "outbound"),
});

pub fn record_emitted(direction: Direction, severity: Severity) {
    counter!(
        "http_log_records_total",
        "direction" => direction.as_str(),
        "severity" => severity.as_str()
    )
    .increment(1);
}

pub fn record_ignored(direction: Direction) {
    match direction {
        Direction::Inbound => TRAFFIC_METRICS.inbound_ignored_total.increment(1),
        Direction::Outbound => TRAFFIC_METRICS.outbound_ignored_total.increment(1),
    }
}
