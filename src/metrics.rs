use log::info;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

/// Failure reason tags for [`Metric::Failure`]
pub mod reason {
    /// The server answered with an error reply
    pub const RESPOND: &str = "respond";
    /// The endpoint could not be (re)established
    pub const CONNECT: &str = "connect";
    /// A multi-key command spanned several cluster slots and was dropped
    pub const CROSS_SLOT: &str = "cross-slot";
}

/// One observable endpoint event.
///
/// Endpoint labels are the sanitized `host_port` form (dots and colons
/// replaced), so they can be used verbatim as time-series identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Metric {
    /// Commands flushed to the socket, with the latency from the first
    /// buffered command to the flush
    Send { count: u64, latency: Duration },
    /// Non-error replies drained
    Success { count: u64 },
    /// Error replies or endpoint-level faults, tagged by reason
    Failure { reason: &'static str, count: u64 },
    /// Supervisor-triggered reopen
    Reconnect,
}

/// Pluggable sink for endpoint counters.
///
/// Sinks accept concurrent additive updates; implementations must be
/// cheap enough to sit on the migration hot path.
pub trait MetricsSink: Send + Sync {
    fn record(&self, endpoint: &str, metric: Metric);
}

/// Discards every metric.
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record(&self, _endpoint: &str, _metric: Metric) {}
}

/// Emits every metric to the logging facade, for an external scraper
/// (the InfluxDB relay) to pick up.
pub struct LogSink;

impl MetricsSink for LogSink {
    fn record(&self, endpoint: &str, metric: Metric) {
        match metric {
            Metric::Send { count, latency } => {
                info!(target: "rdbferry::metrics", "ENDPOINT_SEND,endpoint={endpoint} count={count} latency_us={}", latency.as_micros())
            }
            Metric::Success { count } => {
                info!(target: "rdbferry::metrics", "ENDPOINT_SUCCESS,endpoint={endpoint} count={count}")
            }
            Metric::Failure { reason, count } => {
                info!(target: "rdbferry::metrics", "ENDPOINT_FAILURE,endpoint={endpoint},reason={reason} count={count}")
            }
            Metric::Reconnect => {
                info!(target: "rdbferry::metrics", "ENDPOINT_RECONNECT,endpoint={endpoint} count=1")
            }
        }
    }
}

/// Per-endpoint counter totals kept by [`CounterSink`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub send: u64,
    pub success: u64,
    pub failure: u64,
    pub failure_reasons: HashMap<&'static str, u64>,
    pub reconnect: u64,
}

/// Aggregates counters in memory, keyed by endpoint label.
#[derive(Default)]
pub struct CounterSink {
    counters: Mutex<HashMap<String, Counters>>,
}

impl CounterSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals for one endpoint label, zeroes if the endpoint never reported.
    pub fn snapshot(&self, endpoint: &str) -> Counters {
        self.counters
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or_default()
    }

    /// Totals summed over every endpoint.
    pub fn total(&self) -> Counters {
        let counters = self.counters.lock().unwrap();
        let mut total = Counters::default();
        for c in counters.values() {
            total.send += c.send;
            total.success += c.success;
            total.failure += c.failure;
            total.reconnect += c.reconnect;
            for (reason, count) in &c.failure_reasons {
                *total.failure_reasons.entry(reason).or_default() += count;
            }
        }
        total
    }
}

impl MetricsSink for CounterSink {
    fn record(&self, endpoint: &str, metric: Metric) {
        let mut counters = self.counters.lock().unwrap();
        let counters = counters.entry(endpoint.to_owned()).or_default();
        match metric {
            Metric::Send { count, .. } => counters.send += count,
            Metric::Success { count } => counters.success += count,
            Metric::Failure { reason, count } => {
                counters.failure += count;
                *counters.failure_reasons.entry(reason).or_default() += count;
            }
            Metric::Reconnect => counters.reconnect += 1,
        }
    }
}

/// `host:port` with dots and colons sanitized, the form the counters are
/// tagged with.
pub fn endpoint_label(host: &str, port: u16) -> String {
    let mut label = String::with_capacity(host.len() + 6);
    for c in host.chars() {
        match c {
            '.' | ':' => label.push('_'),
            _ => label.push(c),
        }
    }
    label.push('_');
    label.push_str(itoa::Buffer::new().format(port));
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_sanitized() {
        assert_eq!("127_0_0_1_6379", endpoint_label("127.0.0.1", 6379));
        assert_eq!("__1_6380", endpoint_label("::1", 6380));
    }

    #[test]
    fn counter_sink_totals() {
        let sink = CounterSink::new();
        sink.record(
            "t_6379",
            Metric::Send {
                count: 3,
                latency: Duration::from_micros(10),
            },
        );
        sink.record("t_6379", Metric::Success { count: 2 });
        sink.record(
            "t_6379",
            Metric::Failure {
                reason: reason::RESPOND,
                count: 1,
            },
        );
        sink.record("t_6379", Metric::Reconnect);

        let counters = sink.snapshot("t_6379");
        assert_eq!(3, counters.send);
        assert_eq!(2, counters.success);
        assert_eq!(1, counters.failure);
        assert_eq!(Some(&1), counters.failure_reasons.get(reason::RESPOND));
        assert_eq!(1, counters.reconnect);

        assert_eq!(Counters::default(), sink.snapshot("unknown"));
    }
}
