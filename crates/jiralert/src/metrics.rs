use http::StatusCode;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::Result;

/// Process-wide request counters.
///
/// Created once in `main` before the listener starts and shared by every
/// request task. Increments are atomic per label set, so unrelated receivers
/// never contend on a common lock.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let requests_total = IntCounterVec::new(
            Opts::new(
                "jiralert_requests_total",
                "Requests processed, by receiver and HTTP status code.",
            ),
            &["receiver", "code"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
        })
    }

    pub fn record_request(&self, receiver: &str, status: StatusCode) {
        self.requests_total
            .with_label_values(&[receiver, status.as_str()])
            .inc();
    }

    pub fn request_count(&self, receiver: &str, status: StatusCode) -> u64 {
        self.requests_total
            .with_label_values(&[receiver, status.as_str()])
            .get()
    }

    /// Text exposition format, for `GET /metrics`.
    pub fn gather(&self) -> Result<String> {
        let mut buffer = vec![];
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
