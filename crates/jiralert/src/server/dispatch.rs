//! The per-request pipeline: decode, route, filter, notify, respond.
//!
//! Each stage returns a `Result` the orchestrator inspects before advancing;
//! the first failure skips the remaining stages. Every request, successful or
//! not, ends in exactly one [`ResponseEnvelope`] and one metrics increment.

use axum::{body::Bytes, extract::rejection::BytesRejection};
use http::StatusCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::{
    alert::{AlertBatch, KV},
    config::Config,
    metrics::Metrics,
    notify::{NotifierGateway, NotifyError, Outcome},
    UNKNOWN_RECEIVER,
};

use super::response::ResponseEnvelope;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
    #[error("receiver missing: {0}")]
    ReceiverNotFound(String),
    #[error("{cause}")]
    Notify { retryable: bool, cause: NotifyError },
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::Body(_) | DispatchError::Decode(_) => StatusCode::BAD_REQUEST,
            DispatchError::ReceiverNotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Notify { retryable: true, .. } => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Notify { retryable: false, .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// What is known about the request so far, for diagnostics and metrics.
struct RequestContext {
    receiver: String,
    group_labels: KV,
}

pub struct Dispatcher {
    config: Arc<Config>,
    gateway: Arc<dyn NotifierGateway>,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>, gateway: Arc<dyn NotifierGateway>, metrics: Metrics) -> Self {
        Self {
            config,
            gateway,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn handle(&self, body: Result<Bytes, BytesRejection>) -> ResponseEnvelope {
        let mut ctx = RequestContext {
            receiver: UNKNOWN_RECEIVER.to_string(),
            group_labels: KV::new(),
        };

        let result = match body {
            Ok(body) => self.run(&body, &mut ctx).await,
            Err(rejection) => Err(DispatchError::Body(rejection.body_text())),
        };

        let envelope = match result {
            Ok(()) => ResponseEnvelope::ok(),
            Err(err) => {
                let status = err.status();
                error!(
                    status_code = status.as_u16(),
                    status_text = status.canonical_reason().unwrap_or_default(),
                    err = %err,
                    receiver = %ctx.receiver,
                    group_labels = ?ctx.group_labels,
                    "error handling request"
                );
                ResponseEnvelope::error(status, err.to_string())
            }
        };

        self.metrics
            .record_request(&ctx.receiver, envelope.status_code());
        envelope
    }

    async fn run(&self, body: &[u8], ctx: &mut RequestContext) -> Result<(), DispatchError> {
        let batch = AlertBatch::decode(body)?;
        ctx.group_labels = batch.group_labels.clone();

        let receiver = self
            .config
            .receiver_by_name(&batch.receiver)
            .ok_or_else(|| DispatchError::ReceiverNotFound(batch.receiver.clone()))?;
        ctx.receiver = receiver.name.clone();
        debug!(receiver = %receiver.name, "matched receiver");

        let (batch, dropped) = batch.firing();
        if dropped > 0 {
            warn!(
                receiver = %receiver.name,
                dropped,
                "receiver should have \"send_resolved: false\" set in Alertmanager config"
            );
        }
        if batch.is_empty() {
            debug!(receiver = %receiver.name, "no firing alerts, nothing to notify");
            return Ok(());
        }

        match self.gateway.notify(receiver, &batch).await {
            Outcome::Success => Ok(()),
            Outcome::Failure { retryable, cause } => Err(DispatchError::Notify { retryable, cause }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReceiverConfig;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    /// Records every batch it is handed and answers with a canned outcome.
    struct RecordingGateway {
        calls: Mutex<Vec<AlertBatch>>,
        fail_with: Option<fn() -> NotifyError>,
    }

    impl RecordingGateway {
        fn new(fail_with: Option<fn() -> NotifyError>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail_with,
            })
        }

        fn calls(&self) -> Vec<AlertBatch> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotifierGateway for RecordingGateway {
        async fn notify(&self, _receiver: &ReceiverConfig, batch: &AlertBatch) -> Outcome {
            self.calls.lock().unwrap().push(batch.clone());
            match self.fail_with {
                Some(err) => Outcome::failed(err()),
                None => Outcome::Success,
            }
        }
    }

    fn dispatcher(gateway: Arc<RecordingGateway>) -> Dispatcher {
        let config = Config::from_yaml(
            r#"
receivers:
  - name: team-a
    type: stdout
    summary: '{{ groupLabels.alertname }}'
"#,
        )
        .unwrap();
        Dispatcher::new(Arc::new(config), gateway, Metrics::new().unwrap())
    }

    fn body(receiver: &str, statuses: &[&str]) -> Result<Bytes, BytesRejection> {
        let alerts: Vec<_> = statuses
            .iter()
            .map(|s| json!({ "status": s, "labels": { "alertname": "DiskFull" }, "annotations": {} }))
            .collect();
        let payload = json!({
            "receiver": receiver,
            "groupLabels": { "alertname": "DiskFull" },
            "alerts": alerts
        });
        Ok(Bytes::from(payload.to_string()))
    }

    #[tokio::test]
    async fn test_firing_alert_is_delivered() {
        let gateway = RecordingGateway::new(None);
        let dispatcher = dispatcher(gateway.clone());

        let envelope = dispatcher.handle(body("team-a", &["firing"])).await;

        assert_eq!(envelope, ResponseEnvelope::ok());
        assert_eq!(gateway.calls().len(), 1);
        assert_eq!(gateway.calls()[0].alerts.len(), 1);
        assert_eq!(dispatcher.metrics().request_count("team-a", StatusCode::OK), 1);
    }

    #[tokio::test]
    async fn test_resolved_alerts_are_dropped() {
        let gateway = RecordingGateway::new(None);
        let dispatcher = dispatcher(gateway.clone());

        let envelope = dispatcher.handle(body("team-a", &["firing", "resolved"])).await;

        assert_eq!(envelope.status, 200);
        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].alerts.len(), 1);
        assert!(calls[0].alerts[0].is_firing());
    }

    #[tokio::test]
    async fn test_all_resolved_skips_gateway() {
        let gateway = RecordingGateway::new(None);
        let dispatcher = dispatcher(gateway.clone());

        let envelope = dispatcher.handle(body("team-a", &["resolved", "resolved"])).await;
        assert_eq!(envelope, ResponseEnvelope::ok());

        let envelope = dispatcher.handle(body("team-a", &[])).await;
        assert_eq!(envelope, ResponseEnvelope::ok());

        assert!(gateway.calls().is_empty());
        assert_eq!(dispatcher.metrics().request_count("team-a", StatusCode::OK), 2);
    }

    #[tokio::test]
    async fn test_unknown_receiver() {
        let gateway = RecordingGateway::new(None);
        let dispatcher = dispatcher(gateway.clone());

        let envelope = dispatcher.handle(body("ghost-team", &["firing"])).await;

        assert_eq!(
            envelope,
            ResponseEnvelope::error(StatusCode::NOT_FOUND, "receiver missing: ghost-team")
        );
        assert!(gateway.calls().is_empty());
        assert_eq!(
            dispatcher.metrics().request_count(UNKNOWN_RECEIVER, StatusCode::NOT_FOUND),
            1
        );
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let gateway = RecordingGateway::new(None);
        let dispatcher = dispatcher(gateway.clone());

        for raw in ["", "{", "[]", r#"{"receiver": "team-a"}"#] {
            let envelope = dispatcher.handle(Ok(Bytes::from(raw))).await;
            assert_eq!(envelope.status, 400, "body {:?}", raw);
            assert!(envelope.error);
        }
        assert!(gateway.calls().is_empty());
        assert_eq!(
            dispatcher.metrics().request_count(UNKNOWN_RECEIVER, StatusCode::BAD_REQUEST),
            4
        );
    }

    #[tokio::test]
    async fn test_transient_failure_is_503() {
        let gateway =
            RecordingGateway::new(Some(|| NotifyError::Unreachable("connection refused".into())));
        let dispatcher = dispatcher(gateway.clone());

        let envelope = dispatcher.handle(body("team-a", &["firing"])).await;

        assert_eq!(envelope.status, 503);
        assert!(envelope.error);
        assert!(envelope.message.contains("connection refused"));
        assert_eq!(
            dispatcher.metrics().request_count("team-a", StatusCode::SERVICE_UNAVAILABLE),
            1
        );
    }

    #[tokio::test]
    async fn test_permanent_failure_is_500() {
        let gateway = RecordingGateway::new(Some(|| NotifyError::Rejected {
            status: 400,
            message: "project is required".into(),
        }));
        let dispatcher = dispatcher(gateway.clone());

        let envelope = dispatcher.handle(body("team-a", &["firing"])).await;

        assert_eq!(envelope.status, 500);
        assert_eq!(
            dispatcher.metrics().request_count("team-a", StatusCode::INTERNAL_SERVER_ERROR),
            1
        );
    }

    fn count_lines(lines: &[&str], needle: &str) -> usize {
        lines.iter().filter(|line| line.contains(needle)).count()
    }

    #[tokio::test]
    #[traced_test]
    async fn test_resolved_alerts_warn_once() {
        let dispatcher = dispatcher(RecordingGateway::new(None));

        dispatcher.handle(body("team-a", &["firing", "resolved"])).await;

        assert!(logs_contain("send_resolved"));
        logs_assert(|lines: &[&str]| match count_lines(lines, "send_resolved") {
            1 => Ok(()),
            n => Err(format!("expected one warning, got {}", n)),
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn test_all_resolved_warns_once() {
        let gateway = RecordingGateway::new(None);
        let dispatcher = dispatcher(gateway.clone());

        dispatcher
            .handle(body("team-a", &["resolved", "resolved", "resolved"]))
            .await;

        assert!(gateway.calls().is_empty());
        logs_assert(|lines: &[&str]| match count_lines(lines, "send_resolved") {
            1 => Ok(()),
            n => Err(format!("expected one warning, got {}", n)),
        });
        assert!(!logs_contain("error handling request"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_firing_only_does_not_warn() {
        let dispatcher = dispatcher(RecordingGateway::new(None));

        dispatcher.handle(body("team-a", &["firing"])).await;

        assert!(!logs_contain("send_resolved"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unknown_receiver_is_logged() {
        let dispatcher = dispatcher(RecordingGateway::new(None));

        dispatcher.handle(body("ghost-team", &["firing"])).await;

        assert!(logs_contain("error handling request"));
        assert!(logs_contain("status_code=404"));
        assert!(logs_contain("receiver=<unknown>"));
        assert!(logs_contain("receiver missing: ghost-team"));
        assert!(logs_contain("group_labels={\"alertname\": \"DiskFull\"}"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_malformed_body_is_logged() {
        let dispatcher = dispatcher(RecordingGateway::new(None));

        dispatcher.handle(Ok(Bytes::from("{not json"))).await;

        assert!(logs_contain("error handling request"));
        assert!(logs_contain("status_code=400"));
        assert!(logs_contain("receiver=<unknown>"));
        assert!(logs_contain("group_labels={}"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_delivery_failure_is_logged() {
        let dispatcher = dispatcher(RecordingGateway::new(Some(|| NotifyError::Rejected {
            status: 503,
            message: "maintenance".into(),
        })));

        dispatcher.handle(body("team-a", &["firing"])).await;

        assert!(logs_contain("status_code=503"));
        assert!(logs_contain("receiver=team-a"));
        assert!(logs_contain("maintenance"));
    }

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (DispatchError::Body("too large".into()), 400),
            (DispatchError::ReceiverNotFound("x".into()), 404),
            (
                DispatchError::Notify {
                    retryable: true,
                    cause: NotifyError::Timeout(std::time::Duration::from_secs(1)),
                },
                503,
            ),
            (
                DispatchError::Notify {
                    retryable: false,
                    cause: NotifyError::Template("bad".into()),
                },
                500,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status().as_u16(), status, "{}", err);
        }
    }
}
