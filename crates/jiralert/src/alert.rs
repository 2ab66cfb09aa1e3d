//! Alertmanager webhook payload.
//!
//! See <https://prometheus.io/docs/alerting/latest/configuration/#webhook_config>
//! for the wire format. Only `receiver` and `alerts` are required; everything
//! else defaults to empty so that trimmed-down senders are still accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type KV = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub status: AlertStatus,
    #[serde(default)]
    pub labels: KV,
    #[serde(default)]
    pub annotations: KV,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", default)]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
}

impl Alert {
    pub fn is_firing(&self) -> bool {
        self.status == AlertStatus::Firing
    }
}

/// A group of alerts delivered together for one receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBatch {
    pub receiver: String,
    #[serde(default)]
    pub status: Option<AlertStatus>,
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub group_labels: KV,
    #[serde(default)]
    pub common_labels: KV,
    #[serde(default)]
    pub common_annotations: KV,
    #[serde(rename = "externalURL", default)]
    pub external_url: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub group_key: String,
}

impl AlertBatch {
    /// Decodes a raw webhook body. Decoding is all-or-nothing.
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Returns a batch holding only the firing alerts, plus the number of
    /// alerts that were dropped.
    pub fn firing(self) -> (Self, usize) {
        let total = self.alerts.len();
        let alerts: Vec<Alert> = self.alerts.into_iter().filter(Alert::is_firing).collect();
        let dropped = total - alerts.len();
        (Self { alerts, ..self }, dropped)
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alert(status: &str, name: &str) -> serde_json::Value {
        json!({
            "status": status,
            "labels": { "alertname": name, "severity": "critical" },
            "annotations": { "summary": format!("{} is broken", name) },
            "startsAt": "2024-05-01T10:00:00Z",
            "endsAt": "0001-01-01T00:00:00Z",
            "generatorURL": "http://prometheus:9090/graph",
            "fingerprint": "abc123"
        })
    }

    #[test]
    fn test_decode_full_payload() {
        let body = json!({
            "version": "4",
            "groupKey": "{}:{alertname=\"HighLatency\"}",
            "status": "firing",
            "receiver": "team-a",
            "groupLabels": { "alertname": "HighLatency" },
            "commonLabels": { "severity": "critical" },
            "commonAnnotations": {},
            "externalURL": "http://alertmanager:9093",
            "alerts": [alert("firing", "HighLatency")]
        });

        let batch = AlertBatch::decode(body.to_string().as_bytes()).unwrap();
        assert_eq!(batch.receiver, "team-a");
        assert_eq!(batch.status, Some(AlertStatus::Firing));
        assert_eq!(batch.group_labels.get("alertname").unwrap(), "HighLatency");
        assert_eq!(batch.alerts.len(), 1);
        assert_eq!(batch.alerts[0].labels.get("severity").unwrap(), "critical");
        assert!(batch.alerts[0].starts_at.is_some());
    }

    #[test]
    fn test_decode_minimal_payload() {
        let body = br#"{"receiver": "team-a", "alerts": []}"#;
        let batch = AlertBatch::decode(body).unwrap();
        assert!(batch.group_labels.is_empty());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(AlertBatch::decode(b"").is_err());
        assert!(AlertBatch::decode(b"{not json").is_err());
        assert!(AlertBatch::decode(br#"{"alerts": []}"#).is_err());
        assert!(AlertBatch::decode(br#"{"receiver": "a", "alerts": [{"status": "pending"}]}"#).is_err());
    }

    #[test]
    fn test_firing_drops_resolved() {
        let body = json!({
            "receiver": "team-a",
            "alerts": [alert("firing", "A"), alert("resolved", "B"), alert("firing", "C")]
        });
        let batch = AlertBatch::decode(body.to_string().as_bytes()).unwrap();

        let (firing, dropped) = batch.firing();
        assert_eq!(dropped, 1);
        let names: Vec<_> = firing
            .alerts
            .iter()
            .map(|a| a.labels["alertname"].as_str())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
        assert!(firing.alerts.iter().all(Alert::is_firing));
    }

    #[test]
    fn test_firing_is_idempotent() {
        let body = json!({
            "receiver": "team-a",
            "groupLabels": { "alertname": "A" },
            "alerts": [alert("firing", "A"), alert("resolved", "B")]
        });
        let batch = AlertBatch::decode(body.to_string().as_bytes()).unwrap();

        let (once, _) = batch.firing();
        let (twice, dropped) = once.clone().firing();
        assert_eq!(dropped, 0);
        assert_eq!(once, twice);
    }
}
