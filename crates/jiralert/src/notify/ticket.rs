use serde::Serialize;
use sha2::{Digest, Sha256};

use super::NotifyError;
use crate::{alert::AlertBatch, config::ReceiverConfig, template::Template};

/// Ticket content rendered from a receiver's field templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub summary: String,
    pub description: String,
    pub labels: Vec<String>,
}

impl Ticket {
    pub fn render(
        receiver: &ReceiverConfig,
        template: &Template,
        batch: &AlertBatch,
    ) -> Result<Self, NotifyError> {
        let render = |field: &str, text: &str| {
            template
                .render(text, batch)
                .map_err(|e| NotifyError::Template(format!("{}: {}", field, e)))
        };

        let summary = match receiver.summary.as_deref() {
            Some(text) => render("summary", text)?,
            None => {
                return Err(NotifyError::InvalidReceiver(format!(
                    "receiver {:?} has no summary",
                    receiver.name
                )))
            }
        };
        let description = match receiver.description.as_deref() {
            Some(text) => render("description", text)?,
            None => String::new(),
        };

        let mut labels = vec![group_label(batch)];
        for text in receiver.labels.iter().flatten() {
            let label = sanitize_label(&render("labels", text.as_str())?);
            if !label.is_empty() {
                labels.push(label);
            }
        }
        if receiver.add_group_labels.unwrap_or(false) {
            labels.extend(
                batch
                    .group_labels
                    .iter()
                    .map(|(k, v)| sanitize_label(&format!("{}={}", k, v))),
            );
        }

        Ok(Ticket {
            summary: summary.trim().to_string(),
            description,
            labels,
        })
    }
}

/// Stable label identifying the alert group a ticket was filed for.
pub fn group_label(batch: &AlertBatch) -> String {
    let mut hasher = Sha256::new();
    for (key, value) in &batch.group_labels {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    format!("JIRALERT{{{:x}}}", hasher.finalize())
}

/// Tracker labels may not contain whitespace.
fn sanitize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}
