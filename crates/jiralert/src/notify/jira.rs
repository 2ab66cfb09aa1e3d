//! Jira REST v2 issue creation.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::info;
use url::Url;

use super::{NotifyError, Ticket};
use crate::config::{ReceiverConfig, Secret};

const ISSUE_PATH: &str = "rest/api/2/issue";

#[derive(Debug)]
pub struct JiraNotifier {
    receiver: String,
    issue_url: Url,
    user: Option<String>,
    password: Option<Secret>,
    project: String,
    issue_type: String,
    priority: Option<String>,
    components: Vec<String>,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
struct CreatedIssue {
    #[serde(default)]
    key: String,
}

/// Error body returned by Jira on 4xx/5xx.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraErrors {
    #[serde(default)]
    error_messages: Vec<String>,
    #[serde(default)]
    errors: Map<String, Value>,
}

impl JiraNotifier {
    pub fn new(receiver: &ReceiverConfig, client: reqwest::Client) -> Result<Self, NotifyError> {
        let required = |field: &str, value: &Option<String>| {
            value.clone().ok_or_else(|| {
                NotifyError::InvalidReceiver(format!(
                    "receiver {:?} has no {}",
                    receiver.name, field
                ))
            })
        };

        let api_url = required("api_url", &receiver.api_url)?;
        if receiver.timeout == Some(0) {
            return Err(NotifyError::InvalidReceiver(format!(
                "receiver {:?} has a zero timeout",
                receiver.name
            )));
        }
        Ok(Self {
            receiver: receiver.name.clone(),
            issue_url: issue_url(&api_url)?,
            user: receiver.user.clone(),
            password: receiver.password.clone(),
            project: required("project", &receiver.project)?,
            issue_type: required("issue_type", &receiver.issue_type)?,
            priority: receiver.priority.clone(),
            components: receiver.components.clone().unwrap_or_default(),
            timeout: receiver.timeout(),
            client,
        })
    }

    /// Creates one issue for `ticket`, bounded by the receiver's timeout.
    pub async fn deliver(&self, ticket: &Ticket) -> Result<(), NotifyError> {
        let key = tokio::time::timeout(self.timeout, self.create_issue(ticket))
            .await
            .map_err(|_| NotifyError::Timeout(self.timeout))??;

        info!(
            receiver = %self.receiver,
            issue = %key,
            project = %self.project,
            "created issue"
        );
        Ok(())
    }

    async fn create_issue(&self, ticket: &Ticket) -> Result<String, NotifyError> {
        let mut request = self
            .client
            .post(self.issue_url.clone())
            .json(&self.issue_body(ticket));
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref().map(Secret::expose));
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            let created: CreatedIssue = response.json().await.unwrap_or_default();
            return Ok(created.key);
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    fn issue_body(&self, ticket: &Ticket) -> Value {
        let mut fields = json!({
            "project": { "key": self.project },
            "issuetype": { "name": self.issue_type },
            "summary": ticket.summary,
            "description": ticket.description,
            "labels": ticket.labels,
        });
        if let Some(priority) = &self.priority {
            fields["priority"] = json!({ "name": priority });
        }
        if !self.components.is_empty() {
            fields["components"] = self
                .components
                .iter()
                .map(|name| json!({ "name": name }))
                .collect();
        }
        json!({ "fields": fields })
    }
}

fn issue_url(api_url: &str) -> Result<Url, NotifyError> {
    let invalid = |reason: String| NotifyError::InvalidReceiver(format!("api_url {:?}: {}", api_url, reason));

    let mut base = Url::parse(api_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", base.scheme())));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(ISSUE_PATH).map_err(|e| invalid(e.to_string()))
}

/// Flattens a Jira error body into one line, falling back to the raw body.
fn error_message(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<JiraErrors>(body) else {
        return body.trim().to_string();
    };

    let mut messages = parsed.error_messages;
    messages.extend(parsed.errors.iter().map(|(field, message)| match message {
        Value::String(s) => format!("{}: {}", field, s),
        other => format!("{}: {}", field, other),
    }));
    if messages.is_empty() {
        body.trim().to_string()
    } else {
        messages.join("; ")
    }
}
