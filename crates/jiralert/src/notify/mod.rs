//! Delivery of alert batches to notification targets.
//!
//! [`TrackerGateway`] is the production [`NotifierGateway`]: per call it builds
//! the [`Notifier`] variant selected by the receiver's `type`, renders the
//! ticket and delivers it. Every failure, whether at construction or during
//! delivery, comes back through the same [`Outcome`].

pub mod jira;
pub mod stdout;
pub mod ticket;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::{
    alert::AlertBatch,
    config::{ReceiverConfig, ReceiverKind},
    template::Template,
};

pub use jira::JiraNotifier;
pub use stdout::StdoutNotifier;
pub use ticket::Ticket;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid receiver configuration: {0}")]
    InvalidReceiver(String),
    #[error("template error: {0}")]
    Template(String),
    #[error("tracker unreachable: {0}")]
    Unreachable(String),
    #[error("tracker did not respond within {0:?}")]
    Timeout(Duration),
    #[error("tracker responded with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid tracker request: {0}")]
    Request(String),
    #[error("failed to write notification: {0}")]
    Output(#[from] std::io::Error),
}

impl NotifyError {
    /// Whether re-sending the same batch later may succeed.
    ///
    /// Total over every variant; the upstream sender retries on `true`.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotifyError::Unreachable(_) | NotifyError::Timeout(_) => true,
            NotifyError::Rejected { status, .. } => *status >= 500 || *status == 429,
            NotifyError::InvalidReceiver(_)
            | NotifyError::Template(_)
            | NotifyError::Request(_)
            | NotifyError::Output(_) => false,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() || err.is_redirect() {
            NotifyError::Request(err.to_string())
        } else {
            NotifyError::Unreachable(err.to_string())
        }
    }
}

/// Result of one dispatch attempt.
#[derive(Debug)]
pub enum Outcome {
    Success,
    Failure { retryable: bool, cause: NotifyError },
}

impl Outcome {
    pub fn failed(cause: NotifyError) -> Self {
        Outcome::Failure {
            retryable: cause.is_retryable(),
            cause,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl From<Result<(), NotifyError>> for Outcome {
    fn from(result: Result<(), NotifyError>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(cause) => Outcome::failed(cause),
        }
    }
}

/// Anything that can deliver a notification for a resolved receiver.
#[async_trait]
pub trait NotifierGateway: Send + Sync {
    async fn notify(&self, receiver: &ReceiverConfig, batch: &AlertBatch) -> Outcome;
}

/// The supported notification targets.
pub enum Notifier {
    Jira(JiraNotifier),
    Stdout(StdoutNotifier),
}

impl Notifier {
    pub fn new(receiver: &ReceiverConfig, client: &reqwest::Client) -> Result<Self, NotifyError> {
        match receiver.kind() {
            ReceiverKind::Jira => Ok(Notifier::Jira(JiraNotifier::new(receiver, client.clone())?)),
            ReceiverKind::Stdout => Ok(Notifier::Stdout(StdoutNotifier::new(receiver))),
        }
    }

    pub async fn deliver(&self, ticket: &Ticket) -> Result<(), NotifyError> {
        match self {
            Notifier::Jira(n) => n.deliver(ticket).await,
            Notifier::Stdout(n) => n.deliver(ticket),
        }
    }
}

pub struct TrackerGateway {
    template: Arc<Template>,
    client: reqwest::Client,
}

impl TrackerGateway {
    pub fn new(template: Arc<Template>) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("jiralert/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { template, client })
    }

    async fn try_notify(&self, receiver: &ReceiverConfig, batch: &AlertBatch) -> Result<(), NotifyError> {
        let notifier = Notifier::new(receiver, &self.client)?;
        let ticket = Ticket::render(receiver, &self.template, batch)?;
        debug!(receiver = %receiver.name, summary = %ticket.summary, "delivering notification");
        notifier.deliver(&ticket).await
    }
}

#[async_trait]
impl NotifierGateway for TrackerGateway {
    async fn notify(&self, receiver: &ReceiverConfig, batch: &AlertBatch) -> Outcome {
        self.try_notify(receiver, batch).await.into()
    }
}
