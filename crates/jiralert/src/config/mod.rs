//! Receiver configuration file.
//!
//! Loaded once at startup and shared read-only (behind an `Arc`) by every
//! request task.

mod secret;

pub use secret::Secret;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiverKind {
    #[default]
    Jira,
    Stdout,
}

/// A named notification target.
///
/// Every field except `name` may be left unset and inherited from the
/// top-level `defaults` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReceiverKind>,

    // Tracker API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Secret>,
    /// Seconds allowed for one delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    // Ticket fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_group_labels: Option<bool>,
}

impl ReceiverConfig {
    pub fn kind(&self) -> ReceiverKind {
        self.kind.unwrap_or_default()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Every field rendered as a template when a ticket is built.
    pub fn template_fields(&self) -> impl Iterator<Item = &str> {
        self.summary
            .iter()
            .chain(self.description.iter())
            .map(String::as_str)
            .chain(self.labels.iter().flatten().map(String::as_str))
    }

    /// Fills every unset field from `defaults`.
    fn inherit(&mut self, defaults: &ReceiverConfig) {
        fn fill<T: Clone>(field: &mut Option<T>, default: &Option<T>) {
            if field.is_none() {
                *field = default.clone();
            }
        }

        fill(&mut self.kind, &defaults.kind);
        fill(&mut self.api_url, &defaults.api_url);
        fill(&mut self.user, &defaults.user);
        fill(&mut self.password, &defaults.password);
        fill(&mut self.timeout, &defaults.timeout);
        fill(&mut self.project, &defaults.project);
        fill(&mut self.issue_type, &defaults.issue_type);
        fill(&mut self.priority, &defaults.priority);
        fill(&mut self.summary, &defaults.summary);
        fill(&mut self.description, &defaults.description);
        fill(&mut self.labels, &defaults.labels);
        fill(&mut self.components, &defaults.components);
        fill(&mut self.add_group_labels, &defaults.add_group_labels);
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("receiver name must not be empty".to_string()));
        }
        if self.timeout == Some(0) {
            return Err(Error::Config(format!(
                "timeout in receiver {:?} must be at least 1 second",
                self.name
            )));
        }

        let required: Vec<(&str, bool)> = match self.kind() {
            ReceiverKind::Jira => vec![
                ("api_url", self.api_url.is_some()),
                ("project", self.project.is_some()),
                ("issue_type", self.issue_type.is_some()),
                ("summary", self.summary.is_some()),
            ],
            ReceiverKind::Stdout => vec![("summary", self.summary.is_some())],
        };
        for (field, present) in required {
            if !present {
                return Err(Error::Config(format!(
                    "missing {} in receiver {:?}",
                    field, self.name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<ReceiverConfig>,
    #[serde(default)]
    pub receivers: Vec<ReceiverConfig>,
    /// Path to a Tera template file whose macros and blocks are available to
    /// every receiver field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
}

impl Config {
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_yaml(&content)?;

        if let Some(template) = config.template.as_mut() {
            if template.is_relative() {
                if let Some(dir) = path.parent() {
                    *template = dir.join(&*template);
                }
            }
        }

        tracing::debug!(
            path = %path.display(),
            receivers = config.receivers.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Parses, applies defaults and validates a configuration document.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(content)?;

        if let Some(defaults) = config.defaults.clone() {
            for receiver in &mut config.receivers {
                receiver.inherit(&defaults);
            }
        }

        if config.receivers.is_empty() {
            return Err(Error::Config("no receivers configured".to_string()));
        }

        let mut seen = HashSet::new();
        for receiver in &config.receivers {
            receiver.validate()?;
            if !seen.insert(receiver.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate receiver name {:?}",
                    receiver.name
                )));
            }
        }

        Ok(config)
    }

    /// Exact-name lookup. No patterns, no fallback receiver.
    pub fn receiver_by_name(&self, name: &str) -> Option<&ReceiverConfig> {
        self.receivers.iter().find(|r| r.name == name)
    }

    /// YAML rendition with secrets redacted, for the `/config` page.
    pub fn to_display_string(&self) -> String {
        serde_yaml::to_string(self)
            .unwrap_or_else(|e| format!("<error serializing config: {}>", e))
    }
}
