//! Template rendering using Tera
//!
//! Receiver fields (summary, description, labels) are Tera templates rendered
//! against the alert batch. Go-style `{{ .Field }}` references, as found in
//! Alertmanager templates, are converted to Tera syntax first.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tera::{Context, Tera};

use crate::{alert::AlertBatch, Error, Result};

/// Name under which the configured template file is registered, so receiver
/// fields can `{% import "jiralert.tmpl" as jira %}` its macros.
pub const TEMPLATE_NAME: &str = "jiralert.tmpl";

lazy_static! {
    static ref DEFAULT_DOUBLE: Regex =
        Regex::new(r#"\{\{([^}]+)\|\s*default\s+"([^"]+)"\s*\}\}"#).unwrap();
    static ref DEFAULT_SINGLE: Regex =
        Regex::new(r#"\{\{([^}]+)\|\s*default\s+'([^']+)'\s*\}\}"#).unwrap();
    static ref DEFAULT_BARE: Regex =
        Regex::new(r#"\{\{([^}]+)\|\s*default\s+([^}\s]+)\s*\}\}"#).unwrap();
}

/// Convert Go template syntax to Tera syntax
///
/// Handles common patterns:
/// - {{ .path.to.value }} -> {{ path.to.value }}
/// - {{ .value | default "default" }} -> {{ value | default(value="default") }}
pub fn convert_go_to_tera(template: &str) -> String {
    let converted = template.replace("{{ .", "{{ ").replace("{{.", "{{");
    let converted = DEFAULT_DOUBLE.replace_all(&converted, "{{$1| default(value=\"$2\") }}");
    let converted = DEFAULT_SINGLE.replace_all(&converted, "{{$1| default(value=\"$2\") }}");
    DEFAULT_BARE
        .replace_all(&converted, "{{$1| default(value=\"$2\") }}")
        .to_string()
}

/// Shared, read-only template set.
#[derive(Debug, Clone, Default)]
pub struct Template {
    tera: Tera,
    /// Field texts registered in `tera` under `field:<text>`.
    compiled: HashSet<String>,
}

impl Template {
    /// Loads the template file, if any. Failure is fatal at startup.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Template(format!("failed to read {}: {}", path.display(), e))
        })?;
        let template = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "loaded template");
        Ok(template)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, &convert_go_to_tera(content))
            .map_err(|e| Error::Template(describe(&e)))?;
        Ok(Self {
            tera,
            compiled: HashSet::new(),
        })
    }

    /// Compiles receiver field texts up front so `render` does not have to
    /// copy the template set per call. A text that does not compile is
    /// skipped and reported by `render` when a request uses it.
    pub fn with_fields<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        for text in fields {
            if self.compiled.contains(text) {
                continue;
            }
            match self
                .tera
                .add_raw_template(&field_name(text), &convert_go_to_tera(text))
            {
                Ok(()) => {
                    self.compiled.insert(text.to_string());
                }
                Err(e) => tracing::warn!(field = %text, err = %describe(&e), "invalid field template"),
            }
        }
        self
    }

    /// Renders one receiver field against `batch`.
    pub fn render(&self, text: &str, batch: &AlertBatch) -> std::result::Result<String, String> {
        let context = batch_context(batch)?;
        if self.compiled.contains(text) {
            return self
                .tera
                .render(&field_name(text), &context)
                .map_err(|e| describe(&e));
        }
        let mut tera = self.tera.clone();
        tera.render_str(&convert_go_to_tera(text), &context)
            .map_err(|e| describe(&e))
    }
}

fn field_name(text: &str) -> String {
    format!("field:{}", text)
}

/// Builds the render context. Every top-level key is also exposed with its
/// first letter upper-cased (`groupLabels` and `GroupLabels`), matching the
/// names Alertmanager templates use.
fn batch_context(batch: &AlertBatch) -> std::result::Result<Context, String> {
    let mut context = Context::new();
    if let Value::Object(map) = serde_json::to_value(batch).map_err(|e| e.to_string())? {
        for (key, value) in map {
            let mut chars = key.chars();
            if let Some(first) = chars.next() {
                let alias: String = first.to_uppercase().chain(chars).collect();
                context.insert(alias, &value);
            }
            context.insert(key, &value);
        }
    }
    Ok(context)
}

/// Tera's top-level message rarely says what went wrong; the cause chain does.
fn describe(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
