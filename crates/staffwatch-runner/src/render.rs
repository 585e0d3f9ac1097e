//! Slack mrkdwn rendering of change events.

use staffwatch_core::config::InsightConfig;
use staffwatch_types::{ChangeEvent, RecordId};

use crate::insight::object_url;

/// Turns change events into notification text.
#[derive(Debug, Clone)]
pub struct Renderer {
    base_url: String,
    key_prefix: String,
}

impl Renderer {
    /// Create a renderer linking into the given Jira instance.
    pub fn new(base_url: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            key_prefix: key_prefix.into(),
        }
    }

    /// Create a renderer from the catalog configuration.
    pub fn from_config(config: &InsightConfig) -> Self {
        Self::new(config.base_url(), config.key_prefix.clone())
    }

    /// Render one event as a Slack message.
    pub fn render(&self, event: &ChangeEvent) -> String {
        let kind = event.kind();
        match event {
            ChangeEvent::Created { id, label } => {
                format!("[{kind}] {} ({})", self.link(id, label), self.key(id))
            }
            ChangeEvent::Updated {
                id,
                label,
                actor,
                occurred_at,
                field_changes,
            } => {
                let header = format!(
                    "[{kind}] {} ({})\n*Changed by:* {actor}\n*Date:* `{occurred_at}`\n*Changes:*",
                    self.link(id, label),
                    self.key(id),
                );
                let bullets: Vec<String> = field_changes
                    .iter()
                    .map(|change| format!("• `{change}`"))
                    .collect();
                if bullets.is_empty() {
                    header
                } else {
                    format!("{header}\n{}", bullets.join("\n"))
                }
            }
            ChangeEvent::Deleted { id, label } => {
                // The object no longer exists, so there is nothing to link to.
                format!("[{kind}] {label} ({})", self.key(id))
            }
        }
    }

    fn link(&self, id: &RecordId, label: &str) -> String {
        format!("*<{}|{label}>*", object_url(&self.base_url, id))
    }

    fn key(&self, id: &RecordId) -> String {
        format!("{}-{id}", self.key_prefix)
    }
}
