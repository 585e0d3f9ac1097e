//! Change notification delivery.
//!
//! Uses enum dispatch like the HTTP clients elsewhere in the runner. A
//! notifier never fails the pass: delivery errors are logged and dropped,
//! so one broken webhook call cannot hold back the snapshot update.

use std::time::Duration;

use staffwatch_core::config::NotifyConfig;
use tracing::{debug, info, warn};

use crate::error::NotifyError;

/// Destination for rendered change messages.
pub enum Notifier {
    /// Slack incoming webhook.
    Slack(SlackNotifier),
    /// No webhook configured; messages only reach the log.
    LogOnly,
}

impl Notifier {
    /// Build the notifier described by the configuration, posting through
    /// the process-wide HTTP client.
    pub fn from_config(config: &NotifyConfig, client: reqwest::Client) -> Self {
        match config.slack_webhook.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                Self::Slack(SlackNotifier::new(client, url, config.timeout()))
            }
            _ => Self::LogOnly,
        }
    }

    /// Deliver one message. Failures are logged, never returned.
    pub async fn notify(&self, text: &str) {
        match self {
            Self::Slack(slack) => {
                if let Err(e) = slack.send(text).await {
                    warn!(notifier = self.name(), error = %e, "notification not delivered");
                }
            }
            Self::LogOnly => {
                info!(notifier = self.name(), message = text, "notification");
            }
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Slack(_) => "slack",
            Self::LogOnly => "log-only",
        }
    }
}

/// Posts `{"text": ...}` to a Slack incoming webhook.
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
    timeout: Duration,
}

impl SlackNotifier {
    /// Create a notifier for the given webhook.
    pub fn new(client: reqwest::Client, webhook_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            webhook_url: webhook_url.to_owned(),
            timeout,
        }
    }

    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let body = serde_json::json!({ "text": text });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("notification delivered");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn notify_config(webhook: Option<String>) -> NotifyConfig {
        NotifyConfig {
            slack_webhook: webhook,
            timeout_ms: 200,
        }
    }

    fn notifier(webhook: Option<String>) -> Notifier {
        Notifier::from_config(&notify_config(webhook), reqwest::Client::new())
    }

    #[test]
    fn missing_or_blank_webhook_is_log_only() {
        assert_eq!(notifier(None).name(), "log-only");
        assert_eq!(notifier(Some("  ".to_owned())).name(), "log-only");
        assert_eq!(
            notifier(Some("https://hooks.example".to_owned())).name(),
            "slack"
        );
    }

    #[tokio::test]
    async fn slack_posts_text_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_json(serde_json::json!({"text": "[DELETED] Bob (HR-2)"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = notifier(Some(format!("{}/hook", server.uri())));
        notifier.notify("[DELETED] Bob (HR-2)").await;
    }

    #[tokio::test]
    async fn webhook_errors_are_reported_to_the_caller_of_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no_service"))
            .mount(&server)
            .await;

        let slack = SlackNotifier::new(
            reqwest::Client::new(),
            &format!("{}/hook", server.uri()),
            Duration::from_secs(1),
        );
        let result = slack.send("hello").await;

        assert!(
            matches!(result, Err(NotifyError::Status { status: 404, ref body }) if body == "no_service"),
            "got {result:?}"
        );
    }

    #[tokio::test]
    async fn notify_swallows_delivery_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let notifier = notifier(Some(server.uri()));
        notifier.notify("first").await;
        notifier.notify("second").await;

        let requests = server.received_requests().await.unwrap();
        let texts: Vec<serde_json::Value> = requests
            .iter()
            .map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).unwrap()["text"].clone())
            .collect();
        assert_eq!(texts, vec!["first", "second"]);
    }
}
