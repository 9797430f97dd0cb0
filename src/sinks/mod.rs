//! Notification sinks and the dispatcher that drives them.

pub mod jira;
pub mod log;
pub mod slack;

pub use jira::{CreatedIssue, JiraSink};
pub use log::LogSink;
pub use slack::{HistoryStore, InMemoryHistory, JsonFileHistory, SlackSink};

use crate::config::DeprecationConfig;
use crate::error::Result;
use crate::event::DeprecationEvent;
use crate::http::HttpClient;
use crate::metrics::DeprecationMetrics;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Outcome of a single sink for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// The notification was emitted
    Sent,
    /// The sink had already recorded this deprecation
    Duplicate,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delivery::Sent => "sent",
            Delivery::Duplicate => "duplicate",
        }
    }
}

/// Per-sink outcomes; `None` means the sink is not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub log: Option<Delivery>,
    pub slack: Option<Delivery>,
    pub jira: Option<Delivery>,
}

/// Dispatches events to every configured sink, in order log, Slack, Jira.
#[derive(Default)]
pub struct Notifier {
    log: Option<LogSink>,
    slack: Option<SlackSink>,
    jira: Option<JiraSink>,
    metrics: Option<Arc<DeprecationMetrics>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build sinks for the sink configurations present in `config`.
    ///
    /// The log file is opened here; failing to open it is an error.
    pub fn from_config(config: &DeprecationConfig, client: Arc<dyn HttpClient>) -> Result<Self> {
        let mut notifier = Self::new();
        if let Some(log) = config.log() {
            notifier.log = Some(LogSink::open(log.clone())?);
        }
        if let Some(slack) = config.slack() {
            notifier.slack = Some(SlackSink::new(slack.clone(), client.clone()));
        }
        if let Some(jira) = config.jira() {
            notifier.jira = Some(JiraSink::new(jira.clone(), client));
        }
        Ok(notifier)
    }

    pub fn with_log(mut self, sink: LogSink) -> Self {
        self.log = Some(sink);
        self
    }

    pub fn with_slack(mut self, sink: SlackSink) -> Self {
        self.slack = Some(sink);
        self
    }

    pub fn with_jira(mut self, sink: JiraSink) -> Self {
        self.jira = Some(sink);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<DeprecationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_none() && self.slack.is_none() && self.jira.is_none()
    }

    /// Emit `event` to every sink. The first failing sink aborts the rest.
    pub async fn notify(&self, event: &DeprecationEvent) -> Result<NotificationReport> {
        let mut report = NotificationReport::default();

        if let Some(log) = &self.log {
            let result = log.write(event).map(|_| Delivery::Sent);
            report.log = Some(self.track("log", result)?);
        }

        if let Some(slack) = &self.slack {
            let result: Result<Delivery> = async {
                if slack.already_sent(event)? {
                    return Ok(Delivery::Duplicate);
                }
                slack.send(event).await?;
                Ok(Delivery::Sent)
            }
            .await;
            report.slack = Some(self.track("slack", result)?);
        }

        if let Some(jira) = &self.jira {
            let result: Result<Delivery> = async {
                if jira.issue_exists(event).await? {
                    return Ok(Delivery::Duplicate);
                }
                jira.create_issue(event).await?;
                Ok(Delivery::Sent)
            }
            .await;
            report.jira = Some(self.track("jira", result)?);
        }

        debug!(url = %event.url(), report = ?report, "Deprecation notifications dispatched");
        Ok(report)
    }

    fn track(&self, sink: &str, result: Result<Delivery>) -> Result<Delivery> {
        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(delivery) => metrics.record_notification(sink, delivery.as_str()),
                Err(_) => metrics.record_notification_error(sink),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogConfig, SlackConfig};
    use crate::http::mock::MockHttpClient;

    fn event() -> DeprecationEvent {
        DeprecationEvent::new("https://api.example.com/users", "GET", Some(["limit"]), None, None)
    }

    #[tokio::test]
    async fn test_empty_notifier() {
        let notifier = Notifier::new();
        assert!(notifier.is_empty());
        let report = notifier.notify(&event()).await.unwrap();
        assert_eq!(report, NotificationReport::default());
    }

    #[tokio::test]
    async fn test_log_always_slack_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DeprecationConfig::default();
        config.set_sinks(
            Some(LogConfig {
                file: dir.path().join("deprecation.log"),
                logger_name: "deprecation_logger".to_string(),
            }),
            Some(SlackConfig {
                history_file: dir.path().join("slack.json"),
                ..SlackConfig::new("https://hooks.slack.com/x")
            }),
            None,
        );

        let client = Arc::new(MockHttpClient::new().respond_text(200, "ok"));
        let metrics = Arc::new(DeprecationMetrics::new("test"));
        let notifier = Notifier::from_config(&config, client.clone())
            .unwrap()
            .with_metrics(metrics.clone());

        let first = notifier.notify(&event()).await.unwrap();
        assert_eq!(first.log, Some(Delivery::Sent));
        assert_eq!(first.slack, Some(Delivery::Sent));
        assert_eq!(first.jira, None);

        let second = notifier.notify(&event()).await.unwrap();
        assert_eq!(second.log, Some(Delivery::Sent));
        assert_eq!(second.slack, Some(Delivery::Duplicate));

        let log = std::fs::read_to_string(dir.path().join("deprecation.log")).unwrap();
        assert_eq!(log.lines().count(), 2);
        assert_eq!(client.requests().len(), 1);

        let output = metrics.encode();
        assert!(output.contains("test_notifications_total"));
        assert!(output.contains("duplicate"));
    }

    #[tokio::test]
    async fn test_sink_error_aborts_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let slack = SlackSink::new(
            SlackConfig {
                history_file: dir.path().join("slack.json"),
                ..SlackConfig::new("https://hooks.slack.com/x")
            },
            Arc::new(MockHttpClient::new().respond_text(500, "down")),
        );
        let metrics = Arc::new(DeprecationMetrics::new("test"));
        let notifier = Notifier::new().with_slack(slack).with_metrics(metrics.clone());

        assert!(notifier.notify(&event()).await.is_err());
        assert!(metrics.encode().contains("test_notification_errors_total"));
    }

    #[test]
    fn test_log_open_failure_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DeprecationConfig::default();
        config.set_sinks(
            Some(LogConfig {
                file: dir.path().join("nope").join("deprecation.log"),
                logger_name: "deprecation_logger".to_string(),
            }),
            None,
            None,
        );
        assert!(Notifier::from_config(&config, Arc::new(MockHttpClient::new())).is_err());
    }

    #[test]
    fn test_report_serializes() {
        let report = NotificationReport {
            log: Some(Delivery::Sent),
            slack: Some(Delivery::Duplicate),
            jira: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["slack"], "duplicate");
        assert!(json["jira"].is_null());
    }
}
