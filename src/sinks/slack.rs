//! Slack webhook sink with a local record of sent notifications.

use crate::config::SlackConfig;
use crate::error::{DeprecationError, Result};
use crate::event::{DeprecationEvent, HistoryRecord};
use crate::http::{HttpClient, HttpRequest};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Storage for events that were already delivered.
pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Result<Vec<DeprecationEvent>>;
    fn append(&self, event: &DeprecationEvent) -> Result<()>;
}

/// History kept as a JSON array in a file.
///
/// A missing file reads as an empty history. Appending rewrites the whole
/// file; there is no locking between processes.
#[derive(Debug, Clone)]
pub struct JsonFileHistory {
    path: PathBuf,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_records(&self) -> Result<Vec<HistoryRecord>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl HistoryStore for JsonFileHistory {
    fn load(&self) -> Result<Vec<DeprecationEvent>> {
        let events = self
            .read_records()?
            .into_iter()
            .filter_map(|record| {
                let url = record.url.clone();
                match DeprecationEvent::try_from(record) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(
                            path = ?self.path,
                            url = %url,
                            error = %e,
                            "Skipping unreadable Slack history record"
                        );
                        None
                    }
                }
            })
            .collect();
        Ok(events)
    }

    fn append(&self, event: &DeprecationEvent) -> Result<()> {
        let mut records = self.read_records()?;
        records.push(HistoryRecord::from(event));

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        serde::Serialize::serialize(&records, &mut serializer)?;

        std::fs::write(&self.path, buffer)?;
        Ok(())
    }
}

/// History held in memory, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHistory {
    events: Arc<Mutex<Vec<DeprecationEvent>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<DeprecationEvent>>> {
        self.events.lock().map_err(|_| DeprecationError::Configuration {
            reason: "history lock poisoned".to_string(),
        })
    }
}

impl HistoryStore for InMemoryHistory {
    fn load(&self) -> Result<Vec<DeprecationEvent>> {
        Ok(self.lock()?.clone())
    }

    fn append(&self, event: &DeprecationEvent) -> Result<()> {
        self.lock()?.push(event.clone());
        Ok(())
    }
}

/// Posts deprecation messages to a Slack incoming webhook.
pub struct SlackSink {
    config: SlackConfig,
    client: Arc<dyn HttpClient>,
    history: Box<dyn HistoryStore>,
}

impl SlackSink {
    /// Sink recording history in the configured JSON file.
    pub fn new(config: SlackConfig, client: Arc<dyn HttpClient>) -> Self {
        let history = Box::new(JsonFileHistory::new(config.history_file.clone()));
        Self::with_history(config, client, history)
    }

    pub fn with_history(
        config: SlackConfig,
        client: Arc<dyn HttpClient>,
        history: Box<dyn HistoryStore>,
    ) -> Self {
        Self {
            config,
            client,
            history,
        }
    }

    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    /// Whether an identical event was sent before.
    pub fn already_sent(&self, event: &DeprecationEvent) -> Result<bool> {
        let sent = self.history.load()?.iter().any(|e| e == event);
        debug!(url = %event.url(), method = %event.method(), sent, "Checked Slack history");
        Ok(sent)
    }

    /// Post the message and record the event.
    ///
    /// Does not consult the history; callers check [`Self::already_sent`]
    /// first. Nothing is recorded when the webhook call fails.
    pub async fn send(&self, event: &DeprecationEvent) -> Result<()> {
        let request = HttpRequest::post(&self.config.webhook_url)
            .with_header("Content-Type", "application/json")
            .with_json(build_message(&self.config, event));

        self.client
            .request(request)
            .await?
            .error_for_status(&self.config.webhook_url, "slack webhook")?;

        self.history.append(event)?;
        info!(url = %event.url(), method = %event.method(), "Slack deprecation notification sent");
        Ok(())
    }
}

fn section(text: String) -> Value {
    json!({
        "type": "section",
        "fields": [
            { "type": "mrkdwn", "text": text }
        ]
    })
}

/// Build the webhook payload for an event.
pub fn build_message(config: &SlackConfig, event: &DeprecationEvent) -> Value {
    let summary = if event.has_parameters() {
        "At least one parameter of an API endpoint is deprecated."
    } else {
        "An API endpoint is deprecated."
    };

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": { "type": "plain_text", "text": summary }
        }),
        json!({
            "type": "section",
            "fields": [
                { "type": "mrkdwn", "text": format!("*URL:*\n{}", event.url()) },
                { "type": "mrkdwn", "text": format!("*HTTP-Method*\n`{}`", event.method()) }
            ]
        }),
        json!({ "type": "divider" }),
    ];

    if let Some(params) = event.parameters() {
        blocks.push(section(format!("*Parameter:*\n`{}`", params.join(", "))));
    }
    if let Some(deprecation) = event.deprecation() {
        blocks.push(section(format!(
            "*HTTP Deprecation Datetime:*\n{}",
            deprecation.to_rfc3339()
        )));
    }
    if let Some(sunset) = event.sunset() {
        blocks.push(section(format!(
            "*HTTP Sunset Datetime:*\n{}",
            sunset.to_rfc3339()
        )));
    }

    json!({
        "attachments": [
            {
                "color": config.attachment_color,
                "blocks": blocks
            }
        ]
    })
}
